use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::aggregate::{AggregationSummary, RegionStatistics, aggregate};
use crate::catalog::{CatalogClient, CatalogHttpClient, SampleCatalog};
use crate::config::ResolvedConfig;
use crate::domain::{DiagramName, Locus};
use crate::error::EfpError;
use crate::expression::{ExpressionClient, ExpressionFetcher, ExpressionHttpClient, FetchTable};
use crate::outline::OutlineCache;
use crate::reference::{ReferenceClient, ReferenceHttpClient, ReferenceLookup, ReferenceValues};
use crate::surface::{HoverBinding, RegionMetadata, RenderSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Init,
    AwaitingCatalog,
    Fetching,
    Polling,
    Applying,
    Done,
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderPhase::Init => "Init",
            RenderPhase::AwaitingCatalog => "AwaitingCatalog",
            RenderPhase::Fetching => "Fetching",
            RenderPhase::Polling => "Polling",
            RenderPhase::Applying => "Applying",
            RenderPhase::Done => "Done",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: RenderPhase,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        tracing::debug!(phase = %event.phase, elapsed = ?event.elapsed, "{}", event.message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Rendered,
    NoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub diagram: DiagramName,
    pub locus: Locus,
    pub locus_display: String,
    pub status: RenderStatus,
    pub database_source: Option<String>,
    pub regions: Vec<RegionStatistics>,
    pub summary: Option<AggregationSummary>,
    pub painted: Vec<String>,
    pub skipped: Vec<String>,
    pub reference: Option<ReferenceLookup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_error: Option<String>,
    pub rendered_at: String,
    pub elapsed_ms: u128,
}

impl RenderReport {
    fn new(diagram: &DiagramName, locus: &Locus, status: RenderStatus) -> Self {
        Self {
            diagram: diagram.clone(),
            locus: locus.clone(),
            locus_display: locus.display_form(),
            status,
            database_source: None,
            regions: Vec::new(),
            summary: None,
            painted: Vec::new(),
            skipped: Vec::new(),
            reference: None,
            reference_error: None,
            rendered_at: chrono::Utc::now().to_rfc3339(),
            elapsed_ms: 0,
        }
    }
}

pub type HttpCoordinator =
    RenderCoordinator<CatalogHttpClient, ExpressionHttpClient, ReferenceHttpClient>;

pub struct RenderCoordinator<C: CatalogClient, E: ExpressionClient, R: ReferenceClient> {
    config: ResolvedConfig,
    catalog: SampleCatalog<C>,
    fetcher: ExpressionFetcher<E>,
    reference: ReferenceValues<R>,
    fetched: FetchTable,
    history: Vec<DiagramName>,
    outlines: OutlineCache,
}

impl HttpCoordinator {
    pub fn connect(config: ResolvedConfig) -> Result<Self, EfpError> {
        let catalog = CatalogHttpClient::new(&config.endpoints, &config.timing)?;
        let expression = ExpressionHttpClient::new(&config.endpoints, &config.timing)?;
        let reference = ReferenceHttpClient::new(&config.endpoints, &config.timing)?;
        Ok(Self::new(config, catalog, expression, reference))
    }
}

impl<C: CatalogClient, E: ExpressionClient, R: ReferenceClient> RenderCoordinator<C, E, R> {
    pub fn new(config: ResolvedConfig, catalog: C, expression: E, reference: R) -> Self {
        Self {
            config,
            catalog: SampleCatalog::new(catalog),
            fetcher: ExpressionFetcher::new(expression),
            reference: ReferenceValues::new(reference),
            fetched: FetchTable::default(),
            history: Vec::new(),
            outlines: OutlineCache::new(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SampleCatalog<C> {
        &self.catalog
    }

    pub fn reference(&self) -> &ReferenceValues<R> {
        &self.reference
    }

    pub fn fetched(&self) -> &FetchTable {
        &self.fetched
    }

    pub fn history(&self) -> &[DiagramName] {
        &self.history
    }

    pub fn outlines(&self) -> &OutlineCache {
        &self.outlines
    }

    pub async fn render(
        &mut self,
        diagram: &DiagramName,
        locus: &Locus,
        surface: &mut dyn RenderSurface,
        sink: &dyn ProgressSink,
    ) -> Result<RenderReport, EfpError> {
        let started = Instant::now();

        self.progress(sink, RenderPhase::Init, format!("{diagram} / {locus}"), None);
        self.outlines.reset();
        if !self.history.contains(diagram) {
            self.history.push(diagram.clone());
        }

        self.progress(sink, RenderPhase::AwaitingCatalog, "resolving samples".to_string(), None);
        let entry = self.catalog.resolve(diagram).await?;
        let Some(database_source) = entry.database_source.clone() else {
            self.progress(
                sink,
                RenderPhase::Done,
                "no database source, nothing to color".to_string(),
                Some(started.elapsed()),
            );
            let mut report = RenderReport::new(diagram, locus, RenderStatus::NoData);
            report.elapsed_ms = started.elapsed().as_millis();
            return Ok(report);
        };

        let sample_ids = entry.sample_ids();
        self.progress(
            sink,
            RenderPhase::Fetching,
            format!("querying {} samples from {database_source}", sample_ids.len()),
            Some(started.elapsed()),
        );
        let fetch_timeout = self.config.timing.fetch_timeout;
        let samples = tokio::time::timeout(
            fetch_timeout,
            self.fetcher.fetch(Some(&database_source), locus, &sample_ids),
        )
        .await
        .map_err(|_| EfpError::Stall {
            phase: RenderPhase::Fetching.to_string(),
            waited: fetch_timeout,
        })??;
        let matched = self
            .fetched
            .record(diagram, &database_source, &entry.regions, &samples);
        tracing::info!(
            diagram = %diagram,
            locus = %locus,
            received = samples.len(),
            matched,
            "expression values recorded"
        );

        self.progress(
            sink,
            RenderPhase::Polling,
            "waiting for diagram regions".to_string(),
            Some(started.elapsed()),
        );
        let available = self.wait_for_regions(&*surface, diagram).await?;
        tokio::time::sleep(self.config.timing.settle_delay).await;

        self.progress(
            sink,
            RenderPhase::Applying,
            "coloring regions".to_string(),
            Some(started.elapsed()),
        );
        let mut report = RenderReport::new(diagram, locus, RenderStatus::Rendered);
        report.database_source = Some(database_source);
        if let Some(result) = self.fetched.get(diagram) {
            let aggregation = aggregate(result, &result.region_names(), locus);
            for stats in &aggregation.regions {
                self.apply_region(surface, diagram, stats, &available, &mut report);
            }
            report.regions = aggregation.regions;
            report.summary = Some(aggregation.summary);
        }

        match self.reference.lookup(locus).await {
            Ok(lookup) => report.reference = Some(lookup),
            Err(err) => {
                tracing::warn!(locus = %locus, error = %err, "reference values unavailable");
                report.reference_error = Some(err.to_string());
            }
        }
        report.elapsed_ms = started.elapsed().as_millis();
        self.progress(
            sink,
            RenderPhase::Done,
            format!("{} regions painted", report.painted.len()),
            Some(started.elapsed()),
        );
        Ok(report)
    }

    async fn wait_for_regions(
        &self,
        surface: &dyn RenderSurface,
        diagram: &DiagramName,
    ) -> Result<HashSet<String>, EfpError> {
        let timing = self.config.timing;
        for _ in 0..timing.poll_budget {
            if let Some(ids) = surface.list_region_ids(diagram) {
                return Ok(ids.into_iter().collect());
            }
            tokio::time::sleep(timing.poll_interval).await;
        }
        Err(EfpError::Stall {
            phase: RenderPhase::Polling.to_string(),
            waited: timing.poll_interval * timing.poll_budget,
        })
    }

    fn apply_region(
        &self,
        surface: &mut dyn RenderSurface,
        diagram: &DiagramName,
        stats: &RegionStatistics,
        available: &HashSet<String>,
        report: &mut RenderReport,
    ) {
        let metadata = RegionMetadata {
            expression_level: stats.expression_level.clone(),
            sample_size: stats.sample_size,
        };
        let mut targets = vec![stats.region.as_str()];
        if let Some(group) = self.config.alias_group_for(&stats.region) {
            targets.extend(
                group
                    .regions
                    .iter()
                    .map(String::as_str)
                    .filter(|member| *member != stats.region),
            );
        }

        for target in targets {
            if !available.contains(target) {
                tracing::warn!(diagram = %diagram, region = target, "region missing from diagram");
                report.skipped.push(target.to_string());
                continue;
            }
            surface.set_region_fill(diagram, target, &stats.color);
            surface.set_region_metadata(diagram, target, &metadata);
            surface.on_region_hover(
                diagram,
                target,
                HoverBinding::new(target, self.outlines.clone()),
            );
            surface.set_region_tooltip(diagram, target, &tooltip(target, &metadata));
            report.painted.push(target.to_string());
        }
    }

    fn progress(
        &self,
        sink: &dyn ProgressSink,
        phase: RenderPhase,
        message: String,
        elapsed: Option<Duration>,
    ) {
        tracing::debug!(phase = %phase, "{message}");
        sink.event(ProgressEvent {
            phase,
            message: format!("phase={phase}; {message}"),
            elapsed,
        });
    }
}

pub fn tooltip(region: &str, metadata: &RegionMetadata) -> String {
    format!(
        "{region}\nExpression level: {}\nSample size: {}",
        metadata.expression_level, metadata.sample_size
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tooltip_lists_level_and_size() {
        let metadata = RegionMetadata {
            expression_level: "15.000".to_string(),
            sample_size: 2,
        };
        assert_eq!(
            tooltip("Leaf", &metadata),
            "Leaf\nExpression level: 15.000\nSample size: 2"
        );
    }

    #[test]
    fn phase_names() {
        assert_eq!(RenderPhase::AwaitingCatalog.to_string(), "AwaitingCatalog");
        assert_eq!(RenderPhase::Done.to_string(), "Done");
    }
}
