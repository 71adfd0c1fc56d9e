use std::future::Future;

use indexmap::IndexMap;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::{Endpoints, Timing};
use crate::domain::{DiagramName, Locus, RawValue, escape_sample_name};
use crate::error::EfpError;
use crate::http::{build_client, check_status, send_with_retries};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExpressionPair {
    pub name: String,
    #[serde(default)]
    pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionSample {
    pub sample_name: String,
    pub locus: Locus,
    pub value: RawValue,
}

pub trait ExpressionClient: Send + Sync {
    fn fetch_expression(
        &self,
        database_source: &str,
        locus: &Locus,
        sample_ids: &[String],
    ) -> impl Future<Output = Result<Vec<ExpressionPair>, EfpError>> + Send;
}

#[derive(Clone)]
pub struct ExpressionHttpClient {
    client: Client,
    base_url: String,
}

impl ExpressionHttpClient {
    pub fn new(endpoints: &Endpoints, timing: &Timing) -> Result<Self, EfpError> {
        let client = build_client(timing.http_timeout, EfpError::ExpressionHttp)?;
        Ok(Self {
            client,
            base_url: endpoints.expression.clone(),
        })
    }
}

impl ExpressionClient for ExpressionHttpClient {
    async fn fetch_expression(
        &self,
        database_source: &str,
        locus: &Locus,
        sample_ids: &[String],
    ) -> Result<Vec<ExpressionPair>, EfpError> {
        let url = query_url(&self.base_url, database_source, locus, sample_ids)?;
        tracing::debug!(%url, samples = sample_ids.len(), "querying expression service");
        let response =
            send_with_retries(|| self.client.get(url.clone()), EfpError::ExpressionHttp).await?;
        let response = check_status(response, "expression request failed", |status, message| {
            EfpError::ExpressionStatus { status, message }
        })
        .await?;
        let text = response
            .text()
            .await
            .map_err(|err| EfpError::ExpressionHttp(err.to_string()))?;
        parse_expression_response(&text)
    }
}

/// Builds the batched query. Catalog sample ids are already in their escaped
/// wire form (`+` for spaces, `%2B` for plus signs); only `#` and `&` are
/// escaped further.
pub fn query_url(
    base_url: &str,
    database_source: &str,
    locus: &Locus,
    sample_ids: &[String],
) -> Result<Url, EfpError> {
    let samples = sample_ids
        .iter()
        .map(|id| format!("\"{}\"", escape_query_delimiters(id)))
        .collect::<Vec<_>>()
        .join(",");
    let raw = format!(
        "{base_url}?datasource={database_source}&id={locus}&samples=[{samples}]",
        database_source = escape_query_delimiters(database_source),
        locus = locus.as_str()
    );
    Url::parse(&raw).map_err(|err| EfpError::ExpressionHttp(format!("{raw}: {err}")))
}

fn escape_query_delimiters(value: &str) -> String {
    value.replace('#', "%23").replace('&', "%26")
}

pub fn parse_expression_response(text: &str) -> Result<Vec<ExpressionPair>, EfpError> {
    serde_json::from_str(text).map_err(|err| EfpError::Decode {
        source_name: "expression",
        message: err.to_string(),
    })
}

pub type LocusValues = IndexMap<String, RawValue>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchResult {
    pub database_source: Option<String>,
    pub regions: IndexMap<String, IndexMap<String, LocusValues>>,
}

impl FetchResult {
    pub fn region_names(&self) -> Vec<String> {
        self.regions.keys().cloned().collect()
    }

    pub fn attribute(
        &mut self,
        catalog_regions: &IndexMap<String, Vec<String>>,
        samples: &[ExpressionSample],
    ) -> usize {
        let mut matched = 0;
        for sample in samples {
            let display_name = sample.sample_name.trim();
            let escaped = escape_sample_name(display_name);
            let region = catalog_regions
                .iter()
                .find(|(_, ids)| ids.iter().any(|id| *id == escaped))
                .map(|(region, _)| region);
            let Some(region) = region else {
                tracing::debug!(sample = display_name, "sample matches no region");
                continue;
            };
            self.regions
                .entry(region.clone())
                .or_default()
                .entry(display_name.to_string())
                .or_default()
                .insert(sample.locus.as_str().to_string(), sample.value.clone());
            matched += 1;
        }
        matched
    }
}

#[derive(Debug, Default)]
pub struct FetchTable {
    diagrams: IndexMap<DiagramName, FetchResult>,
}

impl FetchTable {
    pub fn get(&self, diagram: &DiagramName) -> Option<&FetchResult> {
        self.diagrams.get(diagram)
    }

    pub fn contains(&self, diagram: &DiagramName) -> bool {
        self.diagrams.contains_key(diagram)
    }

    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }

    pub fn record(
        &mut self,
        diagram: &DiagramName,
        database_source: &str,
        catalog_regions: &IndexMap<String, Vec<String>>,
        samples: &[ExpressionSample],
    ) -> usize {
        let result = self.diagrams.entry(diagram.clone()).or_default();
        let matched = result.attribute(catalog_regions, samples);
        result.database_source = Some(database_source.to_string());
        matched
    }
}

pub struct ExpressionFetcher<E: ExpressionClient> {
    client: E,
}

impl<E: ExpressionClient> ExpressionFetcher<E> {
    pub fn new(client: E) -> Self {
        Self { client }
    }

    pub async fn fetch(
        &self,
        database_source: Option<&str>,
        locus: &Locus,
        sample_ids: &[String],
    ) -> Result<Vec<ExpressionSample>, EfpError> {
        let Some(database_source) = database_source else {
            tracing::debug!(locus = %locus, "no database source, skipping expression fetch");
            return Ok(Vec::new());
        };
        let pairs = self
            .client
            .fetch_expression(database_source, locus, sample_ids)
            .await?;
        Ok(pairs
            .into_iter()
            .map(|pair| ExpressionSample {
                sample_name: pair.name.trim().to_string(),
                locus: locus.clone(),
                value: pair.value,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(region, ids)| {
                (
                    region.to_string(),
                    ids.iter().map(|id| id.to_string()).collect(),
                )
            })
            .collect()
    }

    fn sample(name: &str, locus: &str, value: RawValue) -> ExpressionSample {
        ExpressionSample {
            sample_name: name.to_string(),
            locus: locus.parse().unwrap(),
            value,
        }
    }

    #[test]
    fn query_url_keeps_escaped_ids() {
        let locus: Locus = "AT3G24650".parse().unwrap();
        let url = query_url(
            "https://example.org/plantefp.cgi",
            "abiotic",
            &locus,
            &["Col+0+%2B+ABA".to_string(), "S2".to_string()],
        )
        .unwrap();
        let query = url.query().unwrap();
        assert!(query.starts_with("datasource=abiotic&id=AT3G24650&samples=["));
        assert!(query.contains("Col+0+%2B+ABA"));
        assert!(!query.contains("%252B"));
    }

    #[test]
    fn query_url_escapes_fragment_and_separator() {
        let locus: Locus = "AT3G24650".parse().unwrap();
        let url = query_url(
            "https://example.org/plantefp.cgi",
            "stress&dev",
            &locus,
            &["Root#1".to_string(), "A&B".to_string(), "Last".to_string()],
        )
        .unwrap();
        assert_eq!(url.fragment(), None);
        let query = url.query().unwrap();
        assert!(query.starts_with("datasource=stress%26dev&id=AT3G24650"));
        assert!(query.contains("Root%231"));
        assert!(query.contains("A%26B"));
        assert!(query.contains("Last"));
    }

    #[test]
    fn parses_mixed_values() {
        let pairs = parse_expression_response(
            r#"[{"name": "S1", "value": "10"}, {"name": "S2", "value": 2.5}, {"name": "S3"}]"#,
        )
        .unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].value, RawValue::from("10"));
        assert_eq!(pairs[1].value, RawValue::from(2.5));
        assert_eq!(pairs[2].value, RawValue::Null);
    }

    #[test]
    fn first_matching_region_wins() {
        let catalog = regions(&[("Leaf", &["S1"]), ("Root", &["S1", "S2"])]);
        let mut result = FetchResult::default();
        let matched = result.attribute(
            &catalog,
            &[
                sample("S1", "AT1G01010", RawValue::from("3")),
                sample("S2", "AT1G01010", RawValue::from("4")),
            ],
        );
        assert_eq!(matched, 2);
        assert!(result.regions["Leaf"].contains_key("S1"));
        assert!(!result.regions["Root"].contains_key("S1"));
        assert!(result.regions["Root"].contains_key("S2"));
    }

    #[test]
    fn escaped_names_resolve_to_display_name() {
        let catalog = regions(&[("Leaf", &["Col+0+%2B+ABA"])]);
        let mut result = FetchResult::default();
        result.attribute(
            &catalog,
            &[sample(" Col 0 + ABA ", "AT1G01010", RawValue::from(1.0))],
        );
        assert!(result.regions["Leaf"].contains_key("Col 0 + ABA"));
    }

    #[test]
    fn new_loci_merge_into_existing_samples() {
        let catalog = regions(&[("Leaf", &["S1"])]);
        let mut result = FetchResult::default();
        result.attribute(&catalog, &[sample("S1", "AT1G01010", RawValue::from("1"))]);
        result.attribute(&catalog, &[sample("S1", "AT1G01020", RawValue::from("2"))]);
        let values = &result.regions["Leaf"]["S1"];
        assert_eq!(values.len(), 2);
        assert_eq!(values["AT1G01010"], RawValue::from("1"));
        assert_eq!(values["AT1G01020"], RawValue::from("2"));
    }
}
