use std::future::Future;

use indexmap::IndexMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::{Endpoints, Timing};
use crate::domain::DiagramName;
use crate::error::EfpError;
use crate::http::{build_client, check_status, send_with_retries};

pub type CatalogDocument = IndexMap<String, CatalogRecord>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub sample: IndexMap<String, Vec<String>>,
}

pub trait CatalogClient: Send + Sync {
    fn fetch_catalog(&self) -> impl Future<Output = Result<CatalogDocument, EfpError>> + Send;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    url: String,
}

impl CatalogHttpClient {
    pub fn new(endpoints: &Endpoints, timing: &Timing) -> Result<Self, EfpError> {
        let client = build_client(timing.http_timeout, EfpError::CatalogHttp)?;
        Ok(Self {
            client,
            url: endpoints.catalog.clone(),
        })
    }
}

impl CatalogClient for CatalogHttpClient {
    async fn fetch_catalog(&self) -> Result<CatalogDocument, EfpError> {
        tracing::info!(url = %self.url, "fetching sample catalog");
        let response =
            send_with_retries(|| self.client.get(&self.url), EfpError::CatalogHttp).await?;
        let response = check_status(response, "sample catalog request failed", |status, message| {
            EfpError::CatalogStatus { status, message }
        })
        .await?;
        let text = response
            .text()
            .await
            .map_err(|err| EfpError::CatalogHttp(err.to_string()))?;
        parse_catalog(&text)
    }
}

pub fn parse_catalog(text: &str) -> Result<CatalogDocument, EfpError> {
    serde_json::from_str(text).map_err(|err| EfpError::Decode {
        source_name: "sample catalog",
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleCatalogEntry {
    pub diagram: DiagramName,
    pub database_source: Option<String>,
    pub regions: IndexMap<String, Vec<String>>,
}

impl SampleCatalogEntry {
    pub fn empty(diagram: DiagramName) -> Self {
        Self {
            diagram,
            database_source: None,
            regions: IndexMap::new(),
        }
    }

    pub fn is_queryable(&self) -> bool {
        self.database_source.is_some()
    }

    pub fn sample_ids(&self) -> Vec<String> {
        if !self.is_queryable() {
            return Vec::new();
        }
        self.regions.values().flatten().cloned().collect()
    }
}

pub struct SampleCatalog<C: CatalogClient> {
    client: C,
    document: OnceCell<CatalogDocument>,
}

impl<C: CatalogClient> SampleCatalog<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            document: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.document.initialized()
    }

    pub async fn document(&self) -> Result<&CatalogDocument, EfpError> {
        self.document
            .get_or_try_init(|| self.client.fetch_catalog())
            .await
    }

    pub async fn resolve(&self, diagram: &DiagramName) -> Result<SampleCatalogEntry, EfpError> {
        let document = self.document().await?;
        let Some(record) = document.get(diagram.as_str()) else {
            tracing::warn!(diagram = %diagram, "diagram not present in sample catalog");
            return Ok(SampleCatalogEntry::empty(diagram.clone()));
        };
        Ok(SampleCatalogEntry {
            diagram: diagram.clone(),
            database_source: record.db.clone(),
            regions: record.sample.clone(),
        })
    }
}
