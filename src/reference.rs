use std::future::Future;

use indexmap::IndexMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::{Endpoints, Timing};
use crate::domain::Locus;
use crate::error::EfpError;
use crate::http::{build_client, check_status, send_with_retries};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReferenceDocument {
    #[serde(default)]
    pub locus: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReferenceLookup {
    Found(Value),
    NoData { error: String },
}

impl ReferenceLookup {
    pub fn no_data(locus: &Locus) -> Self {
        ReferenceLookup::NoData {
            error: format!("No data for {}", locus.as_str()),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ReferenceLookup::Found(_))
    }
}

pub trait ReferenceClient: Send + Sync {
    fn fetch_reference(&self) -> impl Future<Output = Result<ReferenceDocument, EfpError>> + Send;
}

#[derive(Clone)]
pub struct ReferenceHttpClient {
    client: Client,
    url: String,
}

impl ReferenceHttpClient {
    pub fn new(endpoints: &Endpoints, timing: &Timing) -> Result<Self, EfpError> {
        let client = build_client(timing.http_timeout, EfpError::ReferenceHttp)?;
        Ok(Self {
            client,
            url: endpoints.reference.clone(),
        })
    }
}

impl ReferenceClient for ReferenceHttpClient {
    async fn fetch_reference(&self) -> Result<ReferenceDocument, EfpError> {
        tracing::info!(url = %self.url, "fetching reference expression values");
        let response =
            send_with_retries(|| self.client.get(&self.url), EfpError::ReferenceHttp).await?;
        let response = check_status(response, "reference request failed", |status, message| {
            EfpError::ReferenceStatus { status, message }
        })
        .await?;
        let text = response
            .text()
            .await
            .map_err(|err| EfpError::ReferenceHttp(err.to_string()))?;
        serde_json::from_str(&text).map_err(|err| EfpError::Decode {
            source_name: "reference values",
            message: err.to_string(),
        })
    }
}

pub struct ReferenceValues<C: ReferenceClient> {
    client: C,
    document: OnceCell<ReferenceDocument>,
}

impl<C: ReferenceClient> ReferenceValues<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            document: OnceCell::new(),
        }
    }

    pub async fn lookup(&self, locus: &Locus) -> Result<ReferenceLookup, EfpError> {
        let document = self
            .document
            .get_or_try_init(|| self.client.fetch_reference())
            .await?;
        Ok(lookup_in(document, locus))
    }
}

pub fn lookup_in(document: &ReferenceDocument, locus: &Locus) -> ReferenceLookup {
    match document.locus.get(locus.as_str()) {
        Some(stats) => ReferenceLookup::Found(stats.clone()),
        None => ReferenceLookup::no_data(locus),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_locus_yields_marker() {
        let document: ReferenceDocument =
            serde_json::from_value(json!({"locus": {"AT3G24650": {"max": 12.5}}})).unwrap();

        let found = lookup_in(&document, &"AT3G24650".parse().unwrap());
        assert_eq!(found, ReferenceLookup::Found(json!({"max": 12.5})));

        let missing = lookup_in(&document, &"AT1G01010".parse().unwrap());
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            json!({"error": "No data for AT1G01010"})
        );
    }
}
