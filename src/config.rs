use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::EfpError;

pub const DEFAULT_CONFIG_FILE: &str = "efp-tissue.json";
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/BioAnalyticResource/ePlant_Plant_eFP/master/data/SampleData.json";
pub const DEFAULT_EXPRESSION_URL: &str =
    "https://bar.utoronto.ca/~asullivan/webservices/plantefp.cgi";
pub const DEFAULT_REFERENCE_URL: &str = "https://raw.githubusercontent.com/BioAnalyticResource/ePlant_Plant_eFP/master/data/topExpressionValues.json";

const STRESS_CONDITIONS: [&str; 10] = [
    "Control", "Cold", "Osmotic", "Salt", "Drought", "Genotoxic", "Oxidative", "UV-B", "Wounding",
    "Heat",
];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub endpoints: Option<EndpointsEntry>,
    #[serde(default)]
    pub timing: Option<TimingEntry>,
    #[serde(default)]
    pub alias_groups: Option<Vec<AliasGroup>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// All values in milliseconds, except `poll_budget` which counts ticks.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimingEntry {
    #[serde(default)]
    pub http_timeout_ms: Option<u64>,
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub poll_budget: Option<u32>,
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AliasGroup {
    pub name: String,
    pub regions: Vec<String>,
}

impl AliasGroup {
    pub fn contains(&self, region: &str) -> bool {
        self.regions.iter().any(|member| member == region)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub catalog: String,
    pub expression: String,
    pub reference: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG_URL.to_string(),
            expression: DEFAULT_EXPRESSION_URL.to_string(),
            reference: DEFAULT_REFERENCE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub http_timeout: Duration,
    pub fetch_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_budget: u32,
    pub settle_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(100),
            poll_budget: 200,
            settle_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub endpoints: Endpoints,
    pub timing: Timing,
    pub alias_groups: Vec<AliasGroup>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            endpoints: Endpoints::default(),
            timing: Timing::default(),
            alias_groups: default_alias_groups(),
        }
    }
}

impl ResolvedConfig {
    pub fn alias_group_for(&self, region: &str) -> Option<&AliasGroup> {
        self.alias_groups.iter().find(|group| group.contains(region))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EfpError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EfpError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EfpError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, EfpError> {
        let defaults = ResolvedConfig::default();
        let schema_version = config.schema_version.unwrap_or(1);

        let endpoints = match config.endpoints {
            Some(entry) => Endpoints {
                catalog: entry.catalog.unwrap_or(defaults.endpoints.catalog),
                expression: entry.expression.unwrap_or(defaults.endpoints.expression),
                reference: entry.reference.unwrap_or(defaults.endpoints.reference),
            },
            None => defaults.endpoints,
        };
        for url in [&endpoints.catalog, &endpoints.expression, &endpoints.reference] {
            reqwest::Url::parse(url)
                .map_err(|err| EfpError::ConfigValue(format!("{url}: {err}")))?;
        }

        let timing = match config.timing {
            Some(entry) => Timing {
                http_timeout: entry
                    .http_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.timing.http_timeout),
                fetch_timeout: entry
                    .fetch_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.timing.fetch_timeout),
                poll_interval: entry
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.timing.poll_interval),
                poll_budget: entry.poll_budget.unwrap_or(defaults.timing.poll_budget),
                settle_delay: entry
                    .settle_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.timing.settle_delay),
            },
            None => defaults.timing,
        };
        if timing.poll_budget == 0 {
            return Err(EfpError::ConfigValue(
                "timing.poll_budget must be at least 1".to_string(),
            ));
        }

        let alias_groups = config.alias_groups.unwrap_or(defaults.alias_groups);
        for group in &alias_groups {
            if group.regions.is_empty() {
                return Err(EfpError::ConfigValue(format!(
                    "alias group {} has no regions",
                    group.name
                )));
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            endpoints,
            timing,
            alias_groups,
        })
    }
}

pub fn default_alias_groups() -> Vec<AliasGroup> {
    ["Shoot", "Root"]
        .into_iter()
        .map(|organ| AliasGroup {
            name: format!("{}_0_hour", organ.to_lowercase()),
            regions: STRESS_CONDITIONS
                .iter()
                .map(|condition| format!("{condition}_{organ}_0_Hour"))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.endpoints, Endpoints::default());
        assert_eq!(resolved.timing.poll_budget, 200);
        assert_eq!(resolved.alias_groups.len(), 2);
    }

    #[test]
    fn default_alias_groups_match_duplicate_regions() {
        let groups = default_alias_groups();
        assert_eq!(groups[0].regions.len(), 10);
        assert_eq!(groups[0].regions[0], "Control_Shoot_0_Hour");
        assert!(groups[0].contains("UV-B_Shoot_0_Hour"));
        assert_eq!(groups[1].regions[9], "Heat_Root_0_Hour");
    }
}
