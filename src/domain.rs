use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EfpError;

const DIAGRAM_EXTENSION: &str = ".svg";

static LOCUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:-]*$").unwrap());

static AGI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^AT[1-5CM]G\d{5}(\.\d+)?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagramName(String);

impl DiagramName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagramName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DiagramName {
    type Err = EfpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let stem = trimmed.strip_suffix(DIAGRAM_EXTENSION).unwrap_or(trimmed);
        if stem.is_empty() {
            return Err(EfpError::InvalidDiagram(value.to_string()));
        }
        Ok(Self(stem.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locus(String);

impl Locus {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// AGI identifiers are shown with the second and fourth characters in
    /// lower case (`AT3G24650` becomes `At3g24650`); other ids are unchanged.
    pub fn display_form(&self) -> String {
        if !AGI_RE.is_match(&self.0) {
            return self.0.clone();
        }
        self.0
            .chars()
            .enumerate()
            .map(|(idx, ch)| {
                if idx == 1 || idx == 3 {
                    ch.to_ascii_lowercase()
                } else {
                    ch
                }
            })
            .collect()
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Locus {
    type Err = EfpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !LOCUS_RE.is_match(trimmed) {
            return Err(EfpError::InvalidLocus(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Converts a sample name as reported by the expression service into the
/// form stored in the sample catalog. `+` must be escaped before spaces are
/// turned into `+`, otherwise names containing `+` are corrupted.
pub fn escape_sample_name(name: &str) -> String {
    name.trim().replace('+', "%2B").replace(' ', "+")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(serde_json::Number),
    Text(String),
    #[default]
    Null,
    Other(serde_json::Value),
}

impl RawValue {
    /// String form used when ordering raw values, matching how a JSON value
    /// is stringified for a default array sort.
    pub fn sort_key(&self) -> String {
        match self {
            RawValue::Number(number) => match number.as_f64() {
                Some(value) => js_number_string(value),
                None => number.to_string(),
            },
            RawValue::Text(text) => text.clone(),
            RawValue::Null => "null".to_string(),
            RawValue::Other(value) => value.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(number) => number.as_f64(),
            RawValue::Text(text) => parse_numeric_text(text),
            RawValue::Null | RawValue::Other(_) => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(RawValue::Number)
            .unwrap_or(RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

pub fn compare_raw(left: Option<&RawValue>, right: Option<&RawValue>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.sort_key().cmp(&r.sort_key()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn js_number_string(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude < 1e-6 || magnitude >= 1e21 {
        // Exponent form with an explicit sign on non-negative exponents: 1e+21.
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    format!("{value}")
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        "" => None,
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => {
            let plausible = trimmed
                .chars()
                .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E'));
            if !plausible {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
    }
}
