use serde::Serialize;

use crate::domain::{Locus, RawValue, compare_raw};
use crate::expression::FetchResult;
use crate::gradient::{clamp_percentage, percentage_to_color};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStatistics {
    pub region: String,
    pub raw_values: Vec<Option<RawValue>>,
    pub average: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub percentage: f64,
    pub expression_level: String,
    pub sample_size: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionExtreme {
    pub region: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationSummary {
    pub global_max: Option<f64>,
    pub global_min: Option<f64>,
    pub max_average: Option<RegionExtreme>,
    pub min_average: Option<RegionExtreme>,
}

impl AggregationSummary {
    fn observe(&mut self, region: &str, stats: &RegionValues) {
        fold(&mut self.global_max, stats.max, |candidate, current| {
            candidate > current
        });
        fold(&mut self.global_min, stats.min, |candidate, current| {
            candidate < current
        });
        fold_extreme(&mut self.max_average, region, stats.average, |candidate, current| {
            candidate > current
        });
        fold_extreme(&mut self.min_average, region, stats.average, |candidate, current| {
            candidate < current
        });
    }

    fn average_range(&self) -> Option<(f64, f64)> {
        match (&self.min_average, &self.max_average) {
            (Some(min), Some(max)) => Some((min.value, max.value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub regions: Vec<RegionStatistics>,
    pub summary: AggregationSummary,
}

impl Aggregation {
    pub fn region(&self, name: &str) -> Option<&RegionStatistics> {
        self.regions.iter().find(|stats| stats.region == name)
    }
}

struct RegionValues {
    raw: Vec<Option<RawValue>>,
    average: f64,
    min: Option<f64>,
    max: Option<f64>,
}

pub fn aggregate(result: &FetchResult, region_names: &[String], locus: &Locus) -> Aggregation {
    let mut summary = AggregationSummary::default();
    let mut collected = Vec::with_capacity(region_names.len());

    for region in region_names {
        let values = region_values(result, region, locus);
        summary.observe(region, &values);
        collected.push((region, values));
    }

    let regions = collected
        .into_iter()
        .map(|(region, values)| {
            let (percentage, level) = normalize(values.average, summary.average_range());
            RegionStatistics {
                region: region.clone(),
                sample_size: values.raw.len(),
                raw_values: values.raw,
                average: values.average,
                min: values.min,
                max: values.max,
                percentage,
                expression_level: format!("{level:.3}"),
                color: percentage_to_color(percentage).to_string(),
            }
        })
        .collect();

    Aggregation { regions, summary }
}

fn region_values(result: &FetchResult, region: &str, locus: &Locus) -> RegionValues {
    let mut raw: Vec<Option<RawValue>> = result
        .regions
        .get(region)
        .map(|samples| {
            samples
                .values()
                .map(|loci| loci.get(locus.as_str()).cloned())
                .collect()
        })
        .unwrap_or_default();
    raw.sort_by(|left, right| compare_raw(left.as_ref(), right.as_ref()));

    let numeric: Vec<f64> = raw
        .iter()
        .filter_map(|value| value.as_ref().and_then(RawValue::as_number))
        .collect();
    let average = numeric.iter().sum::<f64>() / numeric.len() as f64;

    // The region minimum is the second sorted value, not the first.
    RegionValues {
        min: numeric.get(1).copied(),
        max: numeric.last().copied(),
        average,
        raw,
    }
}

fn normalize(average: f64, range: Option<(f64, f64)>) -> (f64, f64) {
    let Some((min_average, max_average)) = range else {
        return (0.0, average);
    };
    let difference = average - min_average;
    let numerator = if difference < 0.0 { 0.0 } else { difference };
    let denominator = max_average - min_average;
    let percentage = if denominator == 0.0 {
        0.0
    } else {
        clamp_percentage(numerator / denominator * 100.0)
    };
    (percentage, numerator + min_average)
}

fn fold(running: &mut Option<f64>, candidate: Option<f64>, replaces: fn(f64, f64) -> bool) {
    let Some(candidate) = candidate.filter(|value| !value.is_nan()) else {
        return;
    };
    if running.is_none_or(|current| replaces(candidate, current)) {
        *running = Some(candidate);
    }
}

fn fold_extreme(
    running: &mut Option<RegionExtreme>,
    region: &str,
    candidate: f64,
    replaces: fn(f64, f64) -> bool,
) {
    if candidate.is_nan() {
        return;
    }
    let take = running
        .as_ref()
        .is_none_or(|current| replaces(candidate, current.value));
    if take {
        *running = Some(RegionExtreme {
            region: region.to_string(),
            value: candidate,
        });
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;

    const LOCUS: &str = "AT1G00000";

    fn fetch_result(regions: &[(&str, Vec<RawValue>)]) -> FetchResult {
        let mut result = FetchResult {
            database_source: Some("abiotic".to_string()),
            regions: IndexMap::new(),
        };
        for (region, values) in regions {
            let samples = result.regions.entry(region.to_string()).or_default();
            for (idx, value) in values.iter().enumerate() {
                samples
                    .entry(format!("{region}_{idx}"))
                    .or_default()
                    .insert(LOCUS.to_string(), value.clone());
            }
        }
        result
    }

    fn run(result: &FetchResult) -> Aggregation {
        aggregate(result, &result.region_names(), &LOCUS.parse().unwrap())
    }

    #[test]
    fn single_region_scenario() {
        let result = fetch_result(&[("Leaf", vec!["10".into(), "20".into()])]);
        let aggregation = run(&result);
        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.average, 15.0);
        assert_eq!(leaf.expression_level, "15.000");
        assert_eq!(leaf.sample_size, 2);
        assert_eq!(leaf.percentage, 0.0);
        assert_eq!(leaf.color, "#ffff00");
    }

    #[test]
    fn region_min_is_second_sorted_value() {
        let values = vec![
            RawValue::from(5.0),
            RawValue::from(1.0),
            RawValue::from(3.0),
            RawValue::from("x"),
            RawValue::from(2.0),
        ];
        let result = fetch_result(&[("Leaf", values)]);
        let aggregation = run(&result);
        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.min, Some(2.0));
        assert_eq!(leaf.max, Some(5.0));
        assert_eq!(leaf.average, 2.75);
        assert_eq!(leaf.sample_size, 5);
        assert_eq!(aggregation.summary.global_min, Some(2.0));
    }

    #[test]
    fn sort_happens_on_raw_strings() {
        let result = fetch_result(&[("Leaf", vec!["9".into(), "10".into()])]);
        let aggregation = run(&result);
        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.raw_values[0], Some(RawValue::from("10")));
        assert_eq!(leaf.max, Some(9.0));
    }

    #[test]
    fn percentages_span_min_and_max_average() {
        let result = fetch_result(&[
            ("Low", vec!["1".into(), "1".into()]),
            ("Mid", vec!["2".into(), "4".into()]),
            ("High", vec!["5".into(), "5".into()]),
        ]);
        let aggregation = run(&result);
        assert_eq!(aggregation.region("Low").unwrap().percentage, 0.0);
        assert_eq!(aggregation.region("Low").unwrap().color, "#ffff00");
        assert_eq!(aggregation.region("Mid").unwrap().percentage, 50.0);
        assert_eq!(aggregation.region("High").unwrap().percentage, 100.0);
        assert_eq!(aggregation.region("High").unwrap().color, "#ff0000");
        let summary = &aggregation.summary;
        assert_eq!(summary.min_average.as_ref().unwrap().region, "Low");
        assert_eq!(summary.max_average.as_ref().unwrap().region, "High");
    }

    #[test]
    fn ties_keep_first_region() {
        let result = fetch_result(&[
            ("First", vec!["4".into()]),
            ("Second", vec!["4".into()]),
        ]);
        let aggregation = run(&result);
        let summary = &aggregation.summary;
        assert_eq!(summary.max_average.as_ref().unwrap().region, "First");
        assert_eq!(summary.min_average.as_ref().unwrap().region, "First");
    }

    #[test]
    fn identical_averages_do_not_produce_nan() {
        let result = fetch_result(&[
            ("A", vec!["3".into(), "3".into()]),
            ("B", vec!["3".into()]),
        ]);
        let aggregation = run(&result);
        for stats in &aggregation.regions {
            assert_eq!(stats.percentage, 0.0);
            assert_eq!(stats.color, "#ffff00");
            assert_eq!(stats.expression_level, "3.000");
        }
    }

    #[test]
    fn region_without_numbers_stays_uncolored() {
        let result = fetch_result(&[
            ("Known", vec!["2".into(), "6".into()]),
            ("Unknown", vec!["n/a".into()]),
        ]);
        let aggregation = run(&result);
        let unknown = aggregation.region("Unknown").unwrap();
        assert!(unknown.average.is_nan());
        assert_eq!(unknown.percentage, 0.0);
        assert_eq!(unknown.color, "#ffff00");
        assert_eq!(unknown.sample_size, 1);
        assert_eq!(
            aggregation.summary.max_average.as_ref().unwrap().region,
            "Known"
        );
    }

    #[test]
    fn samples_missing_the_locus_still_count() {
        let mut result = fetch_result(&[("Leaf", vec!["4".into()])]);
        result.regions["Leaf"]
            .entry("other".to_string())
            .or_default()
            .insert("AT9G99999".to_string(), "7".into());
        let aggregation = run(&result);
        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.sample_size, 2);
        assert_eq!(leaf.raw_values.last(), Some(&None));
        assert_eq!(leaf.average, 4.0);
    }

    #[test]
    fn mixed_magnitudes_sort_on_exponent_form() {
        let result = fetch_result(&[
            (
                "Leaf",
                vec![RawValue::from(1e-7), RawValue::from(0.5), RawValue::from(0.25)],
            ),
            ("Stem", vec![RawValue::from(1e21), RawValue::from(5.0)]),
        ]);
        let aggregation = run(&result);

        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.raw_values.last(), Some(&Some(RawValue::from(1e-7))));
        assert_eq!(leaf.min, Some(0.5));
        assert_eq!(leaf.max, Some(1e-7));

        let stem = aggregation.region("Stem").unwrap();
        assert_eq!(stem.raw_values[0], Some(RawValue::from(1e21)));
        assert_eq!(stem.min, Some(5.0));
        assert_eq!(stem.max, Some(5.0));
    }

    #[test]
    fn empty_strings_are_counted_but_not_averaged() {
        let result = fetch_result(&[("Leaf", vec!["".into(), "4".into(), " ".into()])]);
        let aggregation = run(&result);
        let leaf = aggregation.region("Leaf").unwrap();
        assert_eq!(leaf.average, 4.0);
        assert_eq!(leaf.sample_size, 3);
        assert_eq!(leaf.expression_level, "4.000");
        assert_eq!(leaf.raw_values[0], Some(RawValue::from("")));
    }
}
