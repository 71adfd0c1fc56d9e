use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::js_number_string;
use crate::surface::{RenderSurface, Stroke};

const WIDTH_FACTOR: f64 = 4.0;
const MAX_SCALED_WIDTH: f64 = 10.0;
const FALLBACK_EMPHASIS_WIDTH: &str = "6";
const FALLBACK_RESTORE_WIDTH: &str = "1.5";
const OUTLINE_COLOR: &str = "#000000";

// The half-leaf drawing keeps its outline on a sibling element.
const HALF_LEAF_MARKER: &str = "Half_Leaf_Pseudomonas_syringae";

#[derive(Debug, Clone, Default)]
pub struct OutlineCache {
    captured: Arc<Mutex<HashMap<String, Stroke>>>,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn captured(&self, region: &str) -> Option<Stroke> {
        self.lock().get(&outline_target(region)).cloned()
    }

    pub fn emphasize(&self, region: &str, surface: &mut dyn RenderSurface) {
        let target = outline_target(region);
        let original = {
            let mut captured = self.lock();
            captured
                .entry(target.clone())
                .or_insert_with(|| {
                    let current = surface.stroke(&target);
                    Stroke {
                        width: Some(current.width.unwrap_or_else(|| "0".to_string())),
                        color: Some(current.color.unwrap_or_else(|| "none".to_string())),
                    }
                })
                .clone()
        };

        let scaled = parse_width(original.width.as_deref()) * WIDTH_FACTOR;
        let width = if scaled < MAX_SCALED_WIDTH && scaled != 0.0 {
            js_number_string(scaled)
        } else {
            FALLBACK_EMPHASIS_WIDTH.to_string()
        };
        surface.set_stroke(
            &target,
            Stroke {
                width: Some(width),
                color: Some(OUTLINE_COLOR.to_string()),
            },
        );
    }

    pub fn restore(&self, region: &str, surface: &mut dyn RenderSurface) {
        let target = outline_target(region);
        let original = self.lock().get(&target).cloned();
        let stroke = match original {
            Some(stroke) if parse_width(stroke.width.as_deref()) >= 0.0 => stroke,
            _ => Stroke {
                width: Some(FALLBACK_RESTORE_WIDTH.to_string()),
                color: Some(OUTLINE_COLOR.to_string()),
            },
        };
        surface.set_stroke(&target, stroke);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Stroke>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn outline_target(region: &str) -> String {
    if region.contains(HALF_LEAF_MARKER) {
        format!("{region}_outline")
    } else {
        region.to_string()
    }
}

fn parse_width(width: Option<&str>) -> f64 {
    width
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}
