use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::DiagramName;
use crate::outline::OutlineCache;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stroke {
    pub width: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionMetadata {
    pub expression_level: String,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverEvent {
    Enter,
    Leave,
}

#[derive(Debug, Clone)]
pub struct HoverBinding {
    region: String,
    outlines: OutlineCache,
}

impl HoverBinding {
    pub fn new(region: &str, outlines: OutlineCache) -> Self {
        Self {
            region: region.to_string(),
            outlines,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn dispatch(&self, event: HoverEvent, surface: &mut dyn RenderSurface) {
        match event {
            HoverEvent::Enter => self.outlines.emphasize(&self.region, surface),
            HoverEvent::Leave => self.outlines.restore(&self.region, surface),
        }
    }
}

pub trait RenderSurface {
    /// Region ids of `diagram`, or `None` while it is still loading.
    fn list_region_ids(&self, diagram: &DiagramName) -> Option<Vec<String>>;
    fn set_region_fill(&mut self, diagram: &DiagramName, region: &str, color: &str);
    fn set_region_metadata(&mut self, diagram: &DiagramName, region: &str, metadata: &RegionMetadata);
    fn set_region_tooltip(&mut self, diagram: &DiagramName, region: &str, text: &str);
    fn on_region_hover(&mut self, diagram: &DiagramName, region: &str, binding: HoverBinding);
    fn stroke(&self, region: &str) -> Stroke;
    fn set_stroke(&mut self, region: &str, stroke: Stroke);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionStyle {
    pub fill: Option<String>,
    pub metadata: Option<RegionMetadata>,
    pub tooltip: Option<String>,
    pub stroke: Stroke,
    pub hoverable: bool,
}

#[derive(Debug, Clone)]
pub struct StyleSheet {
    diagram: DiagramName,
    region_ids: Option<Vec<String>>,
    styles: IndexMap<String, RegionStyle>,
    hovers: IndexMap<String, HoverBinding>,
}

impl StyleSheet {
    pub fn new(diagram: DiagramName) -> Self {
        Self {
            diagram,
            region_ids: None,
            styles: IndexMap::new(),
            hovers: IndexMap::new(),
        }
    }

    pub fn loaded<I, S>(diagram: DiagramName, region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sheet = Self::new(diagram);
        sheet.load(region_ids);
        sheet
    }

    pub fn load<I, S>(&mut self, region_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.region_ids = Some(region_ids.into_iter().map(Into::into).collect());
    }

    pub fn diagram(&self) -> &DiagramName {
        &self.diagram
    }

    pub fn style(&self, region: &str) -> Option<&RegionStyle> {
        self.styles.get(region)
    }

    pub fn styles(&self) -> &IndexMap<String, RegionStyle> {
        &self.styles
    }

    pub fn with_stroke(mut self, region: &str, stroke: Stroke) -> Self {
        self.style_mut(region).stroke = stroke;
        self
    }

    pub fn hover(&mut self, region: &str, event: HoverEvent) -> bool {
        let Some(binding) = self.hovers.get(region).cloned() else {
            return false;
        };
        binding.dispatch(event, self);
        true
    }

    fn style_mut(&mut self, region: &str) -> &mut RegionStyle {
        self.styles.entry(region.to_string()).or_default()
    }

    fn owns(&self, diagram: &DiagramName) -> bool {
        &self.diagram == diagram
    }
}

impl RenderSurface for StyleSheet {
    fn list_region_ids(&self, diagram: &DiagramName) -> Option<Vec<String>> {
        if !self.owns(diagram) {
            return None;
        }
        self.region_ids.clone()
    }

    fn set_region_fill(&mut self, diagram: &DiagramName, region: &str, color: &str) {
        if self.owns(diagram) {
            self.style_mut(region).fill = Some(color.to_string());
        }
    }

    fn set_region_metadata(&mut self, diagram: &DiagramName, region: &str, metadata: &RegionMetadata) {
        if self.owns(diagram) {
            self.style_mut(region).metadata = Some(metadata.clone());
        }
    }

    fn set_region_tooltip(&mut self, diagram: &DiagramName, region: &str, text: &str) {
        if self.owns(diagram) {
            self.style_mut(region).tooltip = Some(text.to_string());
        }
    }

    fn on_region_hover(&mut self, diagram: &DiagramName, region: &str, binding: HoverBinding) {
        if self.owns(diagram) {
            self.style_mut(region).hoverable = true;
            self.hovers.insert(region.to_string(), binding);
        }
    }

    fn stroke(&self, region: &str) -> Stroke {
        self.styles
            .get(region)
            .map(|style| style.stroke.clone())
            .unwrap_or_default()
    }

    fn set_stroke(&mut self, region: &str, stroke: Stroke) {
        self.style_mut(region).stroke = stroke;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram() -> DiagramName {
        "leaf_diagram".parse().unwrap()
    }

    #[test]
    fn unloaded_sheet_lists_nothing() {
        let mut sheet = StyleSheet::new(diagram());
        assert_eq!(sheet.list_region_ids(&diagram()), None);
        sheet.load(["Leaf"]);
        assert_eq!(sheet.list_region_ids(&diagram()), Some(vec!["Leaf".to_string()]));
        assert_eq!(sheet.list_region_ids(&"other".parse().unwrap()), None);
    }

    #[test]
    fn hover_emphasizes_and_restores() {
        let outlines = OutlineCache::new();
        let stroke = Stroke {
            width: Some("2".to_string()),
            color: Some("#333333".to_string()),
        };
        let mut sheet = StyleSheet::loaded(diagram(), ["Leaf"]).with_stroke("Leaf", stroke.clone());
        sheet.on_region_hover(&diagram(), "Leaf", HoverBinding::new("Leaf", outlines.clone()));

        assert!(sheet.hover("Leaf", HoverEvent::Enter));
        let emphasized = &sheet.style("Leaf").unwrap().stroke;
        assert_eq!(emphasized.width.as_deref(), Some("8"));
        assert_eq!(emphasized.color.as_deref(), Some("#000000"));

        assert!(sheet.hover("Leaf", HoverEvent::Leave));
        assert_eq!(sheet.style("Leaf").unwrap().stroke, stroke);
        assert!(!sheet.hover("Stem", HoverEvent::Enter));
    }

    #[test]
    fn missing_stroke_uses_fallback_width() {
        let outlines = OutlineCache::new();
        let mut sheet = StyleSheet::loaded(diagram(), ["Leaf"]);
        sheet.on_region_hover(&diagram(), "Leaf", HoverBinding::new("Leaf", outlines.clone()));

        sheet.hover("Leaf", HoverEvent::Enter);
        assert_eq!(sheet.style("Leaf").unwrap().stroke.width.as_deref(), Some("6"));
        assert_eq!(
            outlines.captured("Leaf"),
            Some(Stroke {
                width: Some("0".to_string()),
                color: Some("none".to_string()),
            })
        );

        sheet.hover("Leaf", HoverEvent::Leave);
        let restored = &sheet.style("Leaf").unwrap().stroke;
        assert_eq!(restored.width.as_deref(), Some("0"));
        assert_eq!(restored.color.as_deref(), Some("none"));
    }

    #[test]
    fn restore_without_capture_uses_default_outline() {
        let outlines = OutlineCache::new();
        let mut sheet = StyleSheet::loaded(diagram(), ["Leaf"]);
        outlines.restore("Leaf", &mut sheet);
        let stroke = &sheet.style("Leaf").unwrap().stroke;
        assert_eq!(stroke.width.as_deref(), Some("1.5"));
        assert_eq!(stroke.color.as_deref(), Some("#000000"));
    }
}
