use std::io::{self, Write};

use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::SampleCatalogEntry;
use crate::reference::ReferenceLookup;
use crate::render::RenderReport;
use crate::surface::{RegionStyle, StyleSheet};

#[derive(Debug, Serialize)]
struct RenderOutput<'a> {
    report: &'a RenderReport,
    styles: &'a IndexMap<String, RegionStyle>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_render(report: &RenderReport, sheet: &StyleSheet) -> io::Result<()> {
        Self::print_json(&RenderOutput {
            report,
            styles: sheet.styles(),
        })
    }

    pub fn print_catalog(entry: &SampleCatalogEntry) -> io::Result<()> {
        Self::print_json(entry)
    }

    pub fn print_reference(lookup: &ReferenceLookup) -> io::Result<()> {
        Self::print_json(lookup)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
