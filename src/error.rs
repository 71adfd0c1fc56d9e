use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EfpError {
    #[error("invalid locus: {0}")]
    InvalidLocus(String),

    #[error("invalid diagram name: {0}")]
    InvalidDiagram(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("sample catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("sample catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("expression request failed: {0}")]
    ExpressionHttp(String),

    #[error("expression service returned status {status}: {message}")]
    ExpressionStatus { status: u16, message: String },

    #[error("reference values request failed: {0}")]
    ReferenceHttp(String),

    #[error("reference values returned status {status}: {message}")]
    ReferenceStatus { status: u16, message: String },

    #[error("failed to decode {source_name} response: {message}")]
    Decode {
        source_name: &'static str,
        message: String,
    },

    #[error("render stalled in phase {phase} after {waited:?}")]
    #[diagnostic(help("the remote service or the diagram surface never became ready"))]
    Stall { phase: String, waited: Duration },
}

impl EfpError {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            EfpError::CatalogHttp(_)
                | EfpError::CatalogStatus { .. }
                | EfpError::ExpressionHttp(_)
                | EfpError::ExpressionStatus { .. }
                | EfpError::ReferenceHttp(_)
                | EfpError::ReferenceStatus { .. }
                | EfpError::Decode { .. }
        )
    }
}
