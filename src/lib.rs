pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod expression;
pub mod gradient;
mod http;
pub mod outline;
pub mod output;
pub mod reference;
pub mod render;
pub mod surface;
