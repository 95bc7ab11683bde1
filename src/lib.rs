pub mod config;
pub mod geo;
pub mod headers;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod pipeline;
pub mod routes;

pub use config::Config;
pub use pipeline::{parse_all, EnrichmentRecord, Enricher, ParsedRequest, RequestMetadata};
