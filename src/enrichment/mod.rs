//! Translation and smart-reply enrichment of transcript updates

mod pipeline;

pub use pipeline::{EnrichmentConfig, EnrichmentPipeline};
