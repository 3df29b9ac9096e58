// Library exports for testing and reuse

pub mod aoi;
pub mod cli;
pub mod clip;
pub mod crs;
pub mod error;
pub mod filter;
pub mod georef;
pub mod io;
pub mod pipeline;
pub mod transform;
pub mod validate;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use io::RasterMetadata;
pub use pipeline::{run, ArtifactPaths, PipelineConfig, PipelineContext, PipelineOutcome};
pub use validate::{CheckOutcome, ValidationReport};
