use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Area of interest cannot be reprojected: {0}")]
    Reprojection(String),

    #[error("Area of interest does not intersect the raster (window {0}x{1})")]
    EmptyClip(usize, usize),

    #[error("Clip is not a proper subset of the source: {clip_width}x{clip_height} from {source_width}x{source_height}")]
    ClipNotSubset {
        clip_width: usize,
        clip_height: usize,
        source_width: usize,
        source_height: usize,
    },

    #[error("Expected a single-band raster, found {0} bands")]
    NotSingleBand(usize),

    #[error("Unsupported band data type: {0}")]
    UnsupportedDataType(String),

    #[error("Raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Raster dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize,
    },

    #[error("Raster has no geotransform")]
    MissingGeotransform,

    #[error("Reference raster lacks a geotransform or projection")]
    NotGeoreferenced,

    #[error("Geotransform is not invertible: {0:?}")]
    SingularTransform([f64; 6]),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Tag an error with the pipeline stage that raised it
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, with stage wrappers removed
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
