use crate::aoi::{self, AoiBounds};
use crate::clip::{self, ClipOptions};
use crate::crs;
use crate::error::Result;
use crate::filter;
use crate::georef;
use crate::io::{self, RasterMetadata};
use crate::validate::{self, ValidationReport};
use log::info;
use std::path::{Path, PathBuf};

pub const CLIPPED_FILE: &str = "clipped.tif";
pub const SHARPENED_FILE: &str = "sharpened.tif";
pub const SHARPENED_GEO_FILE: &str = "sharpened_geo.tif";

/// Input path and the three artifacts a run writes next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub input: PathBuf,
    pub clipped: PathBuf,
    pub sharpened: PathBuf,
    pub sharpened_geo: PathBuf,
}

impl ArtifactPaths {
    pub fn for_input(input: &Path) -> Self {
        let dir = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            input: input.to_path_buf(),
            clipped: dir.join(CLIPPED_FILE),
            sharpened: dir.join(SHARPENED_FILE),
            sharpened_geo: dir.join(SHARPENED_GEO_FILE),
        }
    }

    pub fn outputs(&self) -> [&Path; 3] {
        [&self.clipped, &self.sharpened, &self.sharpened_geo]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub aoi: AoiBounds,
    pub clip: ClipOptions,
}

/// State threaded from one stage to the next
#[derive(Debug)]
pub struct PipelineContext {
    config: PipelineConfig,
    paths: ArtifactPaths,
    source_epsg: Option<u32>,
    clipped: Option<RasterMetadata>,
    sharpened: Option<RasterMetadata>,
    sharpened_geo: Option<RasterMetadata>,
}

/// What a completed run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub paths: ArtifactPaths,
    pub source_epsg: u32,
    pub clipped: RasterMetadata,
    pub sharpened: RasterMetadata,
    pub sharpened_geo: RasterMetadata,
    pub report: ValidationReport,
}

impl PipelineContext {
    pub fn new(input: &Path, config: PipelineConfig) -> Self {
        Self {
            config,
            paths: ArtifactPaths::for_input(input),
            source_epsg: None,
            clipped: None,
            sharpened: None,
            sharpened_geo: None,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// EPSG code of the input, once the CRS check has passed
    pub fn source_epsg(&self) -> Option<u32> {
        self.source_epsg
    }

    /// Reject inputs without a projected, EPSG-coded CRS
    pub fn check_crs(&mut self) -> Result<u32> {
        let epsg = io::open_raster(&self.paths.input)
            .and_then(|source| crs::validate_crs(&source))
            .map_err(|e| e.in_stage("CRS validation"))?;
        self.source_epsg = Some(epsg);
        Ok(epsg)
    }

    /// Reproject the AOI and clip the input to it
    pub fn clip(&mut self) -> Result<&RasterMetadata> {
        let clipped = self.clip_input().map_err(|e| e.in_stage("clip"))?;
        info!("Clipping is successful: {}", self.paths.clipped.display());
        Ok(&*self.clipped.insert(clipped))
    }

    fn clip_input(&self) -> Result<RasterMetadata> {
        let source = io::open_raster(&self.paths.input)?;
        let target = source.spatial_ref()?;
        let aoi = aoi::reproject_aoi(&self.config.aoi, &target)
            .map_err(|e| e.in_stage("AOI reprojection"))?;
        clip::clip_raster(&source, aoi, &self.paths.clipped, &self.config.clip)
    }

    /// Laplacian filter of the clipped raster, without georeferencing
    pub fn sharpen(&mut self) -> Result<&RasterMetadata> {
        let sharpened = io::open_raster(&self.paths.clipped)
            .and_then(|clipped| filter::sharpen_raster(&clipped, &self.paths.sharpened))
            .map_err(|e| e.in_stage("sharpen"))?;
        Ok(&*self.sharpened.insert(sharpened))
    }

    /// Copy the clipped raster's transform and CRS onto the filter output
    pub fn reattach(&mut self) -> Result<&RasterMetadata> {
        let final_meta = self.reattach_outputs().map_err(|e| e.in_stage("georeference"))?;
        info!(
            "Image sharpening is successful: {}",
            self.paths.sharpened_geo.display()
        );
        Ok(&*self.sharpened_geo.insert(final_meta))
    }

    fn reattach_outputs(&self) -> Result<RasterMetadata> {
        let clipped = io::open_raster(&self.paths.clipped)?;
        let filtered = io::open_raster(&self.paths.sharpened)?;
        georef::reattach_georeference(&clipped, &filtered, &self.paths.sharpened_geo)
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        validate::validate_files(
            &self.paths.input,
            &self.paths.clipped,
            &self.paths.sharpened_geo,
        )
        .map_err(|e| e.in_stage("validation"))
    }

    /// Run every stage in order. Errors carry the name of the failing stage.
    pub fn run(mut self) -> Result<PipelineOutcome> {
        let source_epsg = self.check_crs()?;
        let clipped = self.clip()?.clone();
        let sharpened = self.sharpen()?.clone();
        let sharpened_geo = self.reattach()?.clone();
        let report = self.validate()?;

        Ok(PipelineOutcome {
            paths: self.paths,
            source_epsg,
            clipped,
            sharpened,
            sharpened_geo,
            report,
        })
    }
}

/// Process one raster with the given configuration
pub fn run(input: &Path, config: PipelineConfig) -> Result<PipelineOutcome> {
    PipelineContext::new(input, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_artifact_paths_next_to_input() {
        let paths = ArtifactPaths::for_input(Path::new("/data/scenes/venice.tif"));
        assert_eq!(paths.clipped, PathBuf::from("/data/scenes/clipped.tif"));
        assert_eq!(paths.sharpened, PathBuf::from("/data/scenes/sharpened.tif"));
        assert_eq!(
            paths.sharpened_geo,
            PathBuf::from("/data/scenes/sharpened_geo.tif")
        );
    }

    #[test]
    fn test_artifact_paths_bare_filename() {
        let paths = ArtifactPaths::for_input(Path::new("venice.tif"));
        assert_eq!(paths.clipped, PathBuf::from("./clipped.tif"));
        assert_eq!(paths.outputs().len(), 3);
    }

    #[test]
    fn test_missing_input_fails_in_crs_stage() {
        let mut ctx = PipelineContext::new(
            Path::new("/nonexistent/scene.tif"),
            PipelineConfig::default(),
        );
        let err = ctx.check_crs().unwrap_err();
        assert!(matches!(err, PipelineError::Stage { stage: "CRS validation", .. }));
        assert_eq!(ctx.source_epsg(), None);
    }

    #[test]
    fn test_sharpen_without_clip_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = PipelineContext::new(&dir.path().join("scene.tif"), PipelineConfig::default());
        let err = ctx.sharpen().unwrap_err();
        assert!(matches!(err, PipelineError::Stage { stage: "sharpen", .. }));
        assert!(!ctx.paths().sharpened.exists());
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.aoi, AoiBounds::VENICE);
        assert_eq!(config.clip.crs_override, None);
    }
}
