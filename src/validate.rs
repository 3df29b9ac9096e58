use crate::error::Result;
use crate::io::{self, RasterMetadata};
use gdal::raster::GdalDataType;
use log::{info, warn};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "passed" } else { "failed" };
        write!(f, "{} test {} ({})", self.name, verdict, self.detail)
    }
}

/// Independent post-run checks; a failed check never aborts the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub checks: Vec<CheckOutcome>,
}

impl ValidationReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

fn check_clip(source: &RasterMetadata, clipped: &RasterMetadata) -> CheckOutcome {
    CheckOutcome {
        name: "clip",
        passed: source.height > clipped.height && source.width > clipped.width,
        detail: format!(
            "{}x{} from {}x{}",
            clipped.width, clipped.height, source.width, source.height
        ),
    }
}

fn check_sharpen(sharpened: &RasterMetadata) -> CheckOutcome {
    CheckOutcome {
        name: "sharpen",
        passed: sharpened.band_count == 1 && sharpened.data_type == GdalDataType::Float32,
        detail: format!(
            "{} band(s) of {:?}",
            sharpened.band_count, sharpened.data_type
        ),
    }
}

fn check_georeference(clipped: &RasterMetadata, sharpened: &RasterMetadata) -> CheckOutcome {
    let same_transform = match (clipped.geotransform, sharpened.geotransform) {
        (Some(a), Some(b)) => a
            .coefficients()
            .iter()
            .zip(b.coefficients().iter())
            .all(|(x, y)| x.to_bits() == y.to_bits()),
        _ => false,
    };
    let same_crs = !clipped.projection.is_empty() && clipped.projection == sharpened.projection;

    CheckOutcome {
        name: "georeference",
        passed: same_transform && same_crs,
        detail: format!("transform match: {}, CRS match: {}", same_transform, same_crs),
    }
}

/// Compare the metadata of the three rasters of one run
pub fn validate_outputs(
    source: &RasterMetadata,
    clipped: &RasterMetadata,
    sharpened_geo: &RasterMetadata,
) -> ValidationReport {
    let report = ValidationReport {
        checks: vec![
            check_clip(source, clipped),
            check_sharpen(sharpened_geo),
            check_georeference(clipped, sharpened_geo),
        ],
    };

    for check in &report.checks {
        if check.passed {
            info!("{}", check);
        } else {
            warn!("{}", check);
        }
    }
    report
}

/// Reopen the rasters from disk and validate them
pub fn validate_files(
    source: &Path,
    clipped: &Path,
    sharpened_geo: &Path,
) -> Result<ValidationReport> {
    let source_meta = io::read_metadata(&io::open_raster(source)?)?;
    let clipped_meta = io::read_metadata(&io::open_raster(clipped)?)?;
    let sharpened_meta = io::read_metadata(&io::open_raster(sharpened_geo)?)?;
    Ok(validate_outputs(&source_meta, &clipped_meta, &sharpened_meta))
}
