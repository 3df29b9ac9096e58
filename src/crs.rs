use crate::error::{PipelineError, Result};
use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use log::{debug, info, warn};

/// What the CRS of a raster looks like, property by property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsReport {
    pub present: bool,
    pub well_formed: bool,
    pub projected: bool,
    pub epsg: Option<u32>,
}

impl CrsReport {
    fn missing() -> Self {
        Self {
            present: false,
            well_formed: false,
            projected: false,
            epsg: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.present && self.well_formed && self.projected && self.epsg.is_some()
    }

    /// First failed property, if any
    pub fn failure_reason(&self) -> Option<&'static str> {
        if !self.present {
            Some("raster has no CRS")
        } else if !self.well_formed {
            Some("CRS definition is malformed")
        } else if !self.projected {
            Some("CRS is not projected")
        } else if self.epsg.is_none() {
            Some("CRS has no EPSG code")
        } else {
            None
        }
    }

    /// EPSG code of a valid CRS, or `InvalidCrs`
    pub fn require_valid(&self) -> Result<u32> {
        match (self.failure_reason(), self.epsg) {
            (None, Some(code)) => Ok(code),
            (reason, _) => Err(PipelineError::InvalidCrs(
                reason.unwrap_or("CRS has no EPSG code").to_string(),
            )),
        }
    }
}

/// Inspect the CRS attached to an open dataset
pub fn inspect_crs(dataset: &Dataset) -> CrsReport {
    inspect_wkt(&dataset.projection())
}

/// Inspect a CRS given as WKT; an empty string means no CRS
pub fn inspect_wkt(projection_wkt: &str) -> CrsReport {
    if projection_wkt.trim().is_empty() {
        debug!("No projection attached to raster");
        return CrsReport::missing();
    }

    let spatial_ref = match SpatialRef::from_wkt(projection_wkt) {
        Ok(sr) => sr,
        Err(e) => {
            warn!("Failed to parse projection WKT: {}", e);
            return CrsReport {
                present: true,
                ..CrsReport::missing()
            };
        }
    };

    CrsReport {
        present: true,
        well_formed: is_well_formed(&spatial_ref),
        projected: spatial_ref.is_projected() && !spatial_ref.is_geographic(),
        epsg: epsg_code(&spatial_ref),
    }
}

/// Structural validity as judged by `OSRValidate`
pub fn is_well_formed(spatial_ref: &SpatialRef) -> bool {
    let rc = unsafe { gdal_sys::OSRValidate(spatial_ref.to_c_hsrs()) };
    if rc != gdal_sys::OGRErr::OGRERR_NONE {
        debug!("OSRValidate rejected CRS (OGRErr {})", rc);
        return false;
    }
    true
}

/// Resolve the EPSG code of a CRS, falling back to GDAL's auto-identification
pub fn epsg_code(spatial_ref: &SpatialRef) -> Option<u32> {
    if let Some(code) = authority_epsg(spatial_ref) {
        return Some(code);
    }

    let mut identified = spatial_ref.clone();
    match identified.auto_identify_epsg() {
        Ok(()) => {
            let code = authority_epsg(&identified);
            debug!("Auto-identified EPSG code: {:?}", code);
            code
        }
        Err(e) => {
            debug!("EPSG auto-identification failed: {}", e);
            None
        }
    }
}

fn authority_epsg(spatial_ref: &SpatialRef) -> Option<u32> {
    let name = spatial_ref.auth_name().ok()?;
    if !name.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    spatial_ref
        .auth_code()
        .ok()
        .and_then(|code| u32::try_from(code).ok())
}

/// Check the input raster's CRS and return its EPSG code.
///
/// Fails with `InvalidCrs` when the CRS is missing, malformed, geographic
/// or not EPSG-coded. This is a hard precondition for every later stage.
pub fn validate_crs(dataset: &Dataset) -> Result<u32> {
    let report = inspect_crs(dataset);
    match report.require_valid() {
        Ok(code) => {
            info!("Input raster is valid and has valid CRS (EPSG:{})", code);
            Ok(code)
        }
        Err(e) => {
            warn!("Input raster does not have valid CRS: {:?}", report);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wkt_for(epsg: u32) -> String {
        SpatialRef::from_epsg(epsg).unwrap().to_wkt().unwrap()
    }

    #[test]
    fn test_missing_crs_is_rejected() {
        let report = inspect_wkt("");
        assert!(!report.is_valid());
        assert_eq!(report.failure_reason(), Some("raster has no CRS"));
        assert!(matches!(
            report.require_valid(),
            Err(PipelineError::InvalidCrs(_))
        ));
    }

    #[test]
    fn test_garbage_wkt_is_malformed() {
        let report = inspect_wkt("NOT A CRS");
        assert!(report.present);
        assert!(!report.well_formed);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_empty_spatial_ref_is_malformed() {
        let empty = SpatialRef::new().unwrap();
        assert!(!is_well_formed(&empty));
    }

    #[test]
    fn test_projected_crs_is_well_formed() {
        let sr = SpatialRef::from_epsg(32633).unwrap();
        assert!(is_well_formed(&sr));
    }

    #[test]
    fn test_utm_zone_33n_is_valid() {
        let report = inspect_wkt(&wkt_for(32633));
        assert!(report.is_valid(), "{:?}", report);
        assert_eq!(report.require_valid().unwrap(), 32633);
    }

    #[test]
    fn test_geographic_wgs84_is_rejected() {
        let report = inspect_wkt(&wkt_for(4326));
        assert!(report.well_formed);
        assert!(!report.projected);
        assert_eq!(report.epsg, Some(4326));
        assert_eq!(report.failure_reason(), Some("CRS is not projected"));
    }

    #[test]
    fn test_epsg_code_of_projected_crs() {
        let sr = SpatialRef::from_epsg(3857).unwrap();
        assert_eq!(epsg_code(&sr), Some(3857));
    }
}
