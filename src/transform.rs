use crate::error::{PipelineError, Result};

/// GDAL-ordered affine geotransform:
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Map pixel space (col, row) to CRS coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (
            c[0] + col * c[1] + row * c[2],
            c[3] + col * c[4] + row * c[5],
        )
    }

    /// Inverse mapping, CRS coordinates back to pixel space
    pub fn invert(&self) -> Result<GeoTransform> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det.abs() < f64::EPSILON {
            return Err(PipelineError::SingularTransform(self.0));
        }

        let inv_det = 1.0 / det;
        let a = c[5] * inv_det;
        let b = -c[2] * inv_det;
        let d = -c[4] * inv_det;
        let e = c[1] * inv_det;

        Ok(GeoTransform([
            -(a * c[0] + b * c[3]),
            a,
            b,
            -(d * c[0] + e * c[3]),
            d,
            e,
        ]))
    }

    /// Transform whose origin sits at pixel (col_off, row_off) of this one
    pub fn offset(&self, col_off: usize, row_off: usize) -> GeoTransform {
        let (x0, y0) = self.apply(col_off as f64, row_off as f64);
        let c = &self.0;
        GeoTransform([x0, c[1], c[2], y0, c[4], c[5]])
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(coefficients: [f64; 6]) -> Self {
        GeoTransform(coefficients)
    }
}
