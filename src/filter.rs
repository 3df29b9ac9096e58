use crate::error::{PipelineError, Result};
use crate::io::{self, RasterMetadata, GTIFF_DRIVER};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

/// Laplacian aperture size
pub const APERTURE: usize = 5;

/// Second derivative taps for a 5-tap aperture
const DERIV2_5: [f32; APERTURE] = [1.0, 0.0, -2.0, 0.0, 1.0];
/// Binomial smoothing taps for a 5-tap aperture
const SMOOTH_5: [f32; APERTURE] = [1.0, 4.0, 6.0, 4.0, 1.0];

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let period = 2 * last;
    let mut i = index.rem_euclid(period);
    if i > last {
        i = period - i;
    }
    i as usize
}

/// Convolve each row with `kernel`
fn convolve_rows(data: &Array2<f32>, kernel: &[f32; APERTURE]) -> Array2<f32> {
    let (nrows, ncols) = data.dim();
    let half = (APERTURE / 2) as isize;
    Array2::from_shape_fn((nrows, ncols), |(row, col)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let c = reflect_101(col as isize + k as isize - half, ncols);
                w * data[[row, c]]
            })
            .sum()
    })
}

/// Convolve each column with `kernel`
fn convolve_cols(data: &Array2<f32>, kernel: &[f32; APERTURE]) -> Array2<f32> {
    let (nrows, ncols) = data.dim();
    let half = (APERTURE / 2) as isize;
    Array2::from_shape_fn((nrows, ncols), |(row, col)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let r = reflect_101(row as isize + k as isize - half, nrows);
                w * data[[r, col]]
            })
            .sum()
    })
}

/// Laplacian (d2/dx2 + d2/dy2) with a 5x5 aperture and reflect-101 borders.
///
/// Responses are signed and unscaled.
pub fn laplacian(data: &Array2<f32>) -> Array2<f32> {
    let d2x = convolve_cols(&convolve_rows(data, &DERIV2_5), &SMOOTH_5);
    let d2y = convolve_cols(&convolve_rows(data, &SMOOTH_5), &DERIV2_5);
    d2x + d2y
}

/// Filter the single band of `clipped` and write the response to `dest`
/// as float32 with no georeferencing.
pub fn sharpen_raster(clipped: &Dataset, dest: &Path) -> Result<RasterMetadata> {
    let band_count = clipped.raster_count();
    if band_count != 1 {
        return Err(PipelineError::NotSingleBand(band_count));
    }

    let (width, height) = clipped.raster_size();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions(width, height));
    }

    let pixels: Array2<f32> = io::read_band(clipped, 1)?;
    debug!("Applying {}x{} Laplacian to {}x{} band", APERTURE, APERTURE, width, height);
    let response = laplacian(&pixels);

    let out_meta = RasterMetadata {
        driver: GTIFF_DRIVER.to_string(),
        width,
        height,
        band_count: 1,
        data_type: GdalDataType::Float32,
        geotransform: None,
        projection: String::new(),
        nodata: vec![None],
    };

    io::discard_on_error(dest, || {
        let mut output = io::create_output_dataset(dest, &out_meta)?;
        io::write_band(&mut output, 1, &response)
    })?;

    info!("Wrote Laplacian response: {}", dest.display());
    Ok(out_meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn test_impulse_response_is_kernel() {
        let mut data = Array2::<f32>::zeros((9, 9));
        data[[4, 4]] = 1.0;
        let response = laplacian(&data);

        let expected = arr2(&[
            [2.0, 4.0, 4.0, 4.0, 2.0],
            [4.0, 0.0, -8.0, 0.0, 4.0],
            [4.0, -8.0, -24.0, -8.0, 4.0],
            [4.0, 0.0, -8.0, 0.0, 4.0],
            [2.0, 4.0, 4.0, 4.0, 2.0],
        ]);
        let centre = response.slice(ndarray::s![2..7, 2..7]);
        assert_eq!(centre, expected);
        assert_eq!(response[[0, 0]], 0.0);
    }

    #[test]
    fn test_constant_image_has_zero_response() {
        let data = Array2::<f32>::from_elem((6, 7), 42.0);
        let response = laplacian(&data);
        assert!(response.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_quadratic_ramp() {
        // f(x) = x^2: [1,0,-2,0,1] gives 8, smoothing sums to 16
        let data = Array2::from_shape_fn((9, 9), |(_, col)| (col * col) as f32);
        let response = laplacian(&data);
        assert_eq!(response[[4, 4]], 128.0);
        assert_eq!(response[[0, 4]], 128.0);
    }

    #[test]
    fn test_response_is_signed() {
        let mut data = Array2::<f32>::zeros((5, 5));
        data[[2, 2]] = 10.0;
        let response = laplacian(&data);
        assert!(response[[2, 2]] < 0.0);
        assert!(response[[0, 0]] > 0.0);
    }

    #[test]
    fn test_shape_preserved() {
        let data = Array2::<f32>::zeros((3, 11));
        assert_eq!(laplacian(&data).dim(), (3, 11));
    }
}
