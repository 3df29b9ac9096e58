use crate::error::{PipelineError, Result};
use crate::io::{self, RasterMetadata};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use log::info;
use ndarray::Array2;
use std::path::Path;

/// Metadata of `pixels` with transform and CRS taken from `reference`
pub fn merge_metadata(
    pixels: &RasterMetadata,
    reference: &RasterMetadata,
) -> Result<RasterMetadata> {
    if pixels.dims() != reference.dims() {
        return Err(PipelineError::DimensionMismatch {
            left_width: reference.width,
            left_height: reference.height,
            right_width: pixels.width,
            right_height: pixels.height,
        });
    }

    if !reference.is_georeferenced() {
        return Err(PipelineError::NotGeoreferenced);
    }

    Ok(RasterMetadata {
        geotransform: reference.geotransform,
        projection: reference.projection.clone(),
        ..pixels.clone()
    })
}

fn copy_bands<T: gdal::raster::GdalType + Copy>(
    source: &Dataset,
    output: &mut Dataset,
    band_count: usize,
) -> Result<()> {
    for band_index in 1..=band_count {
        let data: Array2<T> = io::read_band(source, band_index)?;
        io::write_band(output, band_index, &data)?;
    }
    Ok(())
}

/// Write the pixels of `filtered` to `dest` with the georeferencing of
/// `clipped`. Band count, data type and size follow `filtered`.
pub fn reattach_georeference(
    clipped: &Dataset,
    filtered: &Dataset,
    dest: &Path,
) -> Result<RasterMetadata> {
    let reference = io::read_metadata(clipped)?;
    let pixels = io::read_metadata(filtered)?;
    let out_meta = merge_metadata(&pixels, &reference)?;

    io::discard_on_error(dest, || {
        let mut output = io::create_output_dataset(dest, &out_meta)?;
        match out_meta.data_type {
            GdalDataType::Float32 => copy_bands::<f32>(filtered, &mut output, out_meta.band_count),
            _ => copy_bands::<f64>(filtered, &mut output, out_meta.band_count),
        }
    })?;

    info!("Reattached georeference: {}", dest.display());
    Ok(out_meta)
}
