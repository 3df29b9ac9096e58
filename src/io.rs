use crate::error::{PipelineError, Result};
use crate::transform::GeoTransform;
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, Driver, DriverManager};
use log::{debug, info, warn};
use ndarray::Array2;
use std::path::Path;

pub const GTIFF_DRIVER: &str = "GTiff";

/// Everything needed to recreate a raster's layout, minus its pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub driver: String,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub data_type: GdalDataType,
    pub geotransform: Option<GeoTransform>,
    pub projection: String,
    pub nodata: Vec<Option<f64>>,
}

impl RasterMetadata {
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_georeferenced(&self) -> bool {
        self.geotransform.is_some() && !self.projection.is_empty()
    }
}

pub fn open_raster(path: &Path) -> Result<Dataset> {
    debug!("Opening raster: {}", path.display());
    Ok(Dataset::open(path)?)
}

/// Snapshot of a dataset's metadata
pub fn read_metadata(dataset: &Dataset) -> Result<RasterMetadata> {
    let (width, height) = dataset.raster_size();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions(width, height));
    }

    let band_count = dataset.raster_count();
    if band_count == 0 {
        return Err(PipelineError::InvalidDimensions(width, height));
    }

    let data_type = dataset.rasterband(1)?.band_type();
    let mut nodata = Vec::with_capacity(band_count);
    for band_index in 1..=band_count {
        nodata.push(dataset.rasterband(band_index)?.no_data_value());
    }

    Ok(RasterMetadata {
        driver: dataset.driver().short_name(),
        width,
        height,
        band_count,
        data_type,
        geotransform: dataset.geo_transform().ok().map(GeoTransform::from),
        projection: dataset.projection(),
        nodata,
    })
}

/// Read a window of one band into a row-major array
pub fn read_band_window<T: GdalType + Copy>(
    dataset: &Dataset,
    band_index: usize,
    offset: (usize, usize),
    size: (usize, usize),
) -> Result<Array2<T>> {
    let rasterband = dataset.rasterband(band_index)?;
    let (width, height) = size;

    debug!(
        "Reading band {}: offset=({},{}), size=({},{})",
        band_index, offset.0, offset.1, width, height
    );

    let buffer = rasterband.read_as::<T>(
        (offset.0 as isize, offset.1 as isize),
        (width, height),
        (width, height),
        None,
    )?;
    let data_vec: Vec<T> = buffer.into_iter().collect();
    Ok(Array2::from_shape_vec((height, width), data_vec)?)
}

/// Read a full band
pub fn read_band<T: GdalType + Copy>(dataset: &Dataset, band_index: usize) -> Result<Array2<T>> {
    let (width, height) = dataset.raster_size();
    read_band_window(dataset, band_index, (0, 0), (width, height))
}

fn create_typed(
    driver: &Driver,
    path: &Path,
    metadata: &RasterMetadata,
) -> Result<Dataset> {
    let (w, h, n) = (metadata.width, metadata.height, metadata.band_count);
    let dataset = match metadata.data_type {
        GdalDataType::UInt8 => driver.create_with_band_type::<u8, _>(path, w, h, n)?,
        #[cfg(gdal_has_int8)]
        GdalDataType::Int8 => driver.create_with_band_type::<i8, _>(path, w, h, n)?,
        GdalDataType::UInt16 => driver.create_with_band_type::<u16, _>(path, w, h, n)?,
        GdalDataType::Int16 => driver.create_with_band_type::<i16, _>(path, w, h, n)?,
        GdalDataType::UInt32 => driver.create_with_band_type::<u32, _>(path, w, h, n)?,
        GdalDataType::Int32 => driver.create_with_band_type::<i32, _>(path, w, h, n)?,
        #[cfg(gdal_has_int64)]
        GdalDataType::UInt64 => driver.create_with_band_type::<u64, _>(path, w, h, n)?,
        #[cfg(gdal_has_int64)]
        GdalDataType::Int64 => driver.create_with_band_type::<i64, _>(path, w, h, n)?,
        GdalDataType::Float32 => driver.create_with_band_type::<f32, _>(path, w, h, n)?,
        GdalDataType::Float64 => driver.create_with_band_type::<f64, _>(path, w, h, n)?,
        other => return Err(PipelineError::UnsupportedDataType(format!("{:?}", other))),
    };
    Ok(dataset)
}

/// Create an output dataset laid out exactly as `metadata` describes.
///
/// Georeferencing is only written when the metadata carries it, so a
/// metadata set without transform and projection yields a plain image.
pub fn create_output_dataset(path: &Path, metadata: &RasterMetadata) -> Result<Dataset> {
    info!(
        "Creating output raster: {} ({}x{}, {} band(s), {:?})",
        path.display(),
        metadata.width,
        metadata.height,
        metadata.band_count,
        metadata.data_type
    );

    let driver = DriverManager::get_driver_by_name(&metadata.driver)?;
    let mut dataset = create_typed(&driver, path, metadata)?;

    if let Some(geotransform) = metadata.geotransform {
        dataset.set_geo_transform(&geotransform.coefficients())?;
    }
    if !metadata.projection.is_empty() {
        dataset.set_projection(&metadata.projection)?;
    }

    for (i, nodata) in metadata.nodata.iter().enumerate() {
        if nodata.is_some() {
            dataset.rasterband(i + 1)?.set_no_data_value(*nodata)?;
        }
    }

    Ok(dataset)
}

/// Write a full band from a row-major array
pub fn write_band<T: GdalType + Copy>(
    dataset: &mut Dataset,
    band_index: usize,
    data: &Array2<T>,
) -> Result<()> {
    let (height, width) = data.dim();
    let (raster_width, raster_height) = dataset.raster_size();
    if (width, height) != (raster_width, raster_height) {
        return Err(PipelineError::DimensionMismatch {
            left_width: width,
            left_height: height,
            right_width: raster_width,
            right_height: raster_height,
        });
    }

    let mut raster_band = dataset.rasterband(band_index)?;
    let mut buffer = Buffer::new((width, height), data.iter().copied().collect());
    raster_band.write((0, 0), (width, height), &mut buffer)?;

    debug!("Wrote band {} ({}x{})", band_index, width, height);
    Ok(())
}

/// Run a writer; if it fails, remove whatever it left at `path`.
///
/// Datasets created inside `write` are dropped (and closed) before removal.
pub fn discard_on_error<T>(path: &Path, write: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = write();
    if result.is_err() && path.exists() {
        warn!("Removing incomplete output: {}", path.display());
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn mem_metadata(data_type: GdalDataType) -> RasterMetadata {
        RasterMetadata {
            driver: "MEM".to_string(),
            width: 3,
            height: 2,
            band_count: 1,
            data_type,
            geotransform: Some(GeoTransform([10.0, 1.0, 0.0, 20.0, 0.0, -1.0])),
            projection: String::new(),
            nodata: vec![Some(-1.0)],
        }
    }

    #[test]
    fn test_create_write_read_mem() {
        let metadata = mem_metadata(GdalDataType::Int16);
        let mut dataset = create_output_dataset(Path::new(""), &metadata).unwrap();
        let data = arr2(&[[1i16, 2, 3], [4, 5, 6]]);
        write_band(&mut dataset, 1, &data).unwrap();

        let read: Array2<i16> = read_band(&dataset, 1).unwrap();
        assert_eq!(read, data);

        let snapshot = read_metadata(&dataset).unwrap();
        assert_eq!(snapshot.dims(), (3, 2));
        assert_eq!(snapshot.data_type, GdalDataType::Int16);
        assert_eq!(snapshot.nodata, vec![Some(-1.0)]);
        assert_eq!(snapshot.geotransform, metadata.geotransform);
    }

    #[test]
    #[cfg(gdal_has_int64)]
    fn test_create_sixty_four_bit_bands() {
        let metadata = mem_metadata(GdalDataType::Int64);
        let mut dataset = create_output_dataset(Path::new(""), &metadata).unwrap();
        let data = arr2(&[[-5_000_000_000i64, 0, 1], [2, 3, 5_000_000_000]]);
        write_band(&mut dataset, 1, &data).unwrap();
        assert_eq!(read_band::<i64>(&dataset, 1).unwrap(), data);

        let dataset = create_output_dataset(Path::new(""), &mem_metadata(GdalDataType::UInt64)).unwrap();
        assert_eq!(read_metadata(&dataset).unwrap().data_type, GdalDataType::UInt64);
    }

    #[test]
    #[cfg(gdal_has_int8)]
    fn test_create_signed_byte_band() {
        let metadata = mem_metadata(GdalDataType::Int8);
        let mut dataset = create_output_dataset(Path::new(""), &metadata).unwrap();
        let data = arr2(&[[-128i8, -1, 0], [1, 64, 127]]);
        write_band(&mut dataset, 1, &data).unwrap();
        assert_eq!(read_band::<i8>(&dataset, 1).unwrap(), data);
    }

    #[test]
    fn test_read_window() {
        let metadata = mem_metadata(GdalDataType::Float32);
        let mut dataset = create_output_dataset(Path::new(""), &metadata).unwrap();
        write_band(&mut dataset, 1, &arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();

        let window: Array2<f64> = read_band_window(&dataset, 1, (1, 1), (2, 1)).unwrap();
        assert_eq!(window, arr2(&[[5.0, 6.0]]));
    }

    #[test]
    fn test_write_band_rejects_wrong_shape() {
        let metadata = mem_metadata(GdalDataType::Float32);
        let mut dataset = create_output_dataset(Path::new(""), &metadata).unwrap();
        let result = write_band(&mut dataset, 1, &arr2(&[[1.0f32, 2.0]]));
        assert!(matches!(result, Err(PipelineError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_unsupported_data_type() {
        let metadata = mem_metadata(GdalDataType::Unknown);
        let result = create_output_dataset(Path::new(""), &metadata);
        assert!(matches!(result, Err(PipelineError::UnsupportedDataType(_))));
    }

    #[test]
    fn test_discard_on_error_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.tif");

        let result: Result<()> = discard_on_error(&path, || {
            std::fs::write(&path, b"half written")?;
            Err(PipelineError::NotSingleBand(3))
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_discard_on_error_keeps_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.tif");

        discard_on_error(&path, || Ok(std::fs::write(&path, b"ok")?)).unwrap();
        assert!(path.exists());
    }
}
