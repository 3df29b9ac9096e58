use crate::aoi::AoiGeometry;
use crate::crs;
use crate::error::{PipelineError, Result};
use crate::io::{self, RasterMetadata, GTIFF_DRIVER};
use crate::transform::GeoTransform;
use gdal::raster::rasterize;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Geometry;
use gdal::{Dataset, DriverManager};
use log::{debug, info, log_enabled, warn, Level};
use ndarray::Array2;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipOptions {
    /// Tag the clipped raster with this EPSG code instead of the source's.
    /// `Some(32633)` reproduces the legacy behaviour of forcing UTM 33N.
    pub crs_override: Option<u32>,
}

/// Pixel window of the source raster covered by the AOI bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

/// Window spanning the polygon's pixel-space bounds, clamped to the raster.
/// Returns `None` when the polygon lies entirely outside.
pub fn geometry_window(
    ring_px: &[(f64, f64)],
    raster_width: usize,
    raster_height: usize,
) -> Option<ClipWindow> {
    if ring_px.is_empty() {
        return None;
    }

    let (min_col, min_row, max_col, max_row) = ring_px.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(col, row)| (a.min(col), b.min(row), c.max(col), d.max(row)),
    );

    let col_start = min_col.floor().max(0.0);
    let row_start = min_row.floor().max(0.0);
    let col_end = max_col.ceil().min(raster_width as f64);
    let row_end = max_row.ceil().min(raster_height as f64);

    if col_end <= col_start || row_end <= row_start {
        return None;
    }

    Some(ClipWindow {
        col_off: col_start as usize,
        row_off: row_start as usize,
        width: (col_end - col_start) as usize,
        height: (row_end - row_start) as usize,
    })
}

/// Burn the AOI into a byte mask covering `window`.
///
/// A pixel is covered when its centre falls inside the polygon.
pub fn rasterize_mask(
    geometry: &Geometry,
    geotransform: &GeoTransform,
    window: &ClipWindow,
) -> Result<Array2<bool>> {
    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut mask_ds =
        driver.create_with_band_type::<u8, _>("", window.width, window.height, 1)?;
    let mask_transform = geotransform.offset(window.col_off, window.row_off);
    mask_ds.set_geo_transform(&mask_transform.coefficients())?;

    rasterize(
        &mut mask_ds,
        &[1],
        std::slice::from_ref(geometry),
        &[1.0],
        None,
    )?;

    let burned: Array2<u8> = io::read_band(&mask_ds, 1)?;
    Ok(burned.mapv(|v| v != 0))
}

/// Clip `source` to the AOI and write the result to `dest` as GeoTIFF.
///
/// Pixels whose centre lies outside the polygon are set to the band's
/// nodata value (or 0).
/// The AOI is consumed; it has no use after masking.
pub fn clip_raster(
    source: &Dataset,
    aoi: AoiGeometry,
    dest: &Path,
    options: &ClipOptions,
) -> Result<RasterMetadata> {
    let source_meta = io::read_metadata(source)?;
    let geotransform = source_meta
        .geotransform
        .ok_or(PipelineError::MissingGeotransform)?;

    let inverse = geotransform.invert()?;
    let ring_px: Vec<(f64, f64)> = aoi
        .ring()
        .iter()
        .map(|&(x, y)| inverse.apply(x, y))
        .collect();

    let window = geometry_window(&ring_px, source_meta.width, source_meta.height)
        .ok_or(PipelineError::EmptyClip(0, 0))?;
    debug!("Clip window: {:?}", window);
    if log_enabled!(Level::Debug) {
        debug!("Masking with {}", aoi.geojson()?);
    }

    let mask = rasterize_mask(aoi.geometry(), &geotransform, &window)?;
    drop(aoi);
    if !mask.iter().any(|&covered| covered) {
        return Err(PipelineError::EmptyClip(window.width, window.height));
    }

    if window.width >= source_meta.width || window.height >= source_meta.height {
        return Err(PipelineError::ClipNotSubset {
            clip_width: window.width,
            clip_height: window.height,
            source_width: source_meta.width,
            source_height: source_meta.height,
        });
    }

    let source_epsg = crs::epsg_code(&source.spatial_ref()?).ok_or_else(|| {
        PipelineError::InvalidCrs("CRS has no EPSG code".to_string())
    })?;
    let output_epsg = match options.crs_override {
        Some(forced) if forced != source_epsg => {
            warn!(
                "Tagging clipped raster as EPSG:{} although the source is EPSG:{}",
                forced, source_epsg
            );
            forced
        }
        Some(forced) => forced,
        None => source_epsg,
    };

    let out_meta = RasterMetadata {
        driver: GTIFF_DRIVER.to_string(),
        width: window.width,
        height: window.height,
        geotransform: Some(geotransform.offset(window.col_off, window.row_off)),
        projection: SpatialRef::from_epsg(output_epsg)?.to_wkt()?,
        ..source_meta.clone()
    };

    io::discard_on_error(dest, || {
        let mut output = io::create_output_dataset(dest, &out_meta)?;
        for band_index in 1..=source_meta.band_count {
            let fill = source_meta.nodata[band_index - 1].unwrap_or(0.0);
            let mut pixels: Array2<f64> = io::read_band_window(
                source,
                band_index,
                (window.col_off, window.row_off),
                (window.width, window.height),
            )?;
            ndarray::Zip::from(&mut pixels)
                .and(&mask)
                .for_each(|value, &covered| {
                    if !covered {
                        *value = fill;
                    }
                });
            io::write_band(&mut output, band_index, &pixels)?;
        }
        Ok(())
    })?;

    info!(
        "Clipped {}x{} to {}x{} at EPSG:{}",
        source_meta.width, source_meta.height, window.width, window.height, output_epsg
    );
    Ok(out_meta)
}
