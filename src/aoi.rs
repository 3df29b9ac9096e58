use crate::error::{PipelineError, Result};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::Geometry;
use log::{debug, info};

pub const WGS84_EPSG: u32 = 4326;

/// Geographic bounding box in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoiBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl AoiBounds {
    /// Small part of Venice. The literal corners have min/max latitude swapped.
    pub const VENICE: AoiBounds = AoiBounds {
        min_lon: 12.35,
        min_lat: 45.44,
        max_lon: 12.36,
        max_lat: 45.42,
    };

    /// Same box with each axis ordered min <= max
    pub fn normalized(&self) -> AoiBounds {
        AoiBounds {
            min_lon: self.min_lon.min(self.max_lon),
            min_lat: self.min_lat.min(self.max_lat),
            max_lon: self.min_lon.max(self.max_lon),
            max_lat: self.min_lat.max(self.max_lat),
        }
    }

    /// Closed exterior ring, counter-clockwise from the south-east corner
    pub fn ring(&self) -> Vec<(f64, f64)> {
        let b = self.normalized();
        vec![
            (b.max_lon, b.min_lat),
            (b.max_lon, b.max_lat),
            (b.min_lon, b.max_lat),
            (b.min_lon, b.min_lat),
            (b.max_lon, b.min_lat),
        ]
    }
}

impl Default for AoiBounds {
    fn default() -> Self {
        AoiBounds::VENICE
    }
}

/// AOI polygon expressed in a raster's native CRS
pub struct AoiGeometry {
    geometry: Geometry,
    ring: Vec<(f64, f64)>,
}

impl AoiGeometry {
    /// OGR polygon tagged with the raster's CRS
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Exterior ring vertices in CRS coordinates (closed)
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    /// (min_x, min_y, max_x, max_y) of the polygon
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.ring.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    /// GeoJSON geometry object, the form masking APIs take as shape input
    pub fn geojson(&self) -> Result<String> {
        Ok(self.geometry.json()?)
    }
}

fn traditional_order(mut spatial_ref: SpatialRef) -> SpatialRef {
    spatial_ref.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    spatial_ref
}

/// Build the AOI polygon in WGS84 and reproject its vertices into `target`
pub fn reproject_aoi(bounds: &AoiBounds, target: &SpatialRef) -> Result<AoiGeometry> {
    let source = traditional_order(SpatialRef::from_epsg(WGS84_EPSG)?);
    let target = traditional_order(target.clone());

    let ring = bounds.ring();
    debug!("AOI ring in EPSG:{}: {:?}", WGS84_EPSG, ring);

    let transform = CoordTransform::new(&source, &target)
        .map_err(|e| PipelineError::Reprojection(e.to_string()))?;

    let mut xs: Vec<f64> = ring.iter().map(|&(x, _)| x).collect();
    let mut ys: Vec<f64> = ring.iter().map(|&(_, y)| y).collect();
    let mut zs = vec![0.0; ring.len()];
    transform
        .transform_coords(&mut xs, &mut ys, &mut zs)
        .map_err(|e| PipelineError::Reprojection(e.to_string()))?;

    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::Reprojection(
            "transformed AOI has non-finite coordinates".to_string(),
        ));
    }

    let projected: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
    let wkt = polygon_wkt(&projected);
    let mut geometry =
        Geometry::from_wkt(&wkt).map_err(|e| PipelineError::Reprojection(e.to_string()))?;
    geometry.set_spatial_ref(target);

    info!("AOI reprojected into raster CRS: {}", wkt);
    Ok(AoiGeometry {
        geometry,
        ring: projected,
    })
}

fn polygon_wkt(ring: &[(f64, f64)]) -> String {
    let coords: Vec<String> = ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    format!("POLYGON (({}))", coords.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venice_bounds_are_normalized() {
        let b = AoiBounds::VENICE.normalized();
        assert_eq!(b.min_lon, 12.35);
        assert_eq!(b.max_lon, 12.36);
        assert_eq!(b.min_lat, 45.42);
        assert_eq!(b.max_lat, 45.44);
    }

    #[test]
    fn test_ring_is_closed() {
        let ring = AoiBounds::VENICE.ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_polygon_wkt() {
        let wkt = polygon_wkt(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(wkt, "POLYGON ((0 0, 1 0, 1 1, 0 0))");
    }

    #[test]
    fn test_reproject_into_utm_33n() {
        let target = SpatialRef::from_epsg(32633).unwrap();
        let aoi = reproject_aoi(&AoiBounds::VENICE, &target).unwrap();
        let (min_x, min_y, max_x, max_y) = aoi.bounds();

        // Venice sits west of the zone 33 central meridian (15E)
        assert!(min_x > 250_000.0 && max_x < 320_000.0, "x: {} {}", min_x, max_x);
        assert!(min_y > 5_020_000.0 && max_y < 5_050_000.0, "y: {} {}", min_y, max_y);
        // Roughly 0.01 deg of longitude by 0.02 deg of latitude
        assert!((max_x - min_x) > 600.0 && (max_x - min_x) < 1_000.0);
        assert!((max_y - min_y) > 2_000.0 && (max_y - min_y) < 2_500.0);
    }

    #[test]
    fn test_geojson_is_a_polygon() {
        let target = SpatialRef::from_epsg(32633).unwrap();
        let aoi = reproject_aoi(&AoiBounds::VENICE, &target).unwrap();
        let json = aoi.geojson().unwrap();
        assert!(json.contains("\"Polygon\""));
    }
}
