//! Per-platform normalization of raw catalog records.
//!
//! Each supported platform fixes a band table, the descriptive strings the
//! dataset index expects, and how the footprint is derived. Scene-quad
//! platforms read and reproject the record geometry; whole-globe products
//! always cover the full geographic extent.

mod global;
mod landsat;
mod sentinel;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::{Grid, RawImage};
use crate::error::SceneError;
use crate::index::ProductDescriptor;
use crate::transform::{
    parse_epsg_code, project_corners, ring_is_finite, scene_corners, Corners, LonLat, SpatialRef,
    Xy, WHOLE_GLOBE,
};

/// Scheme prefix for record identities and band paths.
pub const RECORD_PREFIX: &str = "EEDAI";

/// The platforms this indexer understands, keyed by the platform code a
/// registered product declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Landsat7,
    Landsat8,
    Sentinel1,
    Sentinel2,
    Smap,
    Srtm,
    Trmm,
    Worldpop,
}

enum Footprint {
    SceneQuad,
    WholeGlobe,
}

/// A scene normalized for document building. Timestamps all carry the same
/// instant; `bands` maps semantic name to raw band id in product order.
#[derive(Clone, Debug)]
pub struct NormalizedMetadata {
    pub id: Uuid,
    pub creation: DateTime<Utc>,
    pub product_type: &'static str,
    pub platform: &'static str,
    pub instrument: &'static str,
    pub format: &'static str,
    pub coord: Corners<LonLat>,
    pub geo_ref_points: Corners<Xy>,
    pub spatial_reference: String,
    pub path: String,
    pub bands: Vec<(String, String)>,
    pub grids: Vec<GridShape>,
}

/// One distinct pixel grid of a record: `[height, width]` and the six affine
/// coefficients in `[scale_x, shear_x, translate_x, shear_y, scale_y,
/// translate_y]` order.
#[derive(Clone, Debug, PartialEq)]
pub struct GridShape {
    pub shape: [u32; 2],
    pub transform: [f64; 6],
}

/// Stable identity of a record, scoped to the product it is indexed under
/// when one is bound.
pub fn scene_identity(product: Option<&str>, name: &str) -> Uuid {
    let seed = match product {
        Some(product) => format!("{RECORD_PREFIX}:{product}/{name}"),
        None => format!("{RECORD_PREFIX}:{name}"),
    };
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
}

impl Platform {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "LANDSAT_7" => Some(Self::Landsat7),
            "LANDSAT_8" => Some(Self::Landsat8),
            "SENTINEL-1" => Some(Self::Sentinel1),
            "SENTINEL-2" => Some(Self::Sentinel2),
            "SMAP" => Some(Self::Smap),
            "STS" => Some(Self::Srtm),
            "TRMM" => Some(Self::Trmm),
            "WORLDPOP" => Some(Self::Worldpop),
            _ => None,
        }
    }

    pub fn product_type(&self) -> &'static str {
        match self {
            Self::Landsat7 => "LEDAPS",
            Self::Landsat8 => "LaSRC",
            Self::Sentinel1 => "GRD",
            Self::Sentinel2 => "SR",
            Self::Smap => "SMAP",
            Self::Srtm => "DEM",
            Self::Trmm => "TRMM",
            Self::Worldpop => "WORLDPOP",
        }
    }

    pub fn platform_code(&self) -> &'static str {
        match self {
            Self::Landsat7 => "LANDSAT_7",
            Self::Landsat8 => "LANDSAT_8",
            Self::Sentinel1 => "SENTINEL-1",
            Self::Sentinel2 => "SENTINEL-2",
            Self::Smap => "SMAP",
            Self::Srtm => "STS",
            Self::Trmm => "TRMM",
            Self::Worldpop => "WORLDPOP",
        }
    }

    pub fn instrument(&self) -> &'static str {
        match self {
            Self::Landsat7 => "ETM",
            Self::Landsat8 => "OLI_TIRS",
            Self::Sentinel1 => "Synthetic Aperture Radar",
            Self::Sentinel2 => "MSI",
            Self::Smap => "SMAP",
            Self::Srtm => "SRTM",
            Self::Trmm => "TRMM",
            Self::Worldpop => "WORLDPOP",
        }
    }

    pub fn band_table(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Landsat7 => landsat::LANDSAT7_BANDS,
            Self::Landsat8 => landsat::LANDSAT8_BANDS,
            Self::Sentinel1 => sentinel::SENTINEL1_BANDS,
            Self::Sentinel2 => sentinel::SENTINEL2_BANDS,
            Self::Smap => global::SMAP_BANDS,
            Self::Srtm => global::SRTM_BANDS,
            Self::Trmm => global::TRMM_BANDS,
            Self::Worldpop => global::WORLDPOP_BANDS,
        }
    }

    fn footprint(&self) -> Footprint {
        match self {
            Self::Landsat7 | Self::Landsat8 | Self::Sentinel1 | Self::Sentinel2 => {
                Footprint::SceneQuad
            }
            Self::Smap | Self::Srtm | Self::Trmm | Self::Worldpop => Footprint::WholeGlobe,
        }
    }

    /// True when every band the product declares is present on the record,
    /// going through this platform's table to translate semantic names to
    /// raw band ids.
    pub fn has_required_bands(&self, image: &RawImage, product: &ProductDescriptor) -> bool {
        let present: HashSet<&str> = image.bands.iter().map(|band| band.id.as_str()).collect();
        product.bands.iter().all(|semantic| {
            self.band_table()
                .iter()
                .any(|(raw, name)| *name == semantic.as_str() && present.contains(*raw))
        })
    }

    /// Normalizes one raw record. Band completeness is not checked here;
    /// callers filter records first.
    pub fn parse(
        &self,
        image: &RawImage,
        product: Option<&ProductDescriptor>,
    ) -> Result<NormalizedMetadata, SceneError> {
        if image.bands.is_empty() {
            return Err(SceneError::NoBands);
        }
        let creation = image
            .start_time
            .or(image.end_time)
            .ok_or(SceneError::MissingTimestamp)?;
        let spatial_ref = resolve_spatial_ref(image)?;

        let (coord, geo_ref_points) = match self.footprint() {
            Footprint::WholeGlobe => (WHOLE_GLOBE, WHOLE_GLOBE.to_plane()),
            Footprint::SceneQuad => {
                let ring = primary_ring(image)?;
                if ring_is_finite(ring) {
                    let coord = scene_corners(ring)?;
                    let geo_ref_points = project_corners(&coord, &spatial_ref)?;
                    (coord, geo_ref_points)
                } else {
                    (WHOLE_GLOBE, WHOLE_GLOBE.to_plane())
                }
            }
        };

        Ok(NormalizedMetadata {
            id: scene_identity(product.map(|p| p.name.as_str()), &image.name),
            creation,
            product_type: self.product_type(),
            platform: self.platform_code(),
            instrument: self.instrument(),
            format: "GeoTIFF",
            coord,
            geo_ref_points,
            spatial_reference: spatial_ref.to_string(),
            path: image.name.clone(),
            bands: self.band_mapping(image, product),
            grids: extract_grids(image),
        })
    }

    fn band_mapping(
        &self,
        image: &RawImage,
        product: Option<&ProductDescriptor>,
    ) -> Vec<(String, String)> {
        let present: HashSet<&str> = image.bands.iter().map(|band| band.id.as_str()).collect();
        let table = self.band_table();
        match product {
            Some(product) => product
                .bands
                .iter()
                .filter_map(|semantic| {
                    table
                        .iter()
                        .find(|(_, name)| *name == semantic.as_str())
                        .filter(|(raw, _)| present.contains(*raw))
                        .map(|(raw, _)| (semantic.clone(), (*raw).to_owned()))
                })
                .collect(),
            None => table
                .iter()
                .filter(|(raw, _)| present.contains(*raw))
                .map(|(raw, semantic)| ((*semantic).to_owned(), (*raw).to_owned()))
                .collect(),
        }
    }
}

fn primary_ring(image: &RawImage) -> Result<&[[f64; 2]], SceneError> {
    let geometry = image
        .geometry
        .as_ref()
        .ok_or_else(|| SceneError::BadGeometry("no geometry on record".into()))?;
    if geometry.kind != "Polygon" {
        return Err(SceneError::BadGeometry(format!(
            "unsupported geometry kind {:?}",
            geometry.kind
        )));
    }
    let ring = geometry
        .coordinates
        .first()
        .ok_or_else(|| SceneError::BadGeometry("polygon has no rings".into()))?;
    Ok(ring)
}

/// The spatial reference from the first band that declares one, preferring
/// an explicit CRS code over well-known text.
fn resolve_spatial_ref(image: &RawImage) -> Result<SpatialRef, SceneError> {
    for band in &image.bands {
        let Some(grid) = &band.grid else { continue };
        if let Some(code) = &grid.crs_code {
            return Ok(match parse_epsg_code(code) {
                Some(epsg) => SpatialRef::Epsg(epsg),
                None => SpatialRef::Wkt(code.clone()),
            });
        }
        if let Some(wkt) = &grid.crs_wkt {
            return Ok(SpatialRef::Wkt(wkt.clone()));
        }
    }
    Err(SceneError::UnresolvedCrs(
        "no band declares a spatial reference".into(),
    ))
}

/// Distinct grids of the record in first-seen order, compared whole.
fn extract_grids(image: &RawImage) -> Vec<GridShape> {
    let mut seen: Vec<&Grid> = Vec::new();
    let mut grids = Vec::new();
    for band in &image.bands {
        let Some(grid) = &band.grid else { continue };
        if seen.contains(&grid) {
            continue;
        }
        seen.push(grid);
        if let (Some(dimensions), Some(affine)) = (grid.dimensions, grid.affine_transform) {
            grids.push(GridShape {
                shape: [dimensions.height, dimensions.width],
                transform: [
                    affine.scale_x,
                    affine.shear_x,
                    affine.translate_x,
                    affine.shear_y,
                    affine.scale_y,
                    affine.translate_y,
                ],
            });
        }
    }
    grids
}
