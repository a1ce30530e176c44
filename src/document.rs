//! Dataset-index document assembly.
//!
//! [`build_document`] is pure: everything it needs was normalized by the
//! parser, and writing the same metadata always yields the same document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parser::{NormalizedMetadata, RECORD_PREFIX};
use crate::transform::{Corners, LonLat, Xy};

/// Write-once ingest document for one dataset.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IngestDocument {
    pub id: Uuid,
    pub creation_dt: DateTime<Utc>,
    pub product_type: String,
    pub platform: Coded,
    pub instrument: Named,
    pub format: Named,
    pub extent: Extent,
    pub grid_spatial: GridSpatial,
    pub image: ImageBands,
    pub lineage: Lineage,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Coded {
    pub code: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Named {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Extent {
    pub from_dt: DateTime<Utc>,
    pub to_dt: DateTime<Utc>,
    pub center_dt: DateTime<Utc>,
    pub coord: Corners<LonLat>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GridSpatial {
    pub projection: Projection,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Projection {
    pub geo_ref_points: Corners<Xy>,
    pub spatial_reference: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImageBands {
    pub bands: BTreeMap<String, BandRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BandRef {
    pub path: String,
    pub layer: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Lineage {
    pub source_datasets: BTreeMap<String, serde_json::Value>,
}

/// Assembles the ingest document for one normalized scene. Each mapped band
/// appears exactly once; all four timestamps carry the scene's instant.
pub fn build_document(metadata: &NormalizedMetadata) -> IngestDocument {
    let bands = metadata
        .bands
        .iter()
        .map(|(semantic, raw)| {
            (
                semantic.clone(),
                BandRef {
                    path: format!("{RECORD_PREFIX}:{}:{raw}", metadata.path),
                    layer: 1,
                },
            )
        })
        .collect();

    IngestDocument {
        id: metadata.id,
        creation_dt: metadata.creation,
        product_type: metadata.product_type.to_owned(),
        platform: Coded {
            code: metadata.platform.to_owned(),
        },
        instrument: Named {
            name: metadata.instrument.to_owned(),
        },
        format: Named {
            name: metadata.format.to_owned(),
        },
        extent: Extent {
            from_dt: metadata.creation,
            to_dt: metadata.creation,
            center_dt: metadata.creation,
            coord: metadata.coord,
        },
        grid_spatial: GridSpatial {
            projection: Projection {
                geo_ref_points: metadata.geo_ref_points,
                spatial_reference: metadata.spatial_reference.clone(),
            },
        },
        image: ImageBands { bands },
        lineage: Lineage {
            source_datasets: BTreeMap::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::scene_identity;
    use crate::transform::WHOLE_GLOBE;

    fn metadata() -> NormalizedMetadata {
        let name = "projects/earth/assets/LANDSAT/LC08/01/T1_SR/LC08_044034_20170412";
        NormalizedMetadata {
            id: scene_identity(Some("ls8_test"), name),
            creation: "2017-04-12T18:20:15Z".parse().unwrap(),
            product_type: "LaSRC",
            platform: "LANDSAT_8",
            instrument: "OLI_TIRS",
            format: "GeoTIFF",
            coord: WHOLE_GLOBE,
            geo_ref_points: WHOLE_GLOBE.to_plane(),
            spatial_reference: "EPSG:32610".to_owned(),
            path: name.to_owned(),
            bands: [("blue", "B2"), ("green", "B3"), ("red", "B4"), ("nir", "B5")]
                .iter()
                .map(|(semantic, raw)| ((*semantic).to_owned(), (*raw).to_owned()))
                .collect(),
            grids: Vec::new(),
        }
    }

    #[test]
    fn test_document_carries_every_mapped_band_once() {
        let document = build_document(&metadata());
        assert_eq!(document.image.bands.len(), 4);
        let blue = &document.image.bands["blue"];
        assert_eq!(
            blue.path,
            "EEDAI:projects/earth/assets/LANDSAT/LC08/01/T1_SR/LC08_044034_20170412:B2"
        );
        assert_eq!(blue.layer, 1);
    }

    #[test]
    fn test_document_timestamps_all_match_creation() {
        let document = build_document(&metadata());
        assert_eq!(document.extent.from_dt, document.creation_dt);
        assert_eq!(document.extent.to_dt, document.creation_dt);
        assert_eq!(document.extent.center_dt, document.creation_dt);
    }

    #[test]
    fn test_document_shape_on_the_wire() {
        let value = serde_json::to_value(build_document(&metadata())).unwrap();

        assert_eq!(value["product_type"], "LaSRC");
        assert_eq!(value["platform"]["code"], "LANDSAT_8");
        assert_eq!(value["instrument"]["name"], "OLI_TIRS");
        assert_eq!(value["format"]["name"], "GeoTIFF");
        assert_eq!(value["extent"]["coord"]["ul"]["lon"], -180.0);
        assert_eq!(value["extent"]["coord"]["ul"]["lat"], 90.0);
        assert_eq!(
            value["grid_spatial"]["projection"]["geo_ref_points"]["lr"]["x"],
            180.0
        );
        assert_eq!(
            value["grid_spatial"]["projection"]["spatial_reference"],
            "EPSG:32610"
        );
        assert_eq!(value["image"]["bands"]["nir"]["layer"], 1);
        assert_eq!(
            value["lineage"]["source_datasets"],
            serde_json::json!({})
        );
        // The id is the stable scoped identity, serialized as a string.
        assert!(value["id"].is_string());
    }

    #[test]
    fn test_building_twice_yields_identical_documents() {
        let first = serde_json::to_value(build_document(&metadata())).unwrap();
        let second = serde_json::to_value(build_document(&metadata())).unwrap();
        assert_eq!(first, second);
    }
}
