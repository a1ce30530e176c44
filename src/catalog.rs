//! Wire types and client for the remote imagery catalog.
//!
//! The catalog speaks JSON over HTTPS: a bearer-authenticated listing call
//! per asset, paginated by continuation token. Single-image assets answer
//! the same call with one bare image object; [`EarthCatalog`] normalizes
//! that into a one-record page.

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::credentials::CredentialHandle;
use crate::error::{IndexError, Result};

/// Dimensions of a band grid in pixels.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GridDimensions {
    pub width: u32,
    pub height: u32,
}

/// Affine georeferencing coefficients. The catalog omits zero-valued
/// coefficients on the wire, most often the shear terms.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AffineTransform {
    #[serde(default)]
    pub scale_x: f64,
    #[serde(default)]
    pub shear_x: f64,
    #[serde(default)]
    pub translate_x: f64,
    #[serde(default)]
    pub shear_y: f64,
    #[serde(default)]
    pub scale_y: f64,
    #[serde(default)]
    pub translate_y: f64,
}

/// Pixel grid of a single band: dimensions, placement and spatial reference.
/// Compared by value when deduplicating the distinct grids of a record.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub dimensions: Option<GridDimensions>,
    pub affine_transform: Option<AffineTransform>,
    pub crs_code: Option<String>,
    pub crs_wkt: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RawBand {
    pub id: String,
    #[serde(default)]
    pub grid: Option<Grid>,
}

/// GeoJSON footprint as the catalog reports it. Coordinates arrive as
/// numbers, except for unbounded assets where the catalog emits the strings
/// `"Infinity"` and `"-Infinity"`.
#[derive(Deserialize, Clone, Debug)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_rings", default)]
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

/// One scene as listed by the catalog.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub bands: Vec<RawBand>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// One page of a listing. An exhausted or empty listing is a page with no
/// images and no token.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImagePage {
    #[serde(default)]
    pub images: Vec<RawImage>,
    pub next_page_token: Option<String>,
}

/// Raw listing response. A bare image always carries `name` and a page never
/// does, so the image arm is tried first.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ListingWire {
    Image(Box<RawImage>),
    Page(ImagePage),
}

impl ListingWire {
    fn into_page(self) -> ImagePage {
        match self {
            ListingWire::Page(page) => page,
            ListingWire::Image(image) => ImagePage {
                images: vec![*image],
                next_page_token: None,
            },
        }
    }
}

struct LenientF64(f64);

impl<'de> Deserialize<'de> for LenientF64 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LenientVisitor;

        impl<'de> Visitor<'de> for LenientVisitor {
            type Value = LenientF64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or an Infinity string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<LenientF64, E> {
                Ok(LenientF64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<LenientF64, E> {
                Ok(LenientF64(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<LenientF64, E> {
                Ok(LenientF64(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<LenientF64, E> {
                match v {
                    "Infinity" => Ok(LenientF64(f64::INFINITY)),
                    "-Infinity" => Ok(LenientF64(f64::NEG_INFINITY)),
                    other => other
                        .parse()
                        .map(LenientF64)
                        .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(LenientVisitor)
    }
}

fn lenient_rings<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<[f64; 2]>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rings: Vec<Vec<[LenientF64; 2]>> = Vec::deserialize(deserializer)?;
    Ok(rings
        .into_iter()
        .map(|ring| ring.into_iter().map(|[x, y]| [x.0, y.0]).collect())
        .collect())
}

/// Listing filter, serialized straight into the query string. The walker
/// owns `page_token`; callers leave it unset.
#[derive(Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl ImageFilter {
    /// The same filter narrowed to a time window.
    pub fn windowed(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            ..self.clone()
        }
    }
}

/// A closed GeoJSON polygon ring over a latitude and longitude range, in the
/// string form the catalog's `region` parameter expects.
pub fn region_polygon(latitude: (f64, f64), longitude: (f64, f64)) -> String {
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [longitude.0, latitude.0],
            [longitude.1, latitude.0],
            [longitude.1, latitude.1],
            [longitude.0, latitude.1],
            [longitude.0, latitude.0],
        ]],
    })
    .to_string()
}

/// Listing access to the imagery catalog.
pub trait CatalogApi {
    async fn list_images(&self, asset: &str, filter: &ImageFilter) -> Result<ImagePage>;
}

/// HTTP client for the catalog. Bearer tokens come from the injected
/// credential handle; a 401 triggers exactly one forced refresh and reissue.
pub struct EarthCatalog {
    http: reqwest::Client,
    endpoint: String,
    project: String,
    credentials: CredentialHandle,
}

impl EarthCatalog {
    pub fn new(endpoint: &str, project: &str, credentials: CredentialHandle) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            project: project.to_owned(),
            credentials,
        }
    }

    fn listing_url(&self, asset: &str) -> Result<Url> {
        let url = format!(
            "{}/projects/{}/assets/{}:listImages",
            self.endpoint, self.project, asset
        );
        Ok(Url::parse(&url)?)
    }

    async fn send(&self, url: &Url, filter: &ImageFilter) -> Result<reqwest::Response> {
        let mut request = self.http.get(url.clone()).query(filter);
        if let Some(token) = self.credentials.bearer() {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

impl CatalogApi for EarthCatalog {
    async fn list_images(self: &Self, asset: &str, filter: &ImageFilter) -> Result<ImagePage> {
        let url = self.listing_url(asset)?;
        debug!(asset, page_token = ?filter.page_token, "listing images");

        let mut response = self.send(&url, filter).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(asset, "catalog rejected the bearer token, refreshing once");
            self.credentials.force_refresh().await?;
            response = self.send(&url, filter).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(IndexError::CatalogStatus { status, detail });
        }

        let listing = response.json::<ListingWire>().await?;
        Ok(listing.into_page())
    }
}
