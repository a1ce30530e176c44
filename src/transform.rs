//! Corner-point extraction and reprojection between the geographic reference
//! (EPSG:4326) and a scene grid's native reference.
//!
//! Projection math is implemented here directly: the supported targets are
//! the identity (EPSG:4326), the UTM zones scenes actually arrive in
//! (EPSG:326xx north / 327xx south, transverse Mercator on WGS84) and web
//! Mercator (EPSG:3857). Anything else is reported as unresolvable.

use std::f64::consts::PI;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// A geographic corner point, decimal degrees.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

/// A corner point in a grid's native units.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

/// The four named corners of a scene footprint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Corners<T> {
    pub ul: T,
    pub ur: T,
    pub ll: T,
    pub lr: T,
}

impl<T> Corners<T> {
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Corners<U> {
        Corners {
            ul: f(&self.ul),
            ur: f(&self.ur),
            ll: f(&self.ll),
            lr: f(&self.lr),
        }
    }
}

impl Corners<LonLat> {
    /// Reads degrees straight across as planar units, lon as x and lat as y.
    /// Used for EPSG:4326 grids and the whole-globe substitute, where the
    /// native units are the geographic ones.
    pub fn to_plane(&self) -> Corners<Xy> {
        self.map(|p| Xy { x: p.lon, y: p.lat })
    }
}

/// Canonical whole-globe corner set, substituted for geometries the catalog
/// reports as unbounded.
pub const WHOLE_GLOBE: Corners<LonLat> = Corners {
    ul: LonLat {
        lon: -180.0,
        lat: 90.0,
    },
    ur: LonLat {
        lon: 180.0,
        lat: 90.0,
    },
    ll: LonLat {
        lon: -180.0,
        lat: -90.0,
    },
    lr: LonLat {
        lon: 180.0,
        lat: -90.0,
    },
};

/// True when every coordinate of the ring is a finite number. The catalog
/// emits infinite coordinates for global assets; those rings must never reach
/// `project_corners`.
pub fn ring_is_finite(ring: &[[f64; 2]]) -> bool {
    ring.iter().all(|p| p[0].is_finite() && p[1].is_finite())
}

/// Rotation-aware corner extraction: each named corner is the whole vertex
/// holding the extreme value, so a quadrilateral rotated off the axes keeps
/// its true corners. `ul` takes the max-Y vertex, `ur` max-X, `ll` min-X and
/// `lr` min-Y.
pub fn scene_corners(ring: &[[f64; 2]]) -> Result<Corners<LonLat>, SceneError> {
    if ring.is_empty() {
        return Err(SceneError::BadGeometry("empty ring".into()));
    }
    let pick = |cmp: fn(&[f64; 2], &[f64; 2]) -> bool| {
        let mut best = &ring[0];
        for p in &ring[1..] {
            if cmp(p, best) {
                best = p;
            }
        }
        LonLat {
            lon: best[0],
            lat: best[1],
        }
    };
    Ok(Corners {
        ul: pick(|p, best| p[1] > best[1]),
        ur: pick(|p, best| p[0] > best[0]),
        ll: pick(|p, best| p[0] < best[0]),
        lr: pick(|p, best| p[1] < best[1]),
    })
}

/// Axis-aligned bounding-box corners from min/max of each axis, for geometry
/// known to be axis-aligned already.
pub fn bounding_corners(ring: &[[f64; 2]]) -> Result<Corners<LonLat>, SceneError> {
    if ring.is_empty() {
        return Err(SceneError::BadGeometry("empty ring".into()));
    }
    let mut xmin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for p in ring {
        xmin = xmin.min(p[0]);
        xmax = xmax.max(p[0]);
        ymin = ymin.min(p[1]);
        ymax = ymax.max(p[1]);
    }
    Ok(Corners {
        ul: LonLat {
            lon: xmin,
            lat: ymax,
        },
        ur: LonLat {
            lon: xmax,
            lat: ymax,
        },
        ll: LonLat {
            lon: xmin,
            lat: ymin,
        },
        lr: LonLat {
            lon: xmax,
            lat: ymin,
        },
    })
}

/// The spatial reference a record's bands declare: an EPSG code when the
/// catalog supplies one, otherwise the raw well-known text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpatialRef {
    Epsg(u32),
    Wkt(String),
}

impl SpatialRef {
    /// The EPSG code, recovering it from a WKT `AUTHORITY["EPSG","<n>"]`
    /// clause when only well-known text was supplied. The last AUTHORITY
    /// clause names the whole CRS, so that one wins.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            SpatialRef::Epsg(code) => Some(*code),
            SpatialRef::Wkt(wkt) => epsg_from_wkt(wkt),
        }
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialRef::Epsg(code) => write!(f, "EPSG:{code}"),
            SpatialRef::Wkt(wkt) => f.write_str(wkt),
        }
    }
}

/// Parses catalog CRS codes of the `EPSG:<n>` form.
pub fn parse_epsg_code(code: &str) -> Option<u32> {
    let (authority, number) = code.split_once(':')?;
    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }
    number.trim().parse().ok()
}

fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    let re = Regex::new(r#"AUTHORITY\["EPSG",\s*"(\d+)"\]"#)
        .expect("Regex pattern should always compile");
    re.captures_iter(wkt)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Reprojects the four named geographic corners into the target reference,
/// preserving corner naming. Coordinates must be finite; callers substitute
/// [`WHOLE_GLOBE`] for unbounded geometry before reaching this point.
pub fn project_corners(
    corners: &Corners<LonLat>,
    spatial_ref: &SpatialRef,
) -> Result<Corners<Xy>, SceneError> {
    let code = spatial_ref
        .epsg()
        .ok_or_else(|| SceneError::UnresolvedCrs(spatial_ref.to_string()))?;
    match code {
        4326 => Ok(corners.to_plane()),
        3857 => Ok(corners.map(|p| web_mercator(p))),
        32601..=32660 => {
            let tm = TransverseMercator::utm_zone(code - 32600, false);
            Ok(corners.map(|p| tm.forward(p)))
        }
        32701..=32760 => {
            let tm = TransverseMercator::utm_zone(code - 32700, true);
            Ok(corners.map(|p| tm.forward(p)))
        }
        other => Err(SceneError::UnresolvedCrs(format!("EPSG:{other}"))),
    }
}

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const TO_RAD: f64 = PI / 180.0;

fn web_mercator(p: &LonLat) -> Xy {
    Xy {
        x: WGS84_A * p.lon * TO_RAD,
        y: WGS84_A * (PI / 4.0 + p.lat * TO_RAD / 2.0).tan().ln(),
    }
}

/// Transverse Mercator on the WGS84 ellipsoid, in the UTM parameterization.
///
/// Forward series after Snyder, good to well under a meter anywhere inside a
/// 6-degree zone.
struct TransverseMercator {
    lon0: f64,
    false_northing: f64,
}

impl TransverseMercator {
    const K0: f64 = 0.9996;
    const FALSE_EASTING: f64 = 500_000.0;

    fn utm_zone(zone: u32, south: bool) -> Self {
        Self {
            lon0: (zone as f64 * 6.0 - 183.0) * TO_RAD,
            false_northing: if south { 10_000_000.0 } else { 0.0 },
        }
    }

    fn forward(&self, p: &LonLat) -> Xy {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let lat = p.lat * TO_RAD;
        let lon = p.lon * TO_RAD;

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a = (lon - self.lon0) * cos_lat;

        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * lat
                - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                    * (2.0 * lat).sin()
                + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * lat).sin()
                - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * lat).sin());

        let x = Self::K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + Self::FALSE_EASTING;

        let y = Self::K0
            * (m + n
                * tan_lat
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0))
            + self.false_northing;

        Xy { x, y }
    }
}
