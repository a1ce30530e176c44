//! Band tables for the whole-globe gridded products. These collections carry
//! their semantic names on the wire already.

pub(super) const SMAP_BANDS: &[(&str, &str)] = &[
    ("ssm", "ssm"),
    ("susm", "susm"),
    ("smp", "smp"),
    ("ssma", "ssma"),
    ("susma", "susma"),
];

pub(super) const SRTM_BANDS: &[(&str, &str)] = &[("elevation", "elevation")];

pub(super) const TRMM_BANDS: &[(&str, &str)] = &[
    ("precipitation", "precipitation"),
    ("relativeError", "relativeError"),
    ("gaugeRelativeWeighting", "gaugeRelativeWeighting"),
];

pub(super) const WORLDPOP_BANDS: &[(&str, &str)] = &[("population", "population")];
