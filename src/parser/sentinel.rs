//! Band tables for the Sentinel collections.

pub(super) const SENTINEL1_BANDS: &[(&str, &str)] = &[("VV", "vv"), ("VH", "vh")];

pub(super) const SENTINEL2_BANDS: &[(&str, &str)] = &[
    ("B1", "aerosols"),
    ("B2", "blue"),
    ("B3", "green"),
    ("B4", "red"),
    ("B5", "red_edge_1"),
    ("B6", "red_edge_2"),
    ("B7", "red_edge_3"),
    ("B8", "nir"),
    ("B8A", "red_edge_4"),
    ("B9", "water_vapor"),
    ("B11", "swir1"),
    ("B12", "swir2"),
    ("AOT", "aot"),
    ("WVP", "wvp"),
    ("SCL", "scl"),
    ("TCI_R", "tci_r"),
    ("TCI_G", "tci_g"),
    ("TCI_B", "tci_b"),
    ("QA60", "qa60"),
];
