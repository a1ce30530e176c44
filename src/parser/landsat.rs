//! Band tables for the Landsat surface-reflectance collections, raw catalog
//! band id to semantic name.

pub(super) const LANDSAT7_BANDS: &[(&str, &str)] = &[
    ("B1", "blue"),
    ("B2", "green"),
    ("B3", "red"),
    ("B4", "nir"),
    ("B5", "swir1"),
    ("B6", "lwir"),
    ("B7", "swir2"),
    ("sr_atmos_opacity", "sr_atmos_opacity"),
    ("sr_cloud_qa", "sr_cloud_qa"),
    ("pixel_qa", "pixel_qa"),
    ("radsat_qa", "radsat_qa"),
];

pub(super) const LANDSAT8_BANDS: &[(&str, &str)] = &[
    ("B1", "coastal_aerosol"),
    ("B2", "blue"),
    ("B3", "green"),
    ("B4", "red"),
    ("B5", "nir"),
    ("B6", "swir1"),
    ("B7", "swir2"),
    ("B10", "lwir1"),
    ("B11", "lwir2"),
    ("pixel_qa", "pixel_qa"),
    ("sr_aerosol", "sr_aerosol"),
    ("radsat_qa", "radsat_qa"),
];
