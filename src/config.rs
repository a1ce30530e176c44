//! TOML settings for the indexer binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::ProductDescriptor;

/// Environment variable naming a service-account token file. When set it
/// overrides the settings file and selects service-mode credentials.
pub const CREDENTIALS_ENV: &str = "EO_INDEXER_CREDENTIALS";

fn default_endpoint() -> String {
    "https://earthengine.googleapis.com/v1alpha".to_owned()
}

fn default_project() -> String {
    "earthengine-public".to_owned()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub credentials_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            project: default_project(),
            token_uri: default_token_uri(),
            credentials_file: None,
        }
    }
}

impl Settings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The service-account file to use, environment override first.
    pub fn service_account_file(self: &Self) -> Option<PathBuf> {
        std::env::var_os(CREDENTIALS_ENV)
            .map(PathBuf::from)
            .or_else(|| self.credentials_file.clone())
    }
}

/// Product definitions for dry runs against the in-memory index. The real
/// dataset index carries its own product registry.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ProductRegistry {
    #[serde(default)]
    pub products: Vec<ProductDescriptor>,
}

impl ProductRegistry {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let registry: Self = toml::from_str(&content)?;
        Ok(registry)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_PATH: &str = "/tmp/eo-indexer-settings.toml";

    #[test]
    fn test_write_then_read_round_trips() {
        let settings = Settings {
            project: "my-project".to_owned(),
            credentials_file: Some(PathBuf::from("/etc/eo-indexer/key.json")),
            ..Default::default()
        };
        settings.write(SETTINGS_PATH).unwrap();

        let read = Settings::read(SETTINGS_PATH).unwrap();
        assert_eq!(read.project, "my-project");
        assert_eq!(read.endpoint, "https://earthengine.googleapis.com/v1alpha");
        assert_eq!(
            read.credentials_file.as_deref(),
            Some(Path::new("/etc/eo-indexer/key.json"))
        );
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let settings: Settings = toml::from_str("project = \"other\"").unwrap();
        assert_eq!(settings.project, "other");
        assert_eq!(settings.endpoint, "https://earthengine.googleapis.com/v1alpha");
        assert_eq!(settings.token_uri, "https://oauth2.googleapis.com/token");
        assert!(settings.credentials_file.is_none());
    }

    #[test]
    fn test_product_registry_round_trips() {
        let path = "/tmp/eo-indexer-products.toml";
        let registry = ProductRegistry {
            products: vec![ProductDescriptor {
                name: "ls8_test".to_owned(),
                platform: "LANDSAT_8".to_owned(),
                bands: ["blue", "green", "red", "nir"]
                    .iter()
                    .map(|band| (*band).to_owned())
                    .collect(),
            }],
        };
        registry.write(path).unwrap();

        let read = ProductRegistry::read(path).unwrap();
        assert_eq!(read.products.len(), 1);
        assert_eq!(read.products[0].name, "ls8_test");
        assert_eq!(read.products[0].bands, ["blue", "green", "red", "nir"]);
    }

    #[test]
    fn test_environment_overrides_credentials_file() {
        let settings = Settings {
            credentials_file: Some(PathBuf::from("/from/settings.json")),
            ..Default::default()
        };

        std::env::remove_var(CREDENTIALS_ENV);
        assert_eq!(
            settings.service_account_file().as_deref(),
            Some(Path::new("/from/settings.json"))
        );

        std::env::set_var(CREDENTIALS_ENV, "/from/env.json");
        assert_eq!(
            settings.service_account_file().as_deref(),
            Some(Path::new("/from/env.json"))
        );
        std::env::remove_var(CREDENTIALS_ENV);
    }
}
