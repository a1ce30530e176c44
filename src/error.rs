use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the indexing pipeline.
///
/// Configuration variants (`MissingProduct`, `UnknownPlatform`,
/// `MissingCredentials`) are fatal and raised before any network activity.
/// Transport variants surface verbatim from the catalog or index client.
/// `DuplicateDataset` is benign during an add and absorbed by the indexer.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("product {0:?} is not registered in the dataset index")]
    MissingProduct(String),

    #[error("product {product:?} declares platform {platform:?}, which has no parser")]
    UnknownPlatform { product: String, platform: String },

    #[error("no usable credentials: {0}")]
    MissingCredentials(String),

    #[error("bad catalog endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned {status}: {detail}")]
    CatalogStatus {
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("token endpoint rejected the refresh: {0}")]
    TokenRefresh(String),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("document for {uri} did not resolve: {reason}")]
    Resolve { uri: String, reason: String },

    #[error("dataset {0} is already indexed")]
    DuplicateDataset(Uuid),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    SettingsWrite(#[from] toml::ser::Error),
}

/// Per-scene data defects. Never retried; the indexer logs and skips the
/// scene, the overall run keeps going.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("record declares no bands")]
    NoBands,

    #[error("geometry is missing or malformed: {0}")]
    BadGeometry(String),

    #[error("cannot resolve CRS {0:?}")]
    UnresolvedCrs(String),

    #[error("record carries neither a start nor an end time")]
    MissingTimestamp,
}

pub type Result<T> = std::result::Result<T, IndexError>;
