//! Dataset-index seam.
//!
//! The real index is an external system; the indexer only needs the handful
//! of operations in [`DatasetIndex`]. [`InMemoryIndex`] is the reference
//! implementation, used by tests and dry runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::IngestDocument;
use crate::error::{IndexError, Result};

/// A product registered in the dataset index: its name, the platform code
/// that selects the parser, and the ordered semantic bands it declares.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ProductDescriptor {
    pub name: String,
    pub platform: String,
    pub bands: Vec<String>,
}

/// A resolved dataset as the index stores it.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub id: Uuid,
    pub product: String,
    pub uri: String,
    pub document: IngestDocument,
}

pub trait DatasetIndex {
    async fn list_products(&self) -> Result<Vec<ProductDescriptor>>;
    async fn find_product(&self, name: &str) -> Result<Option<ProductDescriptor>>;
    /// Matches the document against the registered products and binds it to
    /// the single product it fits. Zero or several matches is an error.
    async fn resolve(&self, document: &IngestDocument, uri: &str) -> Result<Dataset>;
    async fn get(&self, id: Uuid) -> Result<Option<Dataset>>;
    /// Adds a new dataset. An already indexed id is a distinct error.
    async fn add(&self, dataset: Dataset) -> Result<()>;
    /// Replaces whatever the dataset's id currently holds.
    async fn update(&self, dataset: Dataset) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryIndex {
    products: Vec<ProductDescriptor>,
    datasets: RwLock<HashMap<Uuid, Dataset>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_product(&mut self, descriptor: ProductDescriptor) {
        self.products.push(descriptor);
    }

    pub async fn dataset_count(&self) -> usize {
        self.datasets.read().await.len()
    }
}

impl DatasetIndex for InMemoryIndex {
    async fn list_products(self: &Self) -> Result<Vec<ProductDescriptor>> {
        Ok(self.products.clone())
    }

    async fn find_product(self: &Self, name: &str) -> Result<Option<ProductDescriptor>> {
        Ok(self
            .products
            .iter()
            .find(|product| product.name == name)
            .cloned())
    }

    async fn resolve(self: &Self, document: &IngestDocument, uri: &str) -> Result<Dataset> {
        let matches: Vec<&ProductDescriptor> = self
            .products
            .iter()
            .filter(|product| {
                product
                    .platform
                    .eq_ignore_ascii_case(&document.platform.code)
                    && product
                        .bands
                        .iter()
                        .all(|band| document.image.bands.contains_key(band))
            })
            .collect();
        let product = match matches.as_slice() {
            [product] => *product,
            [] => {
                return Err(IndexError::Resolve {
                    uri: uri.to_owned(),
                    reason: "no registered product matches the document".to_owned(),
                })
            }
            _ => {
                return Err(IndexError::Resolve {
                    uri: uri.to_owned(),
                    reason: format!("{} registered products match the document", matches.len()),
                })
            }
        };
        Ok(Dataset {
            id: document.id,
            product: product.name.clone(),
            uri: uri.to_owned(),
            document: document.clone(),
        })
    }

    async fn get(self: &Self, id: Uuid) -> Result<Option<Dataset>> {
        Ok(self.datasets.read().await.get(&id).cloned())
    }

    async fn add(self: &Self, dataset: Dataset) -> Result<()> {
        let mut datasets = self.datasets.write().await;
        if datasets.contains_key(&dataset.id) {
            return Err(IndexError::DuplicateDataset(dataset.id));
        }
        datasets.insert(dataset.id, dataset);
        Ok(())
    }

    async fn update(self: &Self, dataset: Dataset) -> Result<()> {
        self.datasets.write().await.insert(dataset.id, dataset);
        Ok(())
    }
}
