pub mod memory;
pub mod supabase;
pub mod tree;

pub use memory::MemoryCatalog;
pub use supabase::SupabaseCatalog;

use crate::import::CreateProductData;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Node of the category tree. `path` runs from the root to this node, so
/// `path.len() == level + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub level: u32,
    pub path: Vec<String>,
}

impl Category {
    pub fn path_text(&self) -> String {
        self.path.join(crate::import::category::PATH_SEPARATOR)
    }
}

/// Flat row as stored by the persistence layer; `level` and `path` are derived.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogSnapshot {
    pub categories: Vec<Category>,
    pub sizes: Vec<Size>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Clone)]
pub enum CatalogStore {
    Memory(MemoryCatalog),
    Supabase(SupabaseCatalog),
}

impl CatalogStore {
    pub fn from_env() -> Self {
        match SupabaseCatalog::from_env() {
            Some(client) => {
                info!(target = "maison.catalog", backend = "supabase", "catalog store configured");
                Self::Supabase(client)
            }
            None => {
                warn!(
                    target = "maison.catalog",
                    "SUPABASE_URL not set; serving the in-memory demo catalog"
                );
                Self::Memory(MemoryCatalog::demo())
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Supabase(_) => "supabase",
        }
    }

    pub async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        match self {
            Self::Memory(store) => Ok(store.snapshot()),
            Self::Supabase(client) => client.snapshot().await,
        }
    }

    /// Creates one product; the returned id is the persisted product id.
    pub async fn create_product(
        &self,
        product: &CreateProductData,
    ) -> Result<String, CatalogError> {
        match self {
            Self::Memory(store) => store.create_product(product).await,
            Self::Supabase(client) => client.create_product(product).await,
        }
    }
}
