use crate::catalog::tree::hydrate;
use crate::catalog::{CatalogError, CatalogSnapshot, Category, CategoryRecord, Size};
use crate::import::CreateProductData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

const DEMO_CATEGORIES: &[(&str, &str, Option<&str>)] = &[
    ("cat-men", "Men", None),
    ("cat-women", "Women", None),
    ("cat-accessories", "Accessories", None),
    ("cat-men-shirts", "Shirts", Some("cat-men")),
    ("cat-men-shirts-formal", "Formal", Some("cat-men-shirts")),
    ("cat-men-shirts-casual", "Casual", Some("cat-men-shirts")),
    ("cat-men-trousers", "Trousers", Some("cat-men")),
    ("cat-women-saree", "Saree", Some("cat-women")),
    ("cat-women-dresses", "Dresses", Some("cat-women")),
    ("cat-women-dresses-evening", "Evening", Some("cat-women-dresses")),
    ("cat-women-shirts", "Shirts", Some("cat-women")),
    ("cat-women-shirts-silk", "Silk", Some("cat-women-shirts")),
    ("cat-accessories-bags", "Bags", Some("cat-accessories")),
    ("cat-accessories-scarves", "Scarves", Some("cat-accessories")),
];

const DEMO_SIZES: &[(&str, &str)] = &[
    ("size-xs", "XS"),
    ("size-s", "S"),
    ("size-m", "M"),
    ("size-l", "L"),
    ("size-xl", "XL"),
    ("size-xxl", "XXL"),
    ("size-free", "Free Size"),
];

/// Process-local catalog. Used when no database is configured and in tests.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    categories: Arc<Vec<Category>>,
    sizes: Arc<Vec<Size>>,
    products: Arc<Mutex<Vec<(String, CreateProductData)>>>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<CategoryRecord>, sizes: Vec<Size>) -> Self {
        Self {
            categories: Arc::new(hydrate(records)),
            sizes: Arc::new(sizes),
            products: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn demo() -> Self {
        let records = DEMO_CATEGORIES
            .iter()
            .map(|(id, name, parent)| CategoryRecord {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent.map(str::to_string),
            })
            .collect();
        let sizes = DEMO_SIZES
            .iter()
            .map(|(id, name)| Size {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        Self::new(records, sizes)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            categories: self.categories.as_ref().clone(),
            sizes: self.sizes.as_ref().clone(),
        }
    }

    /// Enforces what the products table would: the category must exist and
    /// titles are unique ignoring case.
    pub async fn create_product(
        &self,
        product: &CreateProductData,
    ) -> Result<String, CatalogError> {
        if !self.categories.iter().any(|c| c.id == product.category_id) {
            return Err(CatalogError::Rejected(format!(
                "category {} does not exist",
                product.category_id
            )));
        }
        let mut products = self.products.lock().await;
        if products
            .iter()
            .any(|(_, existing)| existing.title.eq_ignore_ascii_case(&product.title))
        {
            return Err(CatalogError::Rejected(format!(
                "a product titled \"{}\" already exists",
                product.title
            )));
        }
        let id = Uuid::new_v4().to_string();
        products.push((id.clone(), product.clone()));
        info!(
            target = "maison.catalog",
            product_id = %id,
            category_id = %product.category_id,
            "product_created"
        );
        Ok(id)
    }

    #[cfg(test)]
    pub async fn product_count(&self) -> usize {
        self.products.lock().await.len()
    }
}
