use crate::import::row::{ParsedProduct, SizeIndex};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashSet;
use thiserror::Error;

/// Payload handed to the persistence layer for one accepted row.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProductData {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub category_id: String,
    pub tags: Vec<String>,
    pub size_ids: Vec<String>,
    pub colors: Vec<ColorVariant>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: String,
    pub hex: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("row {row} has {count} validation error(s)")]
    RowHasErrors { row: usize, count: usize },
}

/// Unknown sizes are skipped; each color's images are de-duplicated in order
/// and blank entries dropped.
pub fn to_create_product(
    product: &ParsedProduct,
    sizes: &SizeIndex,
) -> Result<CreateProductData, ConvertError> {
    if !product.is_valid() {
        return Err(ConvertError::RowHasErrors {
            row: product.row,
            count: product.errors.len(),
        });
    }

    let size_ids = unique(
        product
            .sizes
            .iter()
            .filter_map(|name| sizes.resolve(name))
            .map(str::to_string),
    );

    let colors = product
        .images
        .iter()
        .filter_map(|(name, data)| {
            let images = unique(
                data.images
                    .iter()
                    .map(|url| url.trim())
                    .filter(|url| !url.is_empty())
                    .map(str::to_string),
            );
            (!images.is_empty()).then(|| ColorVariant {
                name: name.clone(),
                hex: data.hex.clone(),
                images,
            })
        })
        .collect();

    Ok(CreateProductData {
        title: product.title.clone(),
        description: product.description.clone(),
        price: product.price,
        original_price: product.original_price,
        category_id: product.category_id.clone(),
        tags: product.tags.clone(),
        size_ids,
        colors,
        active: product.active,
    })
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(value.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Size;
    use crate::import::images::{ColorImageData, ColorImages};

    fn sizes() -> SizeIndex {
        SizeIndex::build(&[
            Size {
                id: "size-s".into(),
                name: "S".into(),
            },
            Size {
                id: "size-m".into(),
                name: "M".into(),
            },
        ])
    }

    fn accepted() -> ParsedProduct {
        let mut images = ColorImages::new();
        images.insert(
            "red".into(),
            ColorImageData {
                hex: "#FF0000".into(),
                images: vec![
                    "http://x/a.jpg".into(),
                    " ".into(),
                    "http://x/b.jpg".into(),
                    "http://x/a.jpg".into(),
                ],
            },
        );
        images.insert(
            "blank".into(),
            ColorImageData {
                hex: "#FFFFFF".into(),
                images: vec!["".into()],
            },
        );
        ParsedProduct {
            row: 4,
            title: "Linen Shirt".into(),
            description: "Breathable".into(),
            price: 89.5,
            original_price: None,
            category_id: "cat-men-shirts".into(),
            tags: vec!["linen".into(), "linen".into()],
            sizes: vec!["s".into(), "XXXL".into(), "S".into(), "m".into()],
            images,
            active: false,
            errors: vec![],
            warnings: vec!["Size \"XXXL\" not found and will be skipped".into()],
        }
    }

    #[test]
    fn normalizes_images_and_resolves_sizes() {
        let data = to_create_product(&accepted(), &sizes()).expect("convert");
        assert_eq!(data.size_ids, vec!["size-s", "size-m"]);
        assert_eq!(data.colors.len(), 1);
        assert_eq!(data.colors[0].images, vec!["http://x/a.jpg", "http://x/b.jpg"]);
        assert_eq!(data.tags, vec!["linen", "linen"]);
        assert!(!data.active);
    }

    #[test]
    fn rows_with_errors_never_convert() {
        let mut product = accepted();
        product.errors.push("Title is required".into());
        let err = to_create_product(&product, &sizes()).expect_err("blocked");
        assert_eq!(err, ConvertError::RowHasErrors { row: 4, count: 1 });
    }

    #[test]
    fn absent_original_price_is_not_serialized() {
        let data = to_create_product(&accepted(), &sizes()).expect("convert");
        let json = serde_json::to_value(&data).expect("json");
        assert!(json.get("original_price").is_none());
        assert_eq!(json["category_id"], "cat-men-shirts");
    }
}
