use crate::catalog::{Category, Size};
use crate::import::category::CategoryIndex;
use crate::import::images::{ColorImages, parse_images};
use crate::import::tokenizer::{Column, TokenizedTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

const CATEGORY_EXAMPLES: usize = 3;

/// One pasted row mapped onto a product. Any entry in `errors` keeps the row
/// out of the import; `warnings` never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedProduct {
    /// 1-based position among the data rows.
    pub row: usize,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub original_price: Option<f64>,
    /// Resolved id, or the raw cell text when resolution failed.
    pub category_id: String,
    pub tags: Vec<String>,
    /// Size names as typed; ids are resolved at conversion.
    pub sizes: Vec<String>,
    pub images: ColorImages,
    pub active: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsedProduct {
    fn empty(row: usize) -> Self {
        Self {
            row,
            title: String::new(),
            description: String::new(),
            price: 0.0,
            original_price: None,
            category_id: String::new(),
            tags: Vec::new(),
            sizes: Vec::new(),
            images: ColorImages::new(),
            active: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowIssue {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0} must be a valid positive number")]
    InvalidNumber(&'static str),
    #[error("Category \"{text}\" not found. Valid examples: {examples}")]
    UnknownCategory { text: String, examples: String },
    #[error("Size \"{0}\" not found and will be skipped")]
    UnknownSize(String),
}

/// Case-insensitive size name to id.
#[derive(Debug, Clone, Default)]
pub struct SizeIndex {
    by_name: HashMap<String, String>,
}

impl SizeIndex {
    pub fn build(sizes: &[Size]) -> Self {
        let mut by_name = HashMap::with_capacity(sizes.len());
        for size in sizes {
            by_name
                .entry(size.name.trim().to_lowercase())
                .or_insert_with(|| size.id.clone());
        }
        Self { by_name }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }
}

/// Lookups shared by every row of one parse.
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    pub categories: CategoryIndex,
    pub sizes: SizeIndex,
}

impl RowContext {
    pub fn build(categories: &[Category], sizes: &[Size]) -> Self {
        Self {
            categories: CategoryIndex::build(categories),
            sizes: SizeIndex::build(sizes),
        }
    }

    fn category_examples(&self) -> String {
        let examples = self.categories.examples(CATEGORY_EXAMPLES);
        if examples.is_empty() {
            "none loaded".to_string()
        } else {
            examples
                .iter()
                .map(|path| format!("\"{path}\""))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

pub fn parse_rows(table: &TokenizedTable, ctx: &RowContext) -> Vec<ParsedProduct> {
    let columns = table.columns();
    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, cells)| parse_row(idx + 1, cells, &columns, ctx))
        .collect()
}

/// Columns present in the header are applied in header order; canonical
/// columns the header lacks are applied afterwards as empty cells.
pub fn parse_row(
    row: usize,
    cells: &[String],
    columns: &[Option<Column>],
    ctx: &RowContext,
) -> ParsedProduct {
    let mut present: Vec<(Column, &str)> = Vec::with_capacity(Column::ALL.len());
    for (idx, column) in columns.iter().enumerate() {
        if let Some(column) = column
            && !present.iter().any(|(seen, _)| seen == column)
        {
            let value = cells.get(idx).map(|cell| cell.trim()).unwrap_or("");
            present.push((*column, value));
        }
    }
    for column in Column::ALL {
        if !present.iter().any(|(seen, _)| *seen == column) {
            present.push((column, ""));
        }
    }

    let mut product = ParsedProduct::empty(row);
    for (column, value) in present {
        apply_column(&mut product, column, value, ctx);
    }
    product
}

fn apply_column(product: &mut ParsedProduct, column: Column, value: &str, ctx: &RowContext) {
    match column {
        Column::Title => {
            if value.is_empty() {
                product.errors.push(RowIssue::Required("Title").to_string());
            }
            product.title = value.to_string();
        }
        Column::Description => {
            if value.is_empty() {
                product.errors.push(RowIssue::Required("Description").to_string());
            }
            product.description = value.to_string();
        }
        Column::Price => match parse_amount(value) {
            Some(price) => product.price = price,
            None => product.errors.push(RowIssue::InvalidNumber("Price").to_string()),
        },
        Column::OriginalPrice => {
            if !value.is_empty() {
                match parse_amount(value) {
                    Some(price) => product.original_price = Some(price),
                    None => product
                        .errors
                        .push(RowIssue::InvalidNumber("Original Price").to_string()),
                }
            }
        }
        Column::Category => {
            if value.is_empty() {
                product.errors.push(RowIssue::Required("Category").to_string());
                return;
            }
            match ctx.categories.resolve(value) {
                Some(id) => product.category_id = id.to_string(),
                None => {
                    product.category_id = value.to_string();
                    product.errors.push(
                        RowIssue::UnknownCategory {
                            text: value.to_string(),
                            examples: ctx.category_examples(),
                        }
                        .to_string(),
                    );
                }
            }
        }
        Column::Tags => product.tags = split_list(value),
        Column::Sizes => {
            product.sizes = split_list(value);
            for size in &product.sizes {
                if ctx.sizes.resolve(size).is_none() {
                    product
                        .warnings
                        .push(RowIssue::UnknownSize(size.clone()).to_string());
                }
            }
        }
        Column::Images => {
            let parsed = parse_images(value);
            product.images = parsed.data;
            product.errors.extend(parsed.errors);
        }
        Column::Active => product.active = parse_active(value),
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_active(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "" | "true" | "1")
}
