pub mod audit;
pub mod category;
pub mod convert;
pub mod editor;
pub mod images;
pub mod row;
pub mod tokenizer;

pub use audit::find_duplicate_image_usage;
pub use category::{CategorySuggestion, resolve, suggest};
pub use convert::{CreateProductData, to_create_product};
pub use editor::{EditorAction, EditorState};
pub use row::{ParsedProduct, RowContext, SizeIndex, parse_rows};
pub use tokenizer::{CANONICAL_HEADERS, TokenizedTable, tokenize};
