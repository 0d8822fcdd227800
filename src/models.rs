use crate::import::{CategorySuggestion, EditorAction, EditorState, ParsedProduct};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub text: String,
    /// Runs every stage except commit.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub header_detected: bool,
    pub products: Vec<ParsedProduct>,
    pub valid_count: usize,
    pub error_count: usize,
    pub duplicate_image_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub batch_id: String,
    pub dry_run: bool,
    pub stages: Vec<StageReport>,
    pub report: ImportReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    /// Rows that passed validation and were handed to (or, on a dry run,
    /// would be handed to) the catalog.
    pub accepted: usize,
    pub created: Vec<CreatedRow>,
    pub rejected: Vec<RejectedRow>,
    pub skipped_invalid: usize,
    pub warnings: Vec<String>,
    /// Header line plus every row that was skipped or rejected, ready to be
    /// corrected and pasted again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRow {
    pub row: usize,
    pub title: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row: usize,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub path: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorRequest {
    #[serde(default)]
    pub state: EditorState,
    pub action: EditorAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditorResponse {
    pub state: EditorState,
    pub suggestions: Vec<CategorySuggestion>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
