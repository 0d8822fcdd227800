use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::config::ImportConfig;
use crate::import::{ParsedProduct, TokenizedTable};
use crate::models::{ImportPreview, ImportReport, ImportRequest, ImportResponse, StageReport};
use serde_json::Value;
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ImportPipeline {
    pub config: Arc<ImportConfig>,
    store: CatalogStore,
}

impl ImportPipeline {
    pub fn new(config: ImportConfig, store: CatalogStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ImportConfig::from_env(), CatalogStore::from_env())
    }

    #[cfg(test)]
    pub fn demo() -> Self {
        Self::new(
            ImportConfig::default(),
            CatalogStore::Memory(crate::catalog::MemoryCatalog::demo()),
        )
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Fresh collaborator snapshot for the category and editor endpoints.
    pub async fn catalog(&self) -> Result<CatalogSnapshot, PipelineError> {
        self.store
            .snapshot()
            .await
            .map_err(|err| PipelineError::internal("load_catalog", err.to_string()))
    }

    /// Parses the pasted text without touching the catalog. Rows with errors
    /// are returned alongside the valid ones.
    pub async fn preview(&self, text: &str) -> Result<ImportPreview, PipelineError> {
        let snapshot = self.catalog().await?;
        let table = stages::tokenize(text, self.config.max_rows)?.value;
        let products = stages::parse_rows(&table, &snapshot).value;
        let valid: Vec<ParsedProduct> = products
            .iter()
            .filter(|p| p.is_valid())
            .cloned()
            .collect();
        let duplicate_image_warnings = stages::audit_images(&valid).value;
        Ok(ImportPreview {
            headers: table.headers,
            header_detected: table.header_detected,
            valid_count: valid.len(),
            error_count: products.len() - valid.len(),
            products,
            duplicate_image_warnings,
        })
    }

    pub async fn run(&self, request: ImportRequest) -> Result<ImportResponse, PipelineError> {
        let mut stages = Vec::new();
        let batch_id = if request.dry_run {
            format!("PREVIEW-{}", Uuid::new_v4().simple())
        } else {
            format!("IMP-{}", Uuid::new_v4().simple())
        };

        let snapshot = self
            .capture_stage("load_catalog", &mut stages, stages::load_catalog(&self.store))
            .await?;

        let max_rows = self.config.max_rows;
        let table = self
            .capture_stage(
                "tokenize",
                &mut stages,
                std::future::ready(stages::tokenize(&request.text, max_rows)),
            )
            .await?;

        let products = self
            .capture_stage(
                "parse_rows",
                &mut stages,
                std::future::ready(Ok(stages::parse_rows(&table, &snapshot))),
            )
            .await?;
        let total = products.len();
        let mut failed_rows: Vec<usize> = products
            .iter()
            .filter(|p| !p.is_valid())
            .map(|p| p.row)
            .collect();

        let valid = self
            .capture_stage(
                "validate_rows",
                &mut stages,
                std::future::ready(stages::validate_rows(products)),
            )
            .await?;

        let warnings = self
            .capture_stage(
                "audit_images",
                &mut stages,
                std::future::ready(Ok(stages::audit_images(&valid))),
            )
            .await?;

        let drafts = self
            .capture_stage(
                "convert",
                &mut stages,
                std::future::ready(stages::convert(&valid, &snapshot)),
            )
            .await?;

        let mut report = ImportReport {
            accepted: drafts.len(),
            skipped_invalid: total - valid.len(),
            warnings,
            ..ImportReport::default()
        };

        if !request.dry_run {
            let (created, rejected) = self
                .capture_stage("commit", &mut stages, stages::commit(&self.store, drafts))
                .await?;
            failed_rows.extend(rejected.iter().map(|r| r.row));
            report.created = created;
            report.rejected = rejected;
        }
        failed_rows.sort_unstable();
        report.retry_text = retry_text(&table, &failed_rows);

        info!(
            target = "maison.import",
            batch_id = %batch_id,
            dry_run = request.dry_run,
            rows = total,
            accepted = report.accepted,
            created = report.created.len(),
            rejected = report.rejected.len(),
            skipped_invalid = report.skipped_invalid,
            "import_finished"
        );

        Ok(ImportResponse {
            batch_id,
            dry_run: request.dry_run,
            stages,
            report,
        })
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

/// Rows are 1-based positions in `table.rows`.
fn retry_text(table: &TokenizedTable, rows: &[usize]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let subset = TokenizedTable {
        headers: table.headers.clone(),
        rows: rows
            .iter()
            .filter_map(|row| table.rows.get(row.checked_sub(1)?).cloned())
            .collect(),
        header_detected: true,
    };
    Some(subset.to_text())
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

pub mod stages {
    use super::{PipelineError, StageOutcome};
    use crate::catalog::{CatalogSnapshot, CatalogStore};
    use crate::import::{
        self, CANONICAL_HEADERS, CreateProductData, ParsedProduct, RowContext, SizeIndex,
        TokenizedTable,
    };
    use crate::models::{CreatedRow, RejectedRow};
    use serde_json::json;
    use tracing::warn;

    const SAMPLE_ERRORS: usize = 5;

    pub async fn load_catalog(
        store: &CatalogStore,
    ) -> Result<StageOutcome<CatalogSnapshot>, PipelineError> {
        let snapshot = store
            .snapshot()
            .await
            .map_err(|err| PipelineError::internal("load_catalog", err.to_string()))?;
        let output = json!({
            "backend": store.backend(),
            "categories": snapshot.categories.len(),
            "sizes": snapshot.sizes.len(),
        });
        Ok(StageOutcome::new(snapshot, output))
    }

    pub fn tokenize(
        text: &str,
        max_rows: usize,
    ) -> Result<StageOutcome<TokenizedTable>, PipelineError> {
        let table = import::tokenize(text, &CANONICAL_HEADERS);
        if table.rows.len() > max_rows {
            return Err(PipelineError::invalid_input(
                "tokenize",
                format!("{} rows pasted; at most {max_rows} per import", table.rows.len()),
            ));
        }
        let output = json!({
            "headers": table.headers,
            "header_detected": table.header_detected,
            "rows": table.rows.len(),
        });
        Ok(StageOutcome::new(table, output))
    }

    pub fn parse_rows(
        table: &TokenizedTable,
        snapshot: &CatalogSnapshot,
    ) -> StageOutcome<Vec<ParsedProduct>> {
        let ctx = RowContext::build(&snapshot.categories, &snapshot.sizes);
        let products = import::parse_rows(table, &ctx);
        let valid = products.iter().filter(|p| p.is_valid()).count();
        let warnings: usize = products.iter().map(|p| p.warnings.len()).sum();
        crate::metrics::rows_parsed(valid, products.len() - valid);
        let output = json!({
            "rows": products.len(),
            "valid": valid,
            "invalid": products.len() - valid,
            "warnings": warnings,
        });
        StageOutcome::new(products, output)
    }

    /// Keeps the error-free rows. A batch with none is refused outright.
    pub fn validate_rows(
        products: Vec<ParsedProduct>,
    ) -> Result<StageOutcome<Vec<ParsedProduct>>, PipelineError> {
        let total = products.len();
        let sample: Vec<_> = products
            .iter()
            .filter(|p| !p.is_valid())
            .take(SAMPLE_ERRORS)
            .map(|p| json!({ "row": p.row, "errors": p.errors }))
            .collect();
        let valid: Vec<ParsedProduct> = products.into_iter().filter(|p| p.is_valid()).collect();
        if valid.is_empty() {
            let message = if total == 0 {
                "no product rows found".to_string()
            } else {
                format!("none of the {total} rows passed validation")
            };
            return Err(PipelineError::invalid_input("validate_rows", message));
        }
        let output = json!({
            "valid": valid.len(),
            "skipped": total - valid.len(),
            "sample_errors": sample,
        });
        Ok(StageOutcome::new(valid, output))
    }

    pub fn audit_images(valid: &[ParsedProduct]) -> StageOutcome<Vec<String>> {
        let warnings = import::find_duplicate_image_usage(valid);
        let output = json!({
            "duplicates": warnings.len(),
            "warnings": warnings,
        });
        StageOutcome::new(warnings, output)
    }

    pub fn convert(
        valid: &[ParsedProduct],
        snapshot: &CatalogSnapshot,
    ) -> Result<StageOutcome<Vec<(usize, CreateProductData)>>, PipelineError> {
        let sizes = SizeIndex::build(&snapshot.sizes);
        let drafts = valid
            .iter()
            .map(|product| {
                import::to_create_product(product, &sizes)
                    .map(|data| (product.row, data))
                    .map_err(|err| PipelineError::internal("convert", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let colors: usize = drafts.iter().map(|(_, d)| d.colors.len()).sum();
        let images: usize = drafts
            .iter()
            .flat_map(|(_, d)| d.colors.iter())
            .map(|c| c.images.len())
            .sum();
        let output = json!({
            "products": drafts.len(),
            "colors": colors,
            "images": images,
        });
        Ok(StageOutcome::new(drafts, output))
    }

    /// Rows are created one at a time; a rejection is recorded and the rest
    /// of the batch continues.
    pub async fn commit(
        store: &CatalogStore,
        drafts: Vec<(usize, CreateProductData)>,
    ) -> Result<StageOutcome<(Vec<CreatedRow>, Vec<RejectedRow>)>, PipelineError> {
        let mut created = Vec::with_capacity(drafts.len());
        let mut rejected = Vec::new();
        for (row, data) in drafts {
            match store.create_product(&data).await {
                Ok(product_id) => created.push(CreatedRow {
                    row,
                    title: data.title,
                    product_id,
                }),
                Err(err) => {
                    warn!(
                        target = "maison.import",
                        row,
                        title = %data.title,
                        error = %err,
                        "product_create_failed"
                    );
                    rejected.push(RejectedRow {
                        row,
                        title: data.title,
                        reason: err.to_string(),
                    });
                }
            }
        }
        let output = json!({
            "created": created.len(),
            "rejected": rejected.len(),
            "product_ids": created.iter().map(|c| c.product_id.as_str()).collect::<Vec<_>>(),
        });
        Ok(StageOutcome::new((created, rejected), output))
    }
}
