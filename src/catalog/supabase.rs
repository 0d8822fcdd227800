use crate::catalog::tree::hydrate;
use crate::catalog::{CatalogError, CatalogSnapshot, CategoryRecord, Size};
use crate::config::{HttpConfig, SUPABASE_SERVICE_KEY, SUPABASE_URL};
use crate::http::build_client;
use crate::import::CreateProductData;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// PostgREST access to the storefront tables.
#[derive(Debug, Clone)]
pub struct SupabaseCatalog {
    base_url: String,
    service_key: String,
    http: Client,
}

impl SupabaseCatalog {
    pub fn from_env() -> Option<Self> {
        let base_url = SUPABASE_URL.clone()?;
        let service_key = SUPABASE_SERVICE_KEY.clone()?;
        Some(Self::new(base_url, service_key, build_client(&HttpConfig::from_env())))
    }

    pub fn new(base_url: String, service_key: String, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            http,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
    ) -> Result<T, CatalogError> {
        let url = format!("{}/rest/v1/{table}?select={select}", self.base_url);
        debug!(target = "maison.catalog", table, "supabase_fetch");
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|err| CatalogError::Deserialize(err.to_string()))
    }

    pub async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        let (records, sizes) = tokio::try_join!(
            self.fetch::<Vec<CategoryRecord>>("categories", "id,name,parent_id"),
            self.fetch::<Vec<Size>>("sizes", "id,name"),
        )?;
        let total = records.len();
        let categories = hydrate(records);
        info!(
            target = "maison.catalog",
            categories = categories.len(),
            dropped = total - categories.len(),
            sizes = sizes.len(),
            "catalog_loaded"
        );
        Ok(CatalogSnapshot { categories, sizes })
    }

    pub async fn create_product(
        &self,
        product: &CreateProductData,
    ) -> Result<String, CatalogError> {
        let url = format!("{}/rest/v1/products", self.base_url);
        let response = self
            .authorized(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(product)
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;
        let response = ensure_success(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| CatalogError::Deserialize(err.to_string()))?;
        product_id(&body).ok_or_else(|| {
            CatalogError::Deserialize("created product carried no id".to_string())
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Rejected(format!("HTTP {status}: {body}")))
}

/// PostgREST returns the inserted rows as an array; a single object is also accepted.
fn product_id(body: &Value) -> Option<String> {
    let row = match body {
        Value::Array(rows) => rows.first()?,
        other => other,
    };
    match row.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_id_from_representation() {
        assert_eq!(
            product_id(&json!([{"id": "p-1", "title": "x"}])).as_deref(),
            Some("p-1")
        );
        assert_eq!(product_id(&json!({"id": 42})).as_deref(), Some("42"));
        assert_eq!(product_id(&json!([])), None);
        assert_eq!(product_id(&json!([{"title": "x"}])), None);
    }

    #[test]
    fn base_url_is_normalized() {
        let catalog = SupabaseCatalog::new(
            "https://db.example.co/".to_string(),
            "key".to_string(),
            Client::new(),
        );
        assert_eq!(catalog.base_url, "https://db.example.co");
    }
}
