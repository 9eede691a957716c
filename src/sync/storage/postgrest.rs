//! PostgREST-backed catalog store.
//!
//! Plain HTTP against `{base_url}/rest/v1/{table}`:
//! - inserts use `resolution=ignore-duplicates` so existing rows are never
//!   touched, and `return=representation` with `select=id` so the response
//!   lists only the rows that were actually created;
//! - listings page with `limit`/`offset` ordered by `id`;
//! - deletes are scoped with `source=eq.X` and `id=in.(...)`.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use url::Url;

use crate::sync::core::config::StoreConfig;
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::record::Row;
use crate::sync::storage::store::{CatalogStore, InsertAck, RequestTier};

const PREFER_INSERT: &str = "resolution=ignore-duplicates,return=representation";
const PREFER_MINIMAL: &str = "return=minimal";

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// Store client speaking the PostgREST dialect.
pub struct PostgrestStore {
    client: Client,
    table_url: Url,
    config: StoreConfig,
}

impl PostgrestStore {
    /// Create a client for the configured table.
    ///
    /// # Errors
    /// Returns an error if the key is missing, the URL is invalid, or the HTTP
    /// client cannot be built.
    pub fn new(config: StoreConfig) -> SyncResult<Self> {
        let key = config.require_api_key()?;
        let headers = Self::default_headers(key)?;
        let table_url = Self::build_table_url(&config)?;

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            table_url,
            config,
        })
    }

    fn default_headers(key: &str) -> SyncResult<HeaderMap> {
        let invalid = |_| SyncError::InvalidConfig("store key is not a valid header".to_string());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).map_err(invalid)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static(PREFER_MINIMAL));
        Ok(headers)
    }

    fn build_table_url(config: &StoreConfig) -> SyncResult<Url> {
        let base = config.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/rest/v1/{}", config.table))?)
    }

    /// Endpoint for inserts.
    #[must_use]
    pub fn insert_url(&self) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut().append_pair("select", "id");
        url
    }

    /// Endpoint for one page of ids belonging to `source`.
    #[must_use]
    pub fn list_url(&self, source: &str, offset: usize, limit: usize) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("source", &format!("eq.{source}"))
            .append_pair("order", "id.asc")
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        url
    }

    /// Endpoint deleting `ids` within `source`.
    #[must_use]
    pub fn delete_url(&self, source: &str, ids: &[String]) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("source", &format!("eq.{source}"))
            .append_pair("id", &in_filter(ids));
        url
    }

    /// Turn a non-success answer into `SyncError::Rejected`.
    fn check(&self, response: Response, accepted: &[StatusCode]) -> SyncResult<Response> {
        let status = response.status();
        if accepted.contains(&status) {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(SyncError::rejected(
            status.as_u16(),
            &body,
            self.config.error_body_chars,
        ))
    }
}

impl CatalogStore for PostgrestStore {
    fn insert_rows(&self, rows: &[Row], tier: RequestTier) -> SyncResult<InsertAck> {
        if rows.is_empty() {
            return Ok(InsertAck::default());
        }

        let timeout = match tier {
            RequestTier::Batch => self.config.batch_timeout(),
            RequestTier::Single => self.config.single_timeout(),
        };

        let response = self
            .client
            .post(self.insert_url())
            .header("Prefer", PREFER_INSERT)
            .timeout(timeout)
            .body(serde_json::to_vec(rows)?)
            .send()
            .map_err(transport)?;
        let response = self.check(
            response,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )?;

        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(InsertAck::default());
        }
        let created: Vec<IdRow> = serde_json::from_str(&body)?;
        Ok(InsertAck {
            created: created.len(),
        })
    }

    fn fetch_ids_page(
        &self,
        source: &str,
        offset: usize,
        limit: usize,
    ) -> SyncResult<Vec<String>> {
        let response = self
            .client
            .get(self.list_url(source, offset, limit))
            .timeout(self.config.fetch_timeout())
            .send()
            .map_err(transport)?;
        let response = self.check(response, &[StatusCode::OK, StatusCode::PARTIAL_CONTENT])?;

        let page: Vec<IdRow> = response.json()?;
        Ok(page.into_iter().map(|row| row.id).collect())
    }

    fn delete_ids(&self, source: &str, ids: &[String]) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .delete(self.delete_url(source, ids))
            .timeout(self.config.batch_timeout())
            .send()
            .map_err(transport)?;
        self.check(response, &[StatusCode::OK, StatusCode::NO_CONTENT])?;
        Ok(())
    }
}

/// Connect failures and timeouts mean the store never answered.
fn transport(err: reqwest::Error) -> SyncError {
    if err.is_connect() || err.is_timeout() {
        SyncError::Unavailable(err.to_string())
    } else {
        SyncError::Http(err)
    }
}

/// `in.(...)` filter with every value double-quoted so commas and
/// parentheses inside ids stay literal.
#[must_use]
pub fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PostgrestStore {
        let config = StoreConfig::default()
            .with_base_url("https://db.example/")
            .with_api_key("service-key");
        PostgrestStore::new(config).unwrap()
    }

    fn query_pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn test_requires_api_key() {
        let result = PostgrestStore::new(StoreConfig::default());
        assert!(matches!(result, Err(SyncError::MissingCredentials(_))));
    }

    #[test]
    fn test_insert_url() {
        let url = store().insert_url();
        assert_eq!(url.path(), "/rest/v1/products");
        assert_eq!(query_pairs(&url), vec![pair("select", "id")]);
    }

    #[test]
    fn test_list_url_is_ordered_and_paged() {
        let url = store().list_url("drmersclub", 1000, 1000);
        let pairs = query_pairs(&url);
        assert!(pairs.contains(&pair("source", "eq.drmersclub")));
        assert!(pairs.contains(&pair("order", "id.asc")));
        assert!(pairs.contains(&pair("limit", "1000")));
        assert!(pairs.contains(&pair("offset", "1000")));
    }

    #[test]
    fn test_delete_url_scopes_by_source_and_ids() {
        let ids = vec!["s_1".to_string(), "s_2".to_string()];
        let url = store().delete_url("s", &ids);
        let pairs = query_pairs(&url);
        assert_eq!(
            pairs,
            vec![pair("source", "eq.s"), pair("id", r#"in.("s_1","s_2")"#)]
        );
    }

    #[test]
    fn test_in_filter_escapes_quotes_and_commas() {
        let ids = vec!["a,b".to_string(), "c\"d".to_string(), "e\\f".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a,b","c\"d","e\\f")"#);
    }

    #[test]
    fn test_refused_connection_is_unavailable() {
        let mut config = StoreConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_api_key("service-key");
        config.connect_timeout_secs = 1;
        let store = PostgrestStore::new(config).unwrap();

        let err = store.fetch_ids_page("s", 0, 10).unwrap_err();
        assert!(matches!(err, SyncError::Unavailable(_)));
        assert!(err.is_transport());
    }

    #[test]
    fn test_empty_writes_skip_network() {
        let store = store();
        assert_eq!(
            store.insert_rows(&[], RequestTier::Batch).unwrap(),
            InsertAck::default()
        );
        assert!(store.delete_ids("s", &[]).is_ok());
    }
}
