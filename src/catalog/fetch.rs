//! Paginated catalog fetch.

use std::thread;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::catalog::config::CatalogConfig;
use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::types::{ProductsPage, RawProduct};

/// Produces the complete, finite list of raw entries of one catalog.
pub trait CatalogSource: Send + Sync {
    /// Source tag the entries belong to.
    fn source(&self) -> &str;

    /// Fetch every entry.
    ///
    /// # Errors
    /// Returns an error if any page fails; a truncated catalog is never returned.
    fn fetch_all(&self) -> CatalogResult<Vec<RawProduct>>;
}

/// Storefront exposing a Shopify-style `products.json` collection feed.
pub struct ShopifyCatalog {
    config: CatalogConfig,
    client: Client,
}

impl ShopifyCatalog {
    /// Create a catalog client.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be created.
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;
        let client = Self::build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_client(config: &CatalogConfig) -> CatalogResult<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(agent) =
            HeaderValue::from_str(&format!("catalog-sync/{}", env!("CARGO_PKG_VERSION")))
        {
            headers.insert(USER_AGENT, agent);
        }

        Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .gzip(true)
            .build()
            .map_err(|e| CatalogError::HttpClient(e.to_string()))
    }

    /// URL of one feed page (1-based).
    ///
    /// # Errors
    /// Returns an error if the configured base URL is invalid.
    pub fn page_url(&self, page: u32) -> CatalogResult<Url> {
        let mut url = Url::parse(&self.config.products_url())?;
        url.query_pairs_mut()
            .append_pair("limit", &self.config.per_page.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn fetch_page(&self, page: u32) -> CatalogResult<Vec<RawProduct>> {
        let response = self.client.get(self.page_url(page)?).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::BadStatus {
                page,
                status: status.as_u16(),
            });
        }
        let body: ProductsPage = response.json()?;
        Ok(body.products)
    }
}

impl CatalogSource for ShopifyCatalog {
    fn source(&self) -> &str {
        &self.config.source
    }

    fn fetch_all(&self) -> CatalogResult<Vec<RawProduct>> {
        collect_pages(self.config.per_page as usize, |page| {
            if page > 1 && !self.config.page_delay.is_zero() {
                thread::sleep(self.config.page_delay);
            }
            self.fetch_page(page)
        })
    }
}

/// Drive a page fetcher from page 1 until an empty or short page.
///
/// # Errors
/// Returns the first page error; nothing fetched so far is returned with it.
pub fn collect_pages<F>(per_page: usize, mut fetch: F) -> CatalogResult<Vec<RawProduct>>
where
    F: FnMut(u32) -> CatalogResult<Vec<RawProduct>>,
{
    let mut all = Vec::new();
    let mut page = 1;

    loop {
        let products = fetch(page).map_err(|err| {
            tracing::error!("failed to fetch catalog page {page}: {err}");
            err
        })?;
        if products.is_empty() {
            break;
        }

        let count = products.len();
        all.extend(products);
        tracing::info!("fetched page {page}: {count} products (total: {})", all.len());

        if count < per_page {
            break;
        }
        page += 1;
    }

    Ok(all)
}
