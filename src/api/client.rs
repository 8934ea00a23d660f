//! API client for the booking portal REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against the customer list endpoints. It implements
//! `CustomerSource`, the collaborator the cache coordinator fetches
//! through.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::cache::CustomerSource;
use crate::config::Config;
use crate::models::{CustomerFilters, CustomerListResponse, SortDirection, SortField};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the booking portal API
const DEFAULT_BASE_URL: &str = "https://api.bookline.app/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures (429s, 5xx).
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds between retries.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the booking portal.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the default base URL
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Build a client from the saved configuration, honoring the base URL
    /// override when one is set
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.api_base_url.as_deref() {
            Some(base_url) => Self::with_base_url(base_url),
            None => Self::new(),
        }
    }

    /// Create a new API client against a custom base URL (staging, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    /// This is more efficient than creating a new client for each request.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// GET with retries: transient failures (per `ApiError::is_retryable`)
    /// back off exponentially, everything else returns immediately.
    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempts_left = MAX_RETRIES;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            if response.status().is_success() {
                return response
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse JSON response from {}", url));
            }

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            if attempts_left == 0 || !err.is_retryable() {
                return Err(err.into());
            }

            attempts_left -= 1;
            warn!(
                url = url,
                status = status.as_u16(),
                backoff_ms = backoff_ms,
                "Transient API failure, backing off"
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    // ===== Customer List =====

    /// Fetch a page of customers for an operator
    pub async fn fetch_customers(
        &self,
        operator_id: i64,
        filters: &CustomerFilters,
    ) -> Result<CustomerListResponse> {
        let url = format!("{}/operators/{}/customers", self.base_url, operator_id);
        self.get(&url, &Self::list_query(filters)).await
    }

    /// Translate filters into the endpoint's query parameters
    fn list_query(filters: &CustomerFilters) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", filters.page.to_string()),
            ("pageSize", filters.page_size.to_string()),
            ("sortField", sort_field_param(filters.sort_field).to_string()),
            ("sortDirection", direction_param(filters.sort_direction).to_string()),
        ];
        if let Some(status) = filters.status {
            query.push(("status", status.to_string()));
        }
        if let Some(ref search) = filters.search {
            if !search.is_empty() {
                query.push(("search", search.clone()));
            }
        }
        query
    }
}

fn sort_field_param(field: SortField) -> &'static str {
    match field {
        SortField::FirstName => "firstName",
        SortField::LastName => "lastName",
        SortField::Email => "email",
        SortField::CreatedAt => "createdAt",
        SortField::TotalSpent => "totalSpent",
    }
}

fn direction_param(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    }
}

impl CustomerSource for ApiClient {
    fn fetch_list(
        &self,
        operator_id: i64,
        filters: CustomerFilters,
    ) -> BoxFuture<'_, Result<CustomerListResponse>> {
        async move { self.fetch_customers(operator_id, &filters).await }.boxed()
    }
}
