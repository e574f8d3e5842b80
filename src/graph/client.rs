//! HTTP client for the Microsoft Graph workbook endpoints.
//!
//! Every request is attempted with the cached bearer token; a 401 answer
//! forces one token refresh and one retry, nothing more. Non-2xx answers
//! surface as [`GraphError::Upstream`] with Graph's own error text.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;

use crate::graph::auth::TokenProvider;
use crate::graph::error::GraphError;
use crate::graph::types::{
    CellValues, DriveInfo, DriveItemInfo, ListResponse, RangeData, WorksheetInfo,
};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// The Graph operations this service consumes.
///
/// Listings feed the name resolver; range and table calls run only after
/// resolution and policy checks succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn list_drives(&self, site_id: &str) -> Result<Vec<DriveInfo>, GraphError>;

    async fn list_items(&self, drive_id: &str) -> Result<Vec<DriveItemInfo>, GraphError>;

    async fn list_worksheets(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<WorksheetInfo>, GraphError>;

    async fn get_range(
        &self,
        drive_id: &str,
        item_id: &str,
        worksheet_id: &str,
        address: &str,
    ) -> Result<RangeData, GraphError>;

    async fn patch_range(
        &self,
        drive_id: &str,
        item_id: &str,
        worksheet_id: &str,
        address: &str,
        values: CellValues,
    ) -> Result<RangeData, GraphError>;

    async fn get_table_range(
        &self,
        drive_id: &str,
        item_id: &str,
        table: &str,
    ) -> Result<RangeData, GraphError>;

    async fn add_table_rows(
        &self,
        drive_id: &str,
        item_id: &str,
        table: &str,
        rows: CellValues,
    ) -> Result<(), GraphError>;
}

/// reqwest-backed [`GraphApi`] implementation.
pub struct HttpGraphClient {
    http_client: reqwest::Client,
    tokens: Arc<TokenProvider>,
    base_url: String,
}

impl HttpGraphClient {
    pub fn new(tokens: Arc<TokenProvider>) -> Self {
        Self::with_base_url(tokens, GRAPH_BASE_URL)
    }

    /// Point the client at a different base URL (tests, sovereign clouds).
    pub fn with_base_url(tokens: Arc<TokenProvider>, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            tokens,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, GraphError> {
        let token = self.tokens.bearer_token().await?;
        let response = self.request(method.clone(), url, body.as_ref(), &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!("Graph answered 401, forcing token refresh and retrying once");
        let token = self.tokens.force_refresh().await?;
        let response = self.request(method, url, body.as_ref(), &token).await?;
        check_status(response).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<reqwest::Response, GraphError> {
        let mut builder = self.http_client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(GraphError::from)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GraphError> {
        response
            .json::<T>()
            .await
            .map_err(|e| GraphError::Decode(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    error!("Graph API error ({}): {}", status, message);
    Err(GraphError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl GraphApi for HttpGraphClient {
    async fn list_drives(&self, site_id: &str) -> Result<Vec<DriveInfo>, GraphError> {
        let url = self.url(&format!("/sites/{}/drives", site_id));
        let response = self.send(Method::GET, &url, None).await?;
        let listing: ListResponse<DriveInfo> = Self::decode(response).await?;
        Ok(listing.value)
    }

    async fn list_items(&self, drive_id: &str) -> Result<Vec<DriveItemInfo>, GraphError> {
        let url = self.url(&format!("/drives/{}/root/children", drive_id));
        let response = self.send(Method::GET, &url, None).await?;
        let listing: ListResponse<DriveItemInfo> = Self::decode(response).await?;
        Ok(listing.value)
    }

    async fn list_worksheets(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Vec<WorksheetInfo>, GraphError> {
        let url = self.url(&format!(
            "/drives/{}/items/{}/workbook/worksheets",
            drive_id, item_id
        ));
        let response = self.send(Method::GET, &url, None).await?;
        let listing: ListResponse<WorksheetInfo> = Self::decode(response).await?;
        Ok(listing.value)
    }

    async fn get_range(
        &self,
        drive_id: &str,
        item_id: &str,
        worksheet_id: &str,
        address: &str,
    ) -> Result<RangeData, GraphError> {
        let url = self.url(&format!(
            "/drives/{}/items/{}/workbook/worksheets/{}/range(address='{}')",
            drive_id,
            item_id,
            worksheet_id,
            urlencoding::encode(address)
        ));
        let response = self.send(Method::GET, &url, None).await?;
        Self::decode(response).await
    }

    async fn patch_range(
        &self,
        drive_id: &str,
        item_id: &str,
        worksheet_id: &str,
        address: &str,
        values: CellValues,
    ) -> Result<RangeData, GraphError> {
        let url = self.url(&format!(
            "/drives/{}/items/{}/workbook/worksheets/{}/range(address='{}')",
            drive_id,
            item_id,
            worksheet_id,
            urlencoding::encode(address)
        ));
        let response = self
            .send(Method::PATCH, &url, Some(json!({ "values": values })))
            .await?;
        Self::decode(response).await
    }

    async fn get_table_range(
        &self,
        drive_id: &str,
        item_id: &str,
        table: &str,
    ) -> Result<RangeData, GraphError> {
        let url = self.url(&format!(
            "/drives/{}/items/{}/workbook/tables/{}/range",
            drive_id,
            item_id,
            urlencoding::encode(table)
        ));
        let response = self.send(Method::GET, &url, None).await?;
        Self::decode(response).await
    }

    async fn add_table_rows(
        &self,
        drive_id: &str,
        item_id: &str,
        table: &str,
        rows: CellValues,
    ) -> Result<(), GraphError> {
        let url = self.url(&format!(
            "/drives/{}/items/{}/workbook/tables/{}/rows",
            drive_id,
            item_id,
            urlencoding::encode(table)
        ));
        self.send(Method::POST, &url, Some(json!({ "values": rows })))
            .await?;
        Ok(())
    }
}
