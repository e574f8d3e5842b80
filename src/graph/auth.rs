// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! OAuth2 client-credentials token provider for Microsoft Graph.
//!
//! Application-permission flow against
//! `https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token` with the
//! `.default` Graph scope. The acquired token is cached until five minutes
//! before its reported expiry.
//!
//! The cache slot is a `tokio::sync::Mutex` held ACROSS the refresh
//! request, so concurrent callers that all find the token expired share a
//! single token-endpoint round-trip. The name resolver deliberately does
//! not get the same treatment (see `resolver.rs`).

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::graph::error::GraphError;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Azure AD application credentials.
#[derive(Debug, Clone)]
pub struct GraphAuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Overridable for tests; defaults to the public AAD authority.
    pub authority: String,
}

impl GraphAuthConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Token with expiry tracking
#[derive(Debug, Clone)]
struct StoredToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Check if the token is expired or about to expire (within 5 minutes)
    fn is_expired(&self) -> bool {
        Utc::now() + Duration::minutes(5) >= self.expires_at
    }

    fn from_response(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        }
    }
}

/// Azure AD error response
#[derive(Debug, Deserialize)]
struct AadErrorResponse {
    error: String,
    error_description: String,
}

/// Caching token provider, safe for concurrent callers.
pub struct TokenProvider {
    config: GraphAuthConfig,
    http_client: reqwest::Client,
    token: Mutex<Option<StoredToken>>,
}

impl TokenProvider {
    pub fn new(config: GraphAuthConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Get a valid bearer token, refreshing if the cached one is stale.
    pub async fn bearer_token(&self) -> Result<String, GraphError> {
        let mut slot = self.token.lock().await;
        if let Some(stored) = slot.as_ref() {
            if !stored.is_expired() {
                return Ok(stored.access_token.clone());
            }
            debug!("Cached Graph token expired, refreshing");
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(access_token)
    }

    /// Drop any cached token and fetch a new one.
    ///
    /// Used by the client's retry path when Graph answers 401 despite a
    /// token the cache considered fresh.
    pub async fn force_refresh(&self) -> Result<String, GraphError> {
        let mut slot = self.token.lock().await;
        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<StoredToken, GraphError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", GRAPH_DEFAULT_SCOPE),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Token(e.to_string()))?;

        if response.status().is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| GraphError::Token(e.to_string()))?;
            info!("Acquired Graph access token (expires in {}s)", token.expires_in);
            Ok(StoredToken::from_response(token))
        } else {
            let status = response.status();
            match response.json::<AadErrorResponse>().await {
                Ok(err) => Err(GraphError::Token(format!(
                    "{} - {}",
                    err.error, err.error_description
                ))),
                Err(_) => Err(GraphError::Token(format!(
                    "token endpoint returned {}",
                    status
                ))),
            }
        }
    }
}
