// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! API Key Authentication Module
//!
//! Keys arrive in the `X-API-Key` header or as an `Authorization: Bearer`
//! token. Each key maps to a named principal; the name is what the policy
//! document's capability table refers to, and what audit records carry.

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
    Error as ActixError, HttpMessage, HttpRequest,
};
use actix_web_lab::middleware::Next;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::errors::ApiError;

/// The authenticated caller, stored in request extensions by the
/// middleware for handlers and audit records to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
}

/// API key store mapping keys to principal names.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: Arc<RwLock<HashMap<String, Principal>>>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key for a named principal. Replaces any previous entry
    /// for the same key.
    pub async fn insert(&self, key: String, name: String) {
        if key.is_empty() || key == "your-secure-api-key-here" {
            warn!("Refusing to register placeholder API key for '{}'", name);
            warn!("Generate a secure key with: openssl rand -hex 32");
            return;
        }
        let mut keys = self.keys.write().await;
        keys.insert(key, Principal { name });
    }

    /// Load additional keys from RUSTYSHEETS_API_KEYS, formatted as
    /// comma-separated `name=key` pairs.
    pub async fn init_from_env(&self) {
        let Ok(raw) = std::env::var("RUSTYSHEETS_API_KEYS") else {
            return;
        };
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match pair.split_once('=') {
                Some((name, key)) if !name.is_empty() && !key.is_empty() => {
                    self.insert(key.to_string(), name.to_string()).await;
                    info!("Registered API key for principal '{}'", name);
                }
                _ => warn!("Ignoring malformed RUSTYSHEETS_API_KEYS entry '{}'", pair),
            }
        }
    }

    pub async fn validate_key(&self, key: &str) -> Result<Principal, ApiError> {
        let keys = self.keys.read().await;
        match keys.get(key) {
            Some(principal) => {
                debug!("Valid API key for principal '{}'", principal.name);
                Ok(principal.clone())
            }
            None => {
                warn!("Unknown API key presented");
                Err(ApiError::InvalidApiKey {
                    reason: "Invalid API key".to_string(),
                })
            }
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

/// Extract the API key from the request headers, if any.
pub fn api_key_from_headers(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("X-API-Key")
        .or_else(|| req.headers().get("Authorization"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
}

/// API key validation middleware for the `/api/v1` scope.
pub async fn validate_api_key(
    req: ServiceRequest,
    next: Next<impl actix_web::body::MessageBody>,
) -> Result<ServiceResponse<impl actix_web::body::MessageBody>, ActixError> {
    let Some(store) = req.app_data::<Data<ApiKeyStore>>() else {
        warn!("API key store missing from app data");
        return Err(ApiError::Internal {
            message: "Server configuration error".to_string(),
        }
        .into());
    };

    let Some(api_key) = api_key_from_headers(&req) else {
        warn!("Request missing API key");
        return Err(ApiError::Unauthorized.into());
    };

    let principal = store.validate_key(&api_key).await?;
    req.extensions_mut().insert(principal);

    next.call(req).await
}

/// The principal the auth middleware attached to this request.
pub fn request_principal(req: &HttpRequest) -> Result<Principal, ApiError> {
    req.extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(ApiError::Unauthorized)
}
