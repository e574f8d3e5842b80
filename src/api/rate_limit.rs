// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rate Limiting Middleware
//!
//! Fixed minute/hour windows per subject, where the subject is the
//! caller's API key when one is present and the client IP otherwise.
//! Graph itself throttles aggressively, so this keeps one noisy caller
//! from burning the whole tenant's quota. Adds `X-RateLimit-*` headers to
//! responses and answers 429 with `Retry-After` on breach.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpResponse,
};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::RwLock;

use crate::api::auth;

/// Rate limit configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute per subject (API key or IP)
    pub per_minute: u32,
    /// Requests per hour per subject
    pub per_hour: u32,
    /// Subjects that bypass rate limiting (comma-separated in env var)
    pub whitelist: Vec<String>,
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let per_minute = std::env::var("RUSTYSHEETS_RATE_LIMIT_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let per_hour = std::env::var("RUSTYSHEETS_RATE_LIMIT_HOUR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let whitelist = std::env::var("RUSTYSHEETS_RATE_LIMIT_WHITELIST")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            per_minute,
            per_hour,
            whitelist,
        }
    }
}

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    resets_at: DateTime<Utc>,
}

impl Window {
    fn new(length: Duration, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            resets_at: now + length,
        }
    }

    fn roll(&mut self, length: Duration, now: DateTime<Utc>) {
        if now > self.resets_at {
            self.count = 0;
            self.resets_at = now + length;
        }
    }
}

#[derive(Debug, Clone)]
struct SubjectCounter {
    minute: Window,
    hour: Window,
}

/// The outcome of a limiter check, for response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
    pub retry_after: i64,
}

/// Shared limiter state behind the middleware.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Arc<RwLock<HashMap<String, SubjectCounter>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Count a request against a subject. `Ok` carries header material;
    /// `Err` means the subject is over one of its windows.
    pub async fn check_and_increment(&self, subject: &str) -> Result<RateStatus, RateStatus> {
        if self.config.whitelist.iter().any(|w| w == subject) {
            return Ok(RateStatus {
                limit: self.config.per_minute,
                remaining: self.config.per_minute,
                reset: 0,
                retry_after: 0,
            });
        }

        let mut counters = self.counters.write().await;
        let now = Utc::now();

        let counter = counters.entry(subject.to_string()).or_insert_with(|| {
            SubjectCounter {
                minute: Window::new(Duration::minutes(1), now),
                hour: Window::new(Duration::hours(1), now),
            }
        });

        counter.minute.roll(Duration::minutes(1), now);
        counter.hour.roll(Duration::hours(1), now);

        if counter.minute.count >= self.config.per_minute {
            let retry_after = (counter.minute.resets_at - now).num_seconds().max(1);
            return Err(RateStatus {
                limit: self.config.per_minute,
                remaining: 0,
                reset: counter.minute.resets_at.timestamp(),
                retry_after,
            });
        }
        if counter.hour.count >= self.config.per_hour {
            let retry_after = (counter.hour.resets_at - now).num_seconds().max(1);
            return Err(RateStatus {
                limit: self.config.per_hour,
                remaining: 0,
                reset: counter.hour.resets_at.timestamp(),
                retry_after,
            });
        }

        counter.minute.count += 1;
        counter.hour.count += 1;

        Ok(RateStatus {
            limit: self.config.per_minute,
            remaining: self.config.per_minute.saturating_sub(counter.minute.count),
            reset: counter.minute.resets_at.timestamp(),
            retry_after: 0,
        })
    }
}

/// Rate limiting middleware factory
///
/// Clone shares the underlying counters, so one instance cloned into each
/// server worker still enforces process-wide limits.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let limiter = self.limiter.clone();
        let service = Rc::clone(&self.service);

        let subject = rate_subject(&req);
        debug!("Rate limit check for subject: {}", subject);

        Box::pin(async move {
            match limiter.check_and_increment(&subject).await {
                Ok(status) => {
                    let mut res = service.call(req).await?;

                    let headers = res.headers_mut();
                    if let Ok(val) = HeaderValue::from_str(&status.limit.to_string()) {
                        headers.insert(HeaderName::from_static("x-ratelimit-limit"), val);
                    }
                    if let Ok(val) = HeaderValue::from_str(&status.remaining.to_string()) {
                        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), val);
                    }
                    if let Ok(val) = HeaderValue::from_str(&status.reset.to_string()) {
                        headers.insert(HeaderName::from_static("x-ratelimit-reset"), val);
                    }

                    Ok(res.map_into_left_body())
                }
                Err(status) => {
                    warn!(
                        "Rate limit exceeded for {}: retry after {}s",
                        subject, status.retry_after
                    );

                    let response = HttpResponse::TooManyRequests()
                        .insert_header(("X-RateLimit-Limit", status.limit.to_string()))
                        .insert_header(("X-RateLimit-Remaining", "0"))
                        .insert_header(("X-RateLimit-Reset", status.reset.to_string()))
                        .insert_header(("Retry-After", status.retry_after.to_string()))
                        .json(serde_json::json!({
                            "code": "RATE_LIMIT_EXCEEDED",
                            "message": format!(
                                "Rate limit exceeded. Retry after {} seconds.",
                                status.retry_after
                            ),
                            "retry_after": status.retry_after,
                        }));

                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

/// The subject a request is counted against: API key if present, client
/// IP otherwise (proxy headers first, then peer address).
fn rate_subject(req: &ServiceRequest) -> String {
    if let Some(key) = auth::api_key_from_headers(req) {
        return format!("key:{}", key);
    }

    if let Some(xff) = req.headers().get("X-Forwarded-For") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return format!("ip:{}", ip);
                }
            }
        }
    }

    if let Some(xri) = req.headers().get("X-Real-IP") {
        if let Ok(ip) = xri.to_str() {
            return format!("ip:{}", ip.trim());
        }
    }

    req.peer_addr()
        .map(|addr| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}
