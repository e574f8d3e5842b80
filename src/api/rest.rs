//! REST surface: route registration, request shapes, and the thin
//! orchestration layer that composes resolver + policy + Graph client.
//!
//! Per-request sequencing on the write path is fixed: resolve names,
//! parse the (context-qualified) range, capability gate, lock scan, allow
//! scan, audit, then the Graph call. Locks are always evaluated before
//! the allow list.

use actix_web::{
    get, post,
    web::{self, Data, Json, Path},
    HttpRequest, HttpResponse,
};
use actix_web_lab::middleware::from_fn as mw_from_fn;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::auth::{request_principal, validate_api_key};
use crate::api::errors::{success_response, ApiError};
use crate::audit::{AuditEvent, AuditOperation, AuditSink};
use crate::config::Settings;
use crate::excel::address::ParsedRange;
use crate::graph::client::GraphApi;
use crate::graph::types::CellValues;
use crate::policy::{qualify_range, DecisionCode, RangePolicy, WriteTarget};
use crate::resolver::NameResolver;

/// Shared application state, cloned per worker.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub graph: Arc<dyn GraphApi>,
    pub resolver: Arc<NameResolver>,
    pub policy: Arc<RangePolicy>,
    pub audit: Arc<dyn AuditSink>,
}

// --- Route Configuration ---

pub fn configure_rest_service(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(mw_from_fn(validate_api_key))
            .service(list_drives)
            .service(list_items)
            .service(list_worksheets)
            .service(read_range)
            .service(write_range)
            .service(read_table)
            .service(add_table_rows),
    );
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// --- Request Shapes ---

fn validate_values(values: &CellValues) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::new("values_empty"));
    }
    let width = values[0].len();
    if width == 0 {
        return Err(ValidationError::new("values_row_empty"));
    }
    if values.iter().any(|row| row.len() != width) {
        return Err(ValidationError::new("values_not_rectangular"));
    }
    Ok(())
}

fn validate_rows(rows: &CellValues) -> Result<(), ValidationError> {
    if rows.is_empty() {
        return Err(ValidationError::new("rows_empty"));
    }
    if rows.iter().any(|row| row.is_empty()) {
        return Err(ValidationError::new("rows_row_empty"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RangeReadRequest {
    pub drive_id: Option<String>,
    pub drive_name: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    #[validate(length(min = 1))]
    pub worksheet: String,
    #[validate(length(min = 1))]
    pub range: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RangeWriteRequest {
    pub drive_id: Option<String>,
    pub drive_name: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    #[validate(length(min = 1))]
    pub worksheet: String,
    #[validate(length(min = 1))]
    pub range: String,
    /// Rectangular 2D array of cell values.
    #[validate(custom(function = "validate_values"))]
    pub values: CellValues,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TableReadRequest {
    pub drive_id: Option<String>,
    pub drive_name: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    #[validate(length(min = 1))]
    pub table: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TableRowsRequest {
    pub drive_id: Option<String>,
    pub drive_name: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    #[validate(length(min = 1))]
    pub table: String,
    #[validate(custom(function = "validate_rows"))]
    pub rows: CellValues,
}

// --- Helper Functions ---

fn validate_payload<T: Validate>(payload: Json<T>) -> Result<T, ApiError> {
    let inner = payload.into_inner();
    inner.validate()?;
    Ok(inner)
}

/// The address portion of a range, without any sheet qualifier. Graph
/// takes the worksheet from the URL path, not the address string.
fn address_only(range: &str) -> &str {
    range.split_once('!').map(|(_, rest)| rest).unwrap_or(range)
}

/// Resolve the drive and item a request points at, from IDs when given
/// and names otherwise.
async fn resolve_workbook(
    state: &AppState,
    drive_id: Option<&str>,
    drive_name: Option<&str>,
    item_id: Option<&str>,
    item_name: Option<&str>,
) -> Result<(String, String), ApiError> {
    let drive_id = match (drive_id, drive_name) {
        (Some(id), _) if !id.is_empty() => id.to_string(),
        (_, Some(name)) if !name.is_empty() => {
            state
                .resolver
                .resolve_drive_id(&state.settings.graph.site_id, name)
                .await?
        }
        _ => {
            return Err(ApiError::BadRequest {
                message: "driveId or driveName is required".to_string(),
            })
        }
    };

    let item_id = match (item_id, item_name) {
        (Some(id), _) if !id.is_empty() => id.to_string(),
        (_, Some(name)) if !name.is_empty() => {
            state.resolver.resolve_item_id(&drive_id, name).await?
        }
        _ => {
            return Err(ApiError::BadRequest {
                message: "itemId or itemName is required".to_string(),
            })
        }
    };

    Ok((drive_id, item_id))
}

// --- Route Handlers ---

// === Listings ===

#[get("/drives")]
async fn list_drives(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let drives = state.graph.list_drives(&state.settings.graph.site_id).await?;
    let total = drives.len();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "drives": drives,
        "total": total,
    })))
}

#[get("/drives/{drive_id}/items")]
async fn list_items(
    state: Data<AppState>,
    path: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let drive_id = path.into_inner();
    let items = state.graph.list_items(&drive_id).await?;
    let total = items.len();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "items": items,
        "total": total,
    })))
}

#[get("/drives/{drive_id}/items/{item_id}/worksheets")]
async fn list_worksheets(
    state: Data<AppState>,
    path: Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (drive_id, item_id) = path.into_inner();
    let worksheets = state.graph.list_worksheets(&drive_id, &item_id).await?;
    let total = worksheets.len();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "worksheets": worksheets,
        "total": total,
    })))
}

// === Range Operations ===

#[post("/workbook/range/read")]
async fn read_range(
    state: Data<AppState>,
    payload: Json<RangeReadRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validate_payload(payload)?;

    // Reads skip the write policy but still reject garbage addresses.
    let qualified = qualify_range(&body.range, &body.worksheet);
    ParsedRange::parse(&qualified).map_err(|e| ApiError::InvalidRange {
        message: e.to_string(),
    })?;

    let (drive_id, item_id) = resolve_workbook(
        &state,
        body.drive_id.as_deref(),
        body.drive_name.as_deref(),
        body.item_id.as_deref(),
        body.item_name.as_deref(),
    )
    .await?;
    let worksheet_id = state
        .resolver
        .resolve_worksheet_id(&drive_id, &item_id, &body.worksheet)
        .await?;

    let data = state
        .graph
        .get_range(&drive_id, &item_id, &worksheet_id, address_only(&body.range))
        .await?;

    Ok(success_response(data))
}

#[post("/workbook/range/write")]
async fn write_range(
    state: Data<AppState>,
    req: HttpRequest,
    payload: Json<RangeWriteRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validate_payload(payload)?;
    let principal = request_principal(&req)?;

    let qualified = qualify_range(&body.range, &body.worksheet);
    ParsedRange::parse(&qualified).map_err(|e| ApiError::InvalidRange {
        message: e.to_string(),
    })?;

    let (drive_id, item_id) = resolve_workbook(
        &state,
        body.drive_id.as_deref(),
        body.drive_name.as_deref(),
        body.item_id.as_deref(),
        body.item_name.as_deref(),
    )
    .await?;
    let worksheet_id = state
        .resolver
        .resolve_worksheet_id(&drive_id, &item_id, &body.worksheet)
        .await?;

    let target = WriteTarget {
        item_id: &item_id,
        item_name: body.item_name.as_deref(),
        worksheet: Some(&body.worksheet),
        table: None,
    };
    let decision = state
        .policy
        .authorize_write(&principal.name, &target, &body.range, &body.worksheet);

    state.audit.record(AuditEvent {
        timestamp: chrono::Utc::now(),
        request_id: Uuid::new_v4(),
        principal: principal.name.clone(),
        operation: AuditOperation::WriteRange,
        drive_id: drive_id.clone(),
        item_id: item_id.clone(),
        worksheet: Some(body.worksheet.clone()),
        target: qualified.clone(),
        allowed: decision.allowed,
        code: decision.code,
        reason: decision.reason.clone(),
    });

    if !decision.allowed {
        return Err(match decision.code {
            DecisionCode::ValidationError => ApiError::PolicyFailure {
                message: decision.reason,
            },
            code => ApiError::RangeDenied {
                reason: decision.reason,
                code,
                allowed_ranges: state.policy.allowed_ranges(),
            },
        });
    }

    let data = state
        .graph
        .patch_range(
            &drive_id,
            &item_id,
            &worksheet_id,
            address_only(&body.range),
            body.values,
        )
        .await?;

    info!(
        "Wrote range {} in item {} for principal {}",
        qualified, item_id, principal.name
    );
    Ok(success_response(data))
}

// === Table Operations ===

#[post("/workbook/table/read")]
async fn read_table(
    state: Data<AppState>,
    payload: Json<TableReadRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validate_payload(payload)?;

    let (drive_id, item_id) = resolve_workbook(
        &state,
        body.drive_id.as_deref(),
        body.drive_name.as_deref(),
        body.item_id.as_deref(),
        body.item_name.as_deref(),
    )
    .await?;

    let data = state
        .graph
        .get_table_range(&drive_id, &item_id, &body.table)
        .await?;

    Ok(success_response(data))
}

#[post("/workbook/table/rows")]
async fn add_table_rows(
    state: Data<AppState>,
    req: HttpRequest,
    payload: Json<TableRowsRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validate_payload(payload)?;
    let principal = request_principal(&req)?;

    let (drive_id, item_id) = resolve_workbook(
        &state,
        body.drive_id.as_deref(),
        body.drive_name.as_deref(),
        body.item_id.as_deref(),
        body.item_name.as_deref(),
    )
    .await?;

    let target = WriteTarget {
        item_id: &item_id,
        item_name: body.item_name.as_deref(),
        worksheet: None,
        table: Some(&body.table),
    };
    let decision = state.policy.authorize_table_write(&principal.name, &target);

    state.audit.record(AuditEvent {
        timestamp: chrono::Utc::now(),
        request_id: Uuid::new_v4(),
        principal: principal.name.clone(),
        operation: AuditOperation::AddTableRows,
        drive_id: drive_id.clone(),
        item_id: item_id.clone(),
        worksheet: None,
        target: body.table.clone(),
        allowed: decision.allowed,
        code: decision.code,
        reason: decision.reason.clone(),
    });

    if !decision.allowed {
        return Err(match decision.code {
            DecisionCode::ValidationError => ApiError::PolicyFailure {
                message: decision.reason,
            },
            code => ApiError::RangeDenied {
                reason: decision.reason,
                code,
                allowed_ranges: state.policy.allowed_ranges(),
            },
        });
    }

    let row_count = body.rows.len();
    state
        .graph
        .add_table_rows(&drive_id, &item_id, &body.table, body.rows)
        .await?;

    info!(
        "Added {} rows to table {} in item {} for principal {}",
        row_count, body.table, item_id, principal.name
    );
    Ok(success_response(serde_json::json!({
        "table": body.table,
        "rowsAdded": row_count,
    })))
}
