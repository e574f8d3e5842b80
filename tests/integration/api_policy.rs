//! End-to-end tests of the REST surface with a fake Graph backend: the
//! full resolve -> parse -> policy -> audit -> Graph sequencing, and the
//! HTTP status mapping for each failure class.

use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    test,
    web::Data,
    App,
};
use serde_json::{json, Value};

use rustysheets::api::auth::ApiKeyStore;
use rustysheets::api::rest::{configure_rest_service, health, AppState};
use rustysheets::audit::MemoryAuditSink;
use rustysheets::config::{GraphConfig, LogConfig, PolicyConfig, RestConfig, Settings};
use rustysheets::graph::client::GraphApi;
use rustysheets::policy::{
    GrantScope, InMemoryPolicySource, PolicyDocument, PrincipalEntry, RangePolicy,
};
use rustysheets::resolver::NameResolver;

use crate::support::FakeGraph;

const TEST_KEY: &str = "test-key-12345";

fn test_settings() -> Settings {
    Settings {
        log: LogConfig {
            level: "debug".to_string(),
        },
        rest: RestConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        graph: GraphConfig {
            tenant_id: "test-tenant".to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            site_id: "site-1".to_string(),
            base_url: None,
        },
        policy: PolicyConfig {
            path: "unused-in-tests".to_string(),
        },
        api_key: None,
    }
}

async fn spawn_app(
    document: PolicyDocument,
    graph: Arc<FakeGraph>,
    audit: Arc<MemoryAuditSink>,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    let key_store = ApiKeyStore::new();
    key_store
        .insert(TEST_KEY.to_string(), "bot".to_string())
        .await;

    let graph_api: Arc<dyn GraphApi> = graph;
    let state = AppState {
        settings: Arc::new(test_settings()),
        graph: graph_api.clone(),
        resolver: Arc::new(NameResolver::new(graph_api)),
        policy: Arc::new(RangePolicy::new(Arc::new(InMemoryPolicySource::new(
            document,
        )))),
        audit,
    };

    test::init_service(
        App::new()
            .app_data(Data::new(state))
            .app_data(Data::new(key_store))
            .service(health)
            .configure(configure_rest_service),
    )
    .await
}

fn range_policy(allowed: &[&str], locked: &[&str]) -> PolicyDocument {
    PolicyDocument {
        allowed_ranges: allowed.iter().map(|s| s.to_string()).collect(),
        locked_ranges: locked.iter().map(|s| s.to_string()).collect(),
        principals: Vec::new(),
    }
}

fn write_body(range: &str, by_name: bool) -> Value {
    let mut body = json!({
        "worksheet": "Sheet1",
        "range": range,
        "values": [[1, 2], [3, 4]],
    });
    if by_name {
        body["driveName"] = json!("Documents");
        body["itemName"] = json!("Budget.xlsx");
    } else {
        body["driveId"] = json!("drive-1");
        body["itemId"] = json!("item-1");
    }
    body
}

#[actix_web::test]
async fn test_health_is_open() {
    let app = spawn_app(
        range_policy(&[], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
}

#[actix_web::test]
async fn test_missing_api_key_is_401() {
    let app = spawn_app(
        range_policy(&[], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/drives").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 401);
}

#[actix_web::test]
async fn test_lock_overlap_denies_write() {
    // A1:A1 is locked inside the broader allow range.
    let graph = Arc::new(FakeGraph::seeded());
    let audit = Arc::new(MemoryAuditSink::new());
    let app = spawn_app(
        range_policy(&["Sheet1!A1:D100"], &["Sheet1!A1:A1"]),
        graph.clone(),
        audit.clone(),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(write_body("Sheet1!A1:B2", true))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 403);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "RANGE_LOCKED");
    assert_eq!(body["details"]["allowedRanges"][0], "Sheet1!A1:D100");

    // Nothing reached Graph, and the denial was audited.
    assert_eq!(graph.patch_count(), 0);
    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].allowed);
}

#[actix_web::test]
async fn test_contained_write_passes_and_is_audited() {
    let graph = Arc::new(FakeGraph::seeded());
    let audit = Arc::new(MemoryAuditSink::new());
    let app = spawn_app(
        range_policy(&["Sheet1!A1:D100"], &["Sheet1!A1:A1"]),
        graph.clone(),
        audit.clone(),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(write_body("Sheet1!B1:C5", true))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 200);

    let patches = graph.patches.lock().unwrap();
    assert_eq!(patches.len(), 1);
    // Resolved worksheet ID in the path, bare address in the call.
    assert_eq!(patches[0].0, "ws-1");
    assert_eq!(patches[0].1, "B1:C5");

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].allowed);
    assert_eq!(events[0].principal, "bot");
    assert_eq!(events[0].target, "Sheet1!B1:C5");
}

#[actix_web::test]
async fn test_overlap_without_containment_is_403() {
    let app = spawn_app(
        range_policy(&["Sheet1!A1:C10"], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    // A1:Z1 pokes out of the allowed rectangle.
    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(write_body("A1:Z1", false))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 403);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "RANGE_NOT_ALLOWED");
}

#[actix_web::test]
async fn test_malformed_range_is_400() {
    let graph = Arc::new(FakeGraph::seeded());
    let app = spawn_app(
        range_policy(&["Sheet1!A1:D100"], &[]),
        graph.clone(),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(write_body("not-a-range", false))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 400);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "INVALID_RANGE_FORMAT");
    assert_eq!(graph.patch_count(), 0);
}

#[actix_web::test]
async fn test_ragged_values_are_400() {
    let app = spawn_app(
        range_policy(&["Sheet1!A1:D100"], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let mut body = write_body("Sheet1!A1:B2", false);
    body["values"] = json!([[1, 2], [3]]);
    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 400);
}

#[actix_web::test]
async fn test_unknown_item_is_404_with_available_names() {
    let app = spawn_app(
        range_policy(&["Sheet1!A1:D100"], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let mut body = write_body("Sheet1!A1:B2", true);
    body["itemName"] = json!("Missing.xlsx");
    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/write")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 404);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "ITEM_NOT_FOUND");
    assert_eq!(body["details"]["available"][0], "Budget.xlsx");
}

#[actix_web::test]
async fn test_read_skips_write_policy() {
    // Empty allow list: every write would be denied, reads still pass.
    let app = spawn_app(
        range_policy(&[], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/workbook/range/read")
        .insert_header(("X-API-Key", TEST_KEY))
        .set_json(json!({
            "driveName": "documents",
            "itemName": "budget.XLSX",
            "worksheet": "Sheet1",
            "range": "A1:B2",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 200);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["values"][0][0], "cell");
}

#[actix_web::test]
async fn test_table_rows_gated_by_grants() {
    let document = PolicyDocument {
        allowed_ranges: vec![],
        locked_ranges: vec![],
        principals: vec![PrincipalEntry {
            name: "bot".to_string(),
            admin: false,
            write_grants: vec![GrantScope::Table {
                item: "Budget.xlsx".to_string(),
                table: "Expenses".to_string(),
            }],
        }],
    };
    let graph = Arc::new(FakeGraph::seeded());
    let audit = Arc::new(MemoryAuditSink::new());
    let app = spawn_app(document, graph.clone(), audit.clone()).await;

    let rows_request = |table: &str| {
        test::TestRequest::post()
            .uri("/api/v1/workbook/table/rows")
            .insert_header(("X-API-Key", TEST_KEY))
            .set_json(json!({
                "driveName": "Documents",
                "itemName": "Budget.xlsx",
                "table": table,
                "rows": [["2025-01-01", 42]],
            }))
            .to_request()
    };

    let res = test::call_service(&app, rows_request("Expenses")).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(graph.row_appends.lock().unwrap().len(), 1);

    let res = test::call_service(&app, rows_request("Salaries")).await;
    assert_eq!(res.status().as_u16(), 403);
    assert_eq!(graph.row_appends.lock().unwrap().len(), 1);

    let events = audit.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].allowed);
    assert!(!events[1].allowed);
}

#[actix_web::test]
async fn test_listings_round_trip() {
    let app = spawn_app(
        range_policy(&[], &[]),
        Arc::new(FakeGraph::seeded()),
        Arc::new(MemoryAuditSink::new()),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/drives")
        .insert_header(("X-API-Key", TEST_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 200);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["drives"][0]["name"], "Documents");

    let req = test::TestRequest::get()
        .uri("/api/v1/drives/drive-1/items/item-1/worksheets")
        .insert_header(("X-API-Key", TEST_KEY))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 200);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["worksheets"][0]["name"], "Sheet1");
}
