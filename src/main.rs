use actix_cors::Cors;
use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use std::process::exit;
use std::sync::Arc;

use rustysheets::api::auth::ApiKeyStore;
use rustysheets::api::rate_limit::{RateLimitConfig, RateLimitMiddleware};
use rustysheets::api::rest::{configure_rest_service, health, AppState};
use rustysheets::audit::{AuditSink, LogAuditSink};
use rustysheets::config::Settings;
use rustysheets::graph::{GraphApi, GraphAuthConfig, HttpGraphClient, TokenProvider};
use rustysheets::policy::{FilePolicySource, RangePolicy};
use rustysheets::resolver::NameResolver;

/// RustySheets - Excel-over-Graph proxy with range-level write control
#[derive(Parser, Debug)]
#[command(name = "rustysheets")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file
    #[arg(long, short)]
    config: Option<String>,

    /// Host address to bind the server to
    #[arg(long, env = "REST_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, short, env = "REST_PORT")]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = Settings::new(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        exit(1);
    });
    if let Some(host) = cli.host {
        settings.rest.host = host;
    }
    if let Some(port) = cli.port {
        settings.rest.port = port;
    }

    if settings.graph.client_id.is_empty() || settings.graph.client_secret.is_empty() {
        warn!("GRAPH_CLIENT_ID / GRAPH_CLIENT_SECRET are not configured; Graph calls will fail");
    }

    let settings = Arc::new(settings);

    // Graph collaborators
    let auth_config = GraphAuthConfig::new(
        settings.graph.tenant_id.clone(),
        settings.graph.client_id.clone(),
        settings.graph.client_secret.clone(),
    );
    let tokens = Arc::new(TokenProvider::new(auth_config));
    let graph: Arc<dyn GraphApi> = match &settings.graph.base_url {
        Some(base_url) => {
            if let Err(err) = url::Url::parse(base_url) {
                eprintln!("Invalid GRAPH_BASE_URL '{}': {}", base_url, err);
                exit(1);
            }
            Arc::new(HttpGraphClient::with_base_url(tokens, base_url.clone()))
        }
        None => Arc::new(HttpGraphClient::new(tokens)),
    };

    let resolver = Arc::new(NameResolver::new(graph.clone()));
    let policy = Arc::new(RangePolicy::new(Arc::new(FilePolicySource::new(
        &settings.policy.path,
    ))));
    let audit: Arc<dyn AuditSink> = Arc::new(LogAuditSink);

    // API keys
    let key_store = ApiKeyStore::new();
    if let Some(key) = &settings.api_key {
        key_store.insert(key.clone(), "environment".to_string()).await;
    }
    key_store.init_from_env().await;
    if key_store.is_empty().await {
        warn!("No API keys registered; every request will be rejected with 401");
        warn!("Set RUSTYSHEETS_API_KEY or RUSTYSHEETS_API_KEYS");
    }
    let key_store = Data::new(key_store);

    let state = AppState {
        settings: settings.clone(),
        graph,
        resolver,
        policy,
        audit,
    };
    let app_state = Data::new(state);
    let rate_limit = RateLimitMiddleware::new(RateLimitConfig::from_env());

    info!(
        "Starting RustySheets server on {}:{}",
        settings.rest.host, settings.rest.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .wrap(rate_limit.clone())
            .app_data(app_state.clone())
            .app_data(key_store.clone())
            .service(health)
            .configure(configure_rest_service)
    })
    .bind((settings.rest.host.as_str(), settings.rest.port))?
    .run()
    .await
}
