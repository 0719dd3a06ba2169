//! Gateway entry point: loads configuration, wires the Storage/Metadata/
//! Cache layers into the Interceptor Chain, then starts the HTTP surface
//! and the Postgres protocol proxy side by side.

use std::sync::Arc;

use family_storage_gateway::cache::MetadataCache;
use family_storage_gateway::config::ConfigBuilder;
use family_storage_gateway::interceptor::InterceptorChain;
use family_storage_gateway::metadata::postgres_store::{MetadataStoreExt, PostgresMetadataStore};
use family_storage_gateway::proxy::audit::{AuditSink, TracingAuditSink};
use family_storage_gateway::proxy::deny_list::DenyList;
use family_storage_gateway::service::FileStorageService;
use family_storage_gateway::storage::{build_adapter, StorageAdapter};
use family_storage_gateway::validator::{FileValidator, ValidatorConfig};
use family_storage_gateway::{http, proxy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ConfigBuilder::from_env().build()?;
    tracing::info!(
        port = config.http.listen_port,
        storage = ?config.storage.storage_type,
        "gateway: configuration loaded"
    );

    let storage: Arc<dyn StorageAdapter> = Arc::from(build_adapter(&config.storage)?);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let metadata_store: Arc<dyn MetadataStoreExt> = Arc::new(PostgresMetadataStore::new(pool));

    let cache = Arc::new(MetadataCache::new(
        config.cache.ttl_file,
        config.cache.ttl_search,
        config.cache.ttl_list,
    ));

    let validator = Arc::new(FileValidator::new(ValidatorConfig {
        max_file_size: config.storage.max_file_size,
        allowed_extensions: config.storage.allowed_extensions.clone(),
        ..ValidatorConfig::default()
    }));

    let chain = InterceptorChain::new(
        Arc::clone(&validator),
        Arc::clone(&storage),
        Arc::clone(&metadata_store),
        Arc::clone(&cache),
    );
    let service = Arc::new(FileStorageService::new(
        chain,
        Arc::clone(&metadata_store),
        Arc::clone(&storage),
        Arc::clone(&cache),
    ));

    let deny_list = Arc::new(DenyList::new(config.proxy.deny_patterns.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    let proxy_config = config.proxy.postgres.clone();
    let proxy_deny_list = Arc::clone(&deny_list);
    let proxy_audit = Arc::clone(&audit);
    let proxy_handle = tokio::spawn(async move {
        if let Err(e) = proxy::serve_postgres(proxy_config, proxy_deny_list, proxy_audit).await {
            tracing::error!(error = %e, "proxy: postgres listener exited");
        }
    });

    let app = http::router(service);
    let bind = format!("{}:{}", config.http.bind_address, config.http.listen_port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "gateway: http listener bound");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http: server exited");
        }
    });

    tokio::select! {
        _ = proxy_handle => {}
        _ = http_handle => {}
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
