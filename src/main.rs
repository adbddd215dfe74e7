use std::{process, sync::Arc};

use tasktide::{
    application::{
        error::AppError,
        events::TodoFeed,
        stores::{ArchiveStore, HotStore},
        todos::TodoService,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        mongo::MongoArchive,
        redis::RedisHotStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(err.to_string()))
        .map_err(AppError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let hot = init_hot_store(&settings).await?;
    let archive = init_archive_store(&settings).await;

    let todos = Arc::new(TodoService::new(
        hot,
        archive,
        settings.migration.max_hot_items.get() as usize,
    ));
    let feed = TodoFeed::new(settings.events.buffer.get() as usize);

    serve_http(&settings, AppState { todos, feed }).await
}

/// The hot tier is the write path; failing to reach it at boot is fatal.
async fn init_hot_store(settings: &config::Settings) -> Result<Arc<dyn HotStore>, AppError> {
    let store = RedisHotStore::connect(&settings.hot_store)
        .await
        .map_err(InfraError::hot_store)
        .map_err(AppError::from)?;

    info!(
        host = %settings.hot_store.host,
        port = settings.hot_store.port,
        key = %settings.hot_store.key,
        "Hot store ready"
    );
    Ok(Arc::new(store))
}

/// The archive is optional: a missing URI or a failed connection leaves the
/// process in hot-only mode for its remaining lifetime, never retried.
async fn init_archive_store(settings: &config::Settings) -> Option<Arc<dyn ArchiveStore>> {
    if settings.archive.uri.is_none() {
        warn!("No archive uri configured; starting in hot-only mode");
        return None;
    }

    match MongoArchive::connect(&settings.archive).await {
        Ok(store) => {
            info!(
                database = %settings.archive.database,
                collection = %settings.archive.collection,
                "Archive store ready"
            );
            Some(Arc::new(store))
        }
        Err(err) => {
            warn!(
                error = %err,
                "Archive unreachable; continuing in hot-only mode for the process lifetime"
            );
            None
        }
    }
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.listen_addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            error!(error = %err, "Failed to install shutdown signal handler; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
