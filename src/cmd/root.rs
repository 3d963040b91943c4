//! Main daemon command - starts the daemon server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{info, warn, error, debug};
use tokio_util::sync::CancellationToken;

use pyrohost_daemon::config::Configuration;
use pyrohost_daemon::api::HttpClient;
use pyrohost_daemon::cron::Scheduler;
use pyrohost_daemon::egg::{ConfigStore, EggRegistry};
use pyrohost_daemon::server::{self, Manager};
use pyrohost_daemon::router::{self, AppState};

/// Run the main daemon
pub async fn run(config_path: &str) -> Result<()> {
    // Load configuration
    info!("Loading configuration from: {}", config_path);
    let config = Configuration::load(config_path)?;
    let config = Arc::new(config);

    info!("Configuration loaded successfully");
    info!("  API: {}:{}", config.api.host, config.api.port);
    info!("  Data directory: {}", config.system.data_directory.display());
    info!("  Panel URL: {}", config.remote.url);

    // Create API client
    let api_client = Arc::new(HttpClient::new(&config.remote)?);

    // Initialize server manager (fetches servers from panel)
    info!("Initializing server manager...");
    let manager = Arc::new(Manager::new(api_client.clone(), config.clone()));

    // Load servers from panel
    if let Err(e) = manager.initialize().await {
        error!("Failed to initialize server manager: {}", e);
        return Err(e.into());
    }
    info!("Loaded {} servers", manager.count());

    // Sync container statuses to panel (important after daemon restart)
    manager.sync_all_statuses().await;

    // Load the egg registry (seeds built-in defaults if empty) and the
    // local per-instance config store.
    let eggs = Arc::new(EggRegistry::load(&config.system.eggs_directory)?);
    info!("Loaded {} eggs", eggs.list().len());
    let configs = Arc::new(ConfigStore::load(&config.system.configs_directory)?);
    info!("Loaded {} instance configs", configs.list().len());

    // Build the HTTP router
    let state = AppState {
        manager: manager.clone(),
        api_client: api_client.clone(),
        config: config.clone(),
        eggs,
        configs,
    };
    let app = router::build_router(state);

    // Create shutdown token for background tasks
    let shutdown_token = CancellationToken::new();

    // Start periodic status sync task (every 30 seconds)
    let sync_manager = manager.clone();
    let sync_token = shutdown_token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = sync_token.cancelled() => {
                    debug!("Periodic status sync task stopped");
                    return;
                }
                _ = interval.tick() => {
                    debug!("Running periodic status sync...");
                    // Use lightweight report_all_statuses instead of sync_all_statuses
                    // to avoid re-attaching to containers on every tick
                    sync_manager.report_all_statuses().await;
                }
            }
        }
    });
    info!("Started periodic status sync (every 30s)");

    // Registry reconciliation (60s), orphan container sweep (6h), and log
    // retention (24h) tickers.
    let scheduler = Arc::new(Scheduler::new());
    server::spawn_reconciler(manager.clone(), &scheduler, config.system.log_directory.clone()).await;
    info!("Started reconciler (registry reconcile / orphan sweep / log retention)");

    // Start the HTTP/HTTPS server
    let bind_addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .expect("Invalid bind address");

    // Handle graceful shutdown
    let manager_shutdown = manager.clone();
    let shutdown_token_clone = shutdown_token.clone();
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    warn!("Received SIGTERM, stopping accepted requests and servers gracefully...");

                    // Cancel background tasks
                    shutdown_token_clone.cancel();

                    // Stop every supervised container with a 10s engine timeout each, then exit.
                    manager_shutdown.shutdown().await;

                    // Shutdown the HTTP server
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                }
                _ = sigint.recv() => {
                    warn!("Received SIGINT, exiting immediately (containers left running under the engine's restart policy)");
                    std::process::exit(0);
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C handler");
            warn!("Received shutdown signal, stopping servers...");

            shutdown_token_clone.cancel();
            manager_shutdown.shutdown().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    // Check if SSL is enabled
    if config.api.ssl.enabled {
        info!("Starting HTTPS server on {} (SSL enabled)", bind_addr);
        info!("  Certificate: {}", config.api.ssl.cert);
        info!("  Key: {}", config.api.ssl.key);

        // Load TLS configuration
        let tls_config = RustlsConfig::from_pem_file(&config.api.ssl.cert, &config.api.ssl.key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load TLS config: {}", e))?;

        axum_server::bind_rustls(bind_addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        info!("Starting HTTP server on {} (SSL disabled)", bind_addr);

        axum_server::bind(bind_addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    }

    info!("Daemon stopped");
    Ok(())
}
