//! Periodic reconciliation between the in-memory server registry and the
//! container engine: detects containers that exited outside of a tracked
//! power action, removes containers the registry no longer has a config for,
//! and prunes aged log files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bollard::container::{ListContainersOptions, RemoveContainerOptions, StopContainerOptions};
use bollard::Docker;
use tracing::{debug, warn};

use crate::cron::Scheduler;
use crate::events::ProcessState;

use super::manager::Manager;

const CONTAINER_PREFIX: &str = "pyro-server-";
const LOG_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Register the registry reconciler, orphan sweep, and log pruner on `scheduler`.
pub async fn spawn(manager: Arc<Manager>, scheduler: &Scheduler, log_directory: PathBuf) {
    let registry_manager = manager.clone();
    scheduler
        .schedule("reconcile-registry", Duration::from_secs(60), move || {
            let manager = registry_manager.clone();
            async move { reconcile_registry(&manager).await }
        })
        .await;

    let orphan_manager = manager.clone();
    scheduler
        .schedule("reconcile-orphans", Duration::from_secs(6 * 60 * 60), move || {
            let manager = orphan_manager.clone();
            async move { reconcile_orphans(&manager).await }
        })
        .await;

    scheduler
        .schedule("prune-logs", Duration::from_secs(24 * 60 * 60), move || {
            let log_directory = log_directory.clone();
            async move { prune_logs(&log_directory).await }
        })
        .await;
}

/// Every 60s: a server the registry believes is online whose container has
/// exited outside of a tracked power action is evicted back to offline.
async fn reconcile_registry(manager: &Manager) {
    for server in manager.all() {
        if server.process_state() == ProcessState::Online && !server.is_container_running().await {
            server.mark_unexpectedly_offline();
        }
    }
}

/// Every 6h: remove containers on the engine that no loaded instance config backs.
async fn reconcile_orphans(manager: &Manager) {
    let docker = match Docker::connect_with_local_defaults() {
        Ok(docker) => docker,
        Err(e) => {
            warn!("Reconciler could not connect to the engine: {}", e);
            return;
        }
    };

    let options = ListContainersOptions::<String> {
        all: true,
        ..Default::default()
    };

    let containers = match docker.list_containers(Some(options)).await {
        Ok(containers) => containers,
        Err(e) => {
            warn!("Reconciler failed to list containers: {}", e);
            return;
        }
    };

    for container in containers {
        let Some(name) = container
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_string())
        else {
            continue;
        };

        let Some(id) = name.strip_prefix(CONTAINER_PREFIX) else {
            continue;
        };

        if manager.exists(id) {
            continue;
        }

        warn!("Removing orphaned container {} (no matching instance config)", name);

        if container.state.as_deref() == Some("running") {
            let _ = docker
                .stop_container(&name, Some(StopContainerOptions { t: 10 }))
                .await;
        }

        if let Err(e) = docker
            .remove_container(
                &name,
                Some(RemoveContainerOptions {
                    force: true,
                    v: false,
                    ..Default::default()
                }),
            )
            .await
        {
            debug!("Failed to remove orphan container {}: {}", name, e);
        }
    }
}

/// Every 24h: delete log files with mtime older than 30 days.
async fn prune_logs(log_directory: &PathBuf) {
    let mut entries = match tokio::fs::read_dir(log_directory).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Reconciler could not read log directory {}: {}", log_directory.display(), e);
            return;
        }
    };

    let now = std::time::SystemTime::now();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Error walking log directory: {}", e);
                break;
            }
        };

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        if !metadata.is_file() {
            continue;
        }

        let age = match metadata.modified() {
            Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
            Err(_) => continue,
        };

        if age > LOG_RETENTION {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!("Failed to prune log file {}: {}", entry.path().display(), e);
            }
        }
    }
}
