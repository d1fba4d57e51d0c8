//! Service Runner Module
//!
//! The shared tick loop every service runs on: one sweep at a time, a
//! per-tick health record, an interval sleep raced against a single-slot
//! stop rendezvous. Services never propagate errors; a failed sweep is
//! reported through the health record and retried on the next tick.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use mongodb::bson::doc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::models::{ServiceHealth, COLLECTION_HEALTHCHECKS};
use crate::storage::Database;

/// One periodic service.
///
/// `sweep` performs a full pass and reports whether it succeeded; monitors
/// only advance their chain cursor on success. The height accessors feed the
/// health record and the resume-on-restart path.
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;

    /// Runs one sweep to completion. Must be cancel-free: the runner never
    /// aborts an in-flight sweep.
    fn sweep(&mut self) -> impl Future<Output = bool> + Send;

    /// Last Pocket height this service observed, empty if not applicable.
    fn pokt_height(&self) -> String {
        String::new()
    }

    /// Last EVM block this service observed, empty if not applicable.
    fn eth_block_number(&self) -> String {
        String::new()
    }
}

/// Handle used by the main routine to stop a running service.
pub struct ServiceHandle {
    name: String,
    stop_tx: mpsc::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes the stop signal and waits for the service to exit. The
    /// in-flight sweep completes; only the interval sleep is interrupted.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(err) = self.join.await {
            error!(service = %self.name, ?err, "Service task panicked");
        }
    }
}

/// Spawns a service onto the runtime and returns its stop handle.
pub fn spawn<S: Service + Sync>(mut service: S, interval: Duration, db: Database) -> ServiceHandle {
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let name = service.name().to_string();

    let join = tokio::spawn(async move {
        info!(service = service.name(), ?interval, "Starting service");
        loop {
            debug!(service = service.name(), "Starting sweep");
            let last_sync = Utc::now();
            let healthy = service.sweep().await;
            if !healthy {
                error!(service = service.name(), "Sweep failed, will retry next tick");
            }
            post_health(&db, &service, healthy, last_sync, interval).await;
            debug!(service = service.name(), "Finished sweep, sleeping");

            tokio::select! {
                _ = stop_rx.recv() => {
                    info!(service = service.name(), "Stopped service");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    ServiceHandle {
        name,
        stop_tx,
        join,
    }
}

async fn post_health<S: Service>(
    db: &Database,
    service: &S,
    healthy: bool,
    last_sync: chrono::DateTime<Utc>,
    interval: Duration,
) {
    let health = ServiceHealth {
        name: service.name().to_string(),
        healthy,
        pokt_height: service.pokt_height(),
        eth_block_number: service.eth_block_number(),
        last_sync_time: bson::DateTime::from_chrono(last_sync),
        next_sync_time: bson::DateTime::from_chrono(
            last_sync + chrono::Duration::from_std(interval).unwrap_or_default(),
        ),
    };

    let update = match mongodb::bson::to_document(&health) {
        Ok(document) => doc! { "$set": document },
        Err(err) => {
            error!(service = service.name(), ?err, "Failed to serialize health");
            return;
        }
    };

    if let Err(err) = db
        .upsert_one(
            COLLECTION_HEALTHCHECKS,
            doc! { "name": service.name() },
            update,
        )
        .await
    {
        error!(service = service.name(), ?err, "Failed to post health");
    }
}

/// Last persisted health of a service, for resuming chain cursors.
pub async fn find_last_health(db: &Database, name: &str) -> Option<ServiceHealth> {
    match db
        .find_one::<ServiceHealth>(COLLECTION_HEALTHCHECKS, doc! { "name": name })
        .await
    {
        Ok(health) => health,
        Err(err) => {
            error!(service = name, ?err, "Failed to read last health");
            None
        }
    }
}
