//! Background role-grant worker.
//!
//! Web handlers hand grant requests to a task owned by the bot side and wait
//! for the outcome with a bounded deadline. Each request runs in its own
//! task, so one grant's propagation delay never holds up the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use rolegate_common::Snowflake;

use crate::models::RoleGrantOutcome;

use super::grant::{GrantRequest, RoleAssigner};

const QUEUE_CAPACITY: usize = 64;
/// Grants running at once; each one spends most of its time in the propagation delay.
const MAX_CONCURRENT_GRANTS: usize = 16;

/// A grant request waiting for the worker.
struct QueuedGrant {
    request: GrantRequest,
    reply_tx: oneshot::Sender<RoleGrantOutcome>,
}

/// Cloneable handle for submitting grants to the worker.
#[derive(Clone)]
pub struct RoleGranter {
    tx: mpsc::Sender<QueuedGrant>,
    deadline: Duration,
}

impl RoleGranter {
    /// Spawn the worker task and return a handle to it.
    pub fn spawn(assigner: RoleAssigner, deadline: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(run_worker(assigner, rx));
        (Self { tx, deadline }, handle)
    }

    /// Submit a grant and wait for its outcome.
    ///
    /// A missed deadline or a stopped worker is reported as `Failed`; the
    /// request itself may still complete in the background.
    pub async fn grant(
        &self,
        user_id: Snowflake,
        access_token: String,
        guild_id: Option<Snowflake>,
        role_id: Option<Snowflake>,
    ) -> RoleGrantOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = QueuedGrant {
            request: GrantRequest {
                user_id,
                access_token,
                guild_id,
                role_id,
            },
            reply_tx,
        };

        let wait = async {
            self.tx.send(queued).await.ok()?;
            reply_rx.await.ok()
        };

        match timeout(self.deadline, wait).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                tracing::error!(user_id = %user_id, "Role grant worker is not running");
                RoleGrantOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %user_id,
                    "Role grant did not finish within {:?}",
                    self.deadline
                );
                RoleGrantOutcome::Failed
            }
        }
    }
}

async fn run_worker(assigner: RoleAssigner, mut rx: mpsc::Receiver<QueuedGrant>) {
    tracing::debug!("Role grant worker started");
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_GRANTS));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            queued = rx.recv() => {
                let Some(queued) = queued else {
                    break;
                };
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let assigner = assigner.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    run_grant(&assigner, queued).await;
                });
            }
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    tracing::error!("Role grant task failed: {}", e);
                }
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    tracing::debug!("Role grant worker stopped");
}

/// Run one grant unless its caller already stopped waiting.
async fn run_grant(assigner: &RoleAssigner, queued: QueuedGrant) {
    if queued.reply_tx.is_closed() {
        tracing::debug!(
            user_id = %queued.request.user_id,
            "Grant caller stopped waiting, skipping"
        );
        return;
    }
    let outcome = assigner.assign(&queued.request).await;
    if queued.reply_tx.send(outcome).is_err() {
        tracing::debug!(
            user_id = %queued.request.user_id,
            "Grant caller stopped waiting, outcome was {}",
            outcome
        );
    }
}
