//! Background inquiry sync.

use std::{sync::Arc, time::Duration};

use recoup_core::{
  store::RecoveryStore,
  sync::{SyncReport, sync_inquiries},
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Run one sync pass, logging rather than propagating a batch-level failure.
pub async fn run_once<S>(store: &S) -> Option<SyncReport>
where
  S: RecoveryStore,
{
  match sync_inquiries(store).await {
    Ok(report) => Some(report),
    Err(e) => {
      tracing::error!(error = %e, "inquiry sync failed");
      None
    }
  }
}

/// Spawn a task that runs the inquiry sync every `every`.
///
/// The first pass runs immediately. A pass that overruns its slot delays the
/// next one instead of queueing a burst.
pub fn spawn_inquiry_sync<S>(store: Arc<S>, every: Duration) -> JoinHandle<()>
where
  S: RecoveryStore + 'static,
{
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      interval.tick().await;
      run_once(store.as_ref()).await;
    }
  })
}
