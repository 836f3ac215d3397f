//! Inquiry deduplication sync.
//!
//! A pull-based batch: read which conversations are already reconciled, read
//! every ended and summarised session, and upsert an inquiry for each session
//! not yet reconciled. Each row's result is collected as data, so one bad row
//! is reported without aborting the batch. Re-running against an unchanged
//! log writes nothing.

use serde::Serialize;

use crate::{
  Error, Result,
  inquiry::{InquiryUpsert, NewInquiry},
  store::RecoveryStore,
};

/// A session that could not be reconciled.
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
  pub conversation_id: String,
  pub error:           String,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
  /// Ended, summarised sessions read from the log.
  pub scanned:        usize,
  /// Of those, how many already had an inquiry.
  pub already_synced: usize,
  /// New inquiries written by this pass.
  pub inserted:       usize,
  /// Rows that turned out to exist already (an overlapping pass won).
  pub refreshed:      usize,
  pub failed:         Vec<SyncFailure>,
}

/// Run one sync pass against `store`.
///
/// Fails only if the log or the existing-id set cannot be read.
pub async fn sync_inquiries<S>(store: &S) -> Result<SyncReport>
where
  S: RecoveryStore,
{
  let existing = store
    .inquiry_conversation_ids()
    .await
    .map_err(Error::store)?;
  let sessions = store.ended_sessions().await.map_err(Error::store)?;

  let mut report = SyncReport {
    scanned: sessions.len(),
    ..SyncReport::default()
  };

  let (synced, unsynced): (Vec<_>, Vec<_>) = sessions
    .iter()
    .filter(|s| s.is_reconcilable())
    .partition(|s| existing.contains(&s.conversation_id));
  report.already_synced = synced.len();

  let pending: Vec<NewInquiry> = unsynced
    .into_iter()
    .filter_map(NewInquiry::from_session)
    .collect();

  for inquiry in pending {
    let conversation_id = inquiry.conversation_id.clone();
    match store.upsert_inquiry(inquiry).await {
      Ok(InquiryUpsert::Inserted(_)) => report.inserted += 1,
      Ok(InquiryUpsert::Refreshed(_)) => report.refreshed += 1,
      Err(e) => {
        tracing::warn!(%conversation_id, error = %e, "failed to upsert inquiry");
        report.failed.push(SyncFailure {
          conversation_id,
          error: e.to_string(),
        });
      }
    }
  }

  tracing::info!(
    scanned = report.scanned,
    inserted = report.inserted,
    failed = report.failed.len(),
    "inquiry sync finished"
  );
  Ok(report)
}
