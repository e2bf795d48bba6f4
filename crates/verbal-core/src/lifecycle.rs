//! Minute status: derivation from the loaded graph, persistence with
//! history, and notification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  minute::{Minute, MinuteGraph, MinuteStatus, MinuteStory, NewMinute},
  notify::StatusNotifier,
  query::CallerContext,
  store::CaseStore,
};

/// The furthest stage the case has reached, judged from what is attached
/// to it.
pub fn derive_status(graph: &MinuteGraph) -> MinuteStatus {
  let couriers = || graph.folders.iter().filter_map(|f| f.courier.as_ref());

  if graph.minute.is_closed || graph.minute.closure.is_some() {
    MinuteStatus::Closure
  } else if !graph.decisions.is_empty() {
    MinuteStatus::Decision
  } else if !graph.updatings.is_empty() {
    MinuteStatus::Updating
  } else if couriers().any(|c| c.date_ait.is_some()) {
    MinuteStatus::Ait
  } else if couriers().next().is_some() {
    MinuteStatus::Courier
  } else if !graph.folders.is_empty() {
    MinuteStatus::Folder
  } else if !graph.controls.is_empty() {
    MinuteStatus::Control
  } else {
    MinuteStatus::Open
  }
}

/// When a refresh appends to the minute history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
  /// Skip the entry when the status equals the last recorded one.
  #[default]
  SuppressRepeats,
  /// One entry per refresh, repeated statuses included.
  AppendAlways,
}

impl HistoryPolicy {
  fn should_append(self, graph: &MinuteGraph, status: MinuteStatus) -> bool {
    match self {
      Self::AppendAlways => true,
      Self::SuppressRepeats => graph.last_story().map(|s| s.status) != Some(status),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutcome {
  pub minute_id: Uuid,
  pub previous:  MinuteStatus,
  pub status:    MinuteStatus,
  pub changed:   bool,
  /// The history entry written by this refresh, if any.
  pub story:     Option<MinuteStory>,
  /// Set when the notifier failed. The new status is committed regardless.
  pub warning:   Option<String>,
}

/// Recompute, persist and announce the status of one minute.
pub async fn refresh_status<S, N>(
  store: &S,
  notifier: &N,
  policy: HistoryPolicy,
  minute_id: Uuid,
) -> Result<StatusOutcome, S::Error>
where
  S: CaseStore,
  N: StatusNotifier,
{
  let graph = store
    .get_minute(minute_id)
    .await?
    .ok_or(crate::Error::MinuteNotFound(minute_id))?;

  let previous = graph.minute.status;
  let status = derive_status(&graph);
  let append = policy.should_append(&graph, status);
  let story = store.record_status(minute_id, status, append).await?;
  let changed = previous != status;

  let mut warning = None;
  if changed {
    tracing::info!(%minute_id, num = %graph.minute.num, ?previous, ?status, "status changed");
    let minute = Minute { status, ..graph.minute };
    warning = notify(notifier, &minute, status).await;
  } else {
    tracing::debug!(%minute_id, ?status, "status unchanged");
  }

  Ok(StatusOutcome { minute_id, previous, status, changed, story, warning })
}

/// Create a minute and announce it. The creation is always announced, with
/// the initial status.
pub async fn open_minute<S, N>(
  store: &S,
  notifier: &N,
  caller: &CallerContext,
  input: NewMinute,
) -> Result<(Minute, Option<String>), S::Error>
where
  S: CaseStore,
  N: StatusNotifier,
{
  let minute = store.create_minute(caller, input).await?;
  tracing::info!(minute_id = %minute.minute_id, num = %minute.num, "minute opened");
  let warning = notify(notifier, &minute, minute.status).await;
  Ok((minute, warning))
}

async fn notify<N: StatusNotifier>(
  notifier: &N,
  minute: &Minute,
  status: MinuteStatus,
) -> Option<String> {
  match notifier.status_changed(minute, status).await {
    Ok(()) => None,
    Err(e) => {
      tracing::warn!(minute_id = %minute.minute_id, error = %e, "status notification failed");
      Some(e.to_string())
    }
  }
}
