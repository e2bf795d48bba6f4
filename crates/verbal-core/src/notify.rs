//! Outbound notification of status transitions.

use std::future::Future;

use thiserror::Error;

use crate::minute::{Minute, MinuteStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("notification rejected: {0}")]
  Rejected(String),

  #[error("notification transport failed: {0}")]
  Transport(String),
}

/// Receives every committed status change.
///
/// Failures never roll back the transition; the lifecycle manager logs them
/// and reports a warning.
pub trait StatusNotifier: Send + Sync {
  fn status_changed<'a>(
    &'a self,
    minute: &'a Minute,
    status: MinuteStatus,
  ) -> impl Future<Output = Result<(), NotifyError>> + Send + 'a;
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl StatusNotifier for NoopNotifier {
  async fn status_changed<'a>(
    &'a self,
    _minute: &'a Minute,
    _status: MinuteStatus,
  ) -> Result<(), NotifyError> {
    Ok(())
  }
}
