//! Error types for `verbal-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::Violations;

#[derive(Debug, Error)]
pub enum Error {
  #[error("minute not found: {0}")]
  MinuteNotFound(Uuid),

  #[error("control not found: {0}")]
  ControlNotFound(Uuid),

  #[error("folder not found: {0}")]
  FolderNotFound(Uuid),

  #[error("updating not found: {0}")]
  UpdatingNotFound(Uuid),

  #[error("adherent not found: {0}")]
  AdherentNotFound(Uuid),

  #[error("validation failed: {0}")]
  Validation(Violations),

  #[error("control {0} cannot originate a folder")]
  NotEligible(Uuid),

  #[error("control {0} is already linked to a folder")]
  AlreadyLinked(Uuid),

  #[error("folder number {0:?} is already used in this department")]
  DuplicateFolderNumber(String),

  /// Two minutes received the same case number. The allocation discipline
  /// should make this impossible; it needs manual reconciliation.
  #[error("case number collision on {0:?}")]
  NumberCollision(String),

  #[error("case numbers for year {0:02} are exhausted")]
  NumbersExhausted(u32),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
