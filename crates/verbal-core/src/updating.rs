//! Updating: a regularisation follow-up bundling refresh controls.
//!
//! An updating exclusively owns its controls: removing it removes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::control::Control;

/// How the situation evolved since the previous visit.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdatingNature {
  Aggravated,
  Unchanged,
  Regularized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Updating {
  pub updating_id: Uuid,
  pub minute_id:   Uuid,
  pub num:         String,
  pub nature:      Option<UpdatingNature>,
  pub description: Option<String>,
  pub controls:    Vec<Control>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::CaseStore::create_updating`].
#[derive(Debug, Clone, Default)]
pub struct NewUpdating {
  pub num:         String,
  pub nature:      Option<UpdatingNature>,
  pub description: Option<String>,
}
