//! Judicial decisions recorded against a minute.
//!
//! Decisions are maintained by the court-follow-up workflow; this crate only
//! needs enough of them to derive status and fill listings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one judicial hearing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
  pub date_judicial_decision: Option<NaiveDate>,
  pub status_decision:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
  pub decision_id:         Uuid,
  pub minute_id:           Uuid,
  pub tribunal_id:         Option<Uuid>,
  pub tribunal_commission: Option<Commission>,
  pub appeal_commission:   Option<Commission>,
  pub created_at:          DateTime<Utc>,
}

/// Input to [`crate::store::CaseStore::record_decision`].
#[derive(Debug, Clone, Default)]
pub struct NewDecision {
  pub tribunal_id:         Option<Uuid>,
  pub tribunal_commission: Option<Commission>,
  pub appeal_commission:   Option<Commission>,
}
