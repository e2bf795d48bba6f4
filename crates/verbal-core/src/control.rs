//! Control: a site visit and the notice pipeline that precedes it.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::reference::AgentAttendant;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Whether a control may originate a formal folder or only refreshes an
/// existing case during regularisation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlType {
  Folder,
  Refresh,
}

/// Where the visit took place relative to the property.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlState {
  Inside,
  InsideWithoutConvocation,
  Outside,
  Neighbour,
}

/// Outcome of the request to enter the property.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Acceptance {
  Ok,
  Nok,
  /// The notice never reached anyone; neither accepted nor refused.
  None,
}

/// Why a convocation letter did not lead to a normal visit.
///
/// Free-text reasons are preserved in [`ControlReason::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlReason {
  ErrorAddress,
  UnknownAddress,
  RefusedLetter,
  UnclaimedLetter,
  Other(String),
}

impl ControlReason {
  pub fn as_str(&self) -> &str {
    match self {
      Self::ErrorAddress => "error_address",
      Self::UnknownAddress => "unknown_address",
      Self::RefusedLetter => "refused_letter",
      Self::UnclaimedLetter => "unclaimed_letter",
      Self::Other(s) => s,
    }
  }
}

impl From<&str> for ControlReason {
  fn from(s: &str) -> Self {
    match s {
      "error_address" => Self::ErrorAddress,
      "unknown_address" => Self::UnknownAddress,
      "refused_letter" => Self::RefusedLetter,
      "unclaimed_letter" => Self::UnclaimedLetter,
      other => Self::Other(other.to_owned()),
    }
  }
}

impl From<String> for ControlReason {
  fn from(s: String) -> Self { Self::from(s.as_str()) }
}

impl From<ControlReason> for String {
  fn from(r: ControlReason) -> Self { r.as_str().to_owned() }
}

// ─── Control ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
  pub control_id:        Uuid,
  pub minute_id:         Uuid,
  /// Set when the control belongs to an updating; the updating owns it.
  pub updating_id:       Option<Uuid>,
  pub agent_id:          Uuid,
  pub attendants:        Vec<AgentAttendant>,
  /// Parties already known from the minute.
  pub humans_by_minute:  Vec<Uuid>,
  /// Parties met during the control itself.
  pub humans_by_control: Vec<Uuid>,
  pub control_type:      ControlType,
  pub state:             ControlState,
  pub date_postal:       Option<DateTime<Utc>>,
  pub date_sent:         Option<DateTime<Utc>>,
  pub date_notified:     Option<DateTime<Utc>>,
  pub date_returned:     Option<DateTime<Utc>>,
  pub date_contact:      Option<DateTime<Utc>>,
  pub date_control:      Option<NaiveDate>,
  pub hour_control:      Option<NaiveTime>,
  pub reason:            Option<ControlReason>,
  pub accepted:          Option<Acceptance>,
  pub summoned:          Option<bool>,
  pub courier_delivery:  Option<String>,
  pub is_fenced:         bool,
  /// Folder built from this control. Read-only: derived from the folder
  /// side of the relation.
  pub folder_id:         Option<Uuid>,
  pub created_at:        DateTime<Utc>,
}

impl Control {
  /// Label shown when picking a control, e.g. `"14/03/2024 09:30"`.
  pub fn form_label(&self) -> String {
    let mut label = String::new();
    if let Some(date) = self.date_control {
      label.push_str(&date.format("%d/%m/%Y").to_string());
    }
    if let Some(hour) = self.hour_control {
      if !label.is_empty() {
        label.push(' ');
      }
      label.push_str(&hour.format("%H:%M").to_string());
    }
    if label.is_empty() {
      "undefined control".to_owned()
    } else {
      label
    }
  }
}

// ─── NewControl ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::CaseStore::add_control`].
/// Ids, ownership and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewControl {
  pub agent_id:          Uuid,
  pub attendants:        Vec<AgentAttendant>,
  pub humans_by_minute:  Vec<Uuid>,
  pub humans_by_control: Vec<Uuid>,
  pub control_type:      ControlType,
  pub state:             ControlState,
  pub date_postal:       Option<DateTime<Utc>>,
  pub date_sent:         Option<DateTime<Utc>>,
  pub date_notified:     Option<DateTime<Utc>>,
  pub date_returned:     Option<DateTime<Utc>>,
  pub date_contact:      Option<DateTime<Utc>>,
  pub date_control:      Option<NaiveDate>,
  pub hour_control:      Option<NaiveTime>,
  pub reason:            Option<ControlReason>,
  pub accepted:          Option<Acceptance>,
  pub summoned:          Option<bool>,
  pub courier_delivery:  Option<String>,
  pub is_fenced:         bool,
}

impl NewControl {
  pub fn new(agent_id: Uuid, control_type: ControlType, state: ControlState) -> Self {
    Self {
      agent_id,
      attendants: Vec::new(),
      humans_by_minute: Vec::new(),
      humans_by_control: Vec::new(),
      control_type,
      state,
      date_postal: None,
      date_sent: None,
      date_notified: None,
      date_returned: None,
      date_contact: None,
      date_control: None,
      hour_control: None,
      reason: None,
      accepted: None,
      summoned: None,
      courier_delivery: None,
      is_fenced: false,
    }
  }

  /// Materialise the control with its owner and a store-assigned timestamp.
  pub fn build(
    self,
    minute_id: Uuid,
    updating_id: Option<Uuid>,
    created_at: DateTime<Utc>,
  ) -> Control {
    Control {
      control_id: Uuid::new_v4(),
      minute_id,
      updating_id,
      agent_id: self.agent_id,
      attendants: self.attendants,
      humans_by_minute: self.humans_by_minute,
      humans_by_control: self.humans_by_control,
      control_type: self.control_type,
      state: self.state,
      date_postal: self.date_postal,
      date_sent: self.date_sent,
      date_notified: self.date_notified,
      date_returned: self.date_returned,
      date_contact: self.date_contact,
      date_control: self.date_control,
      hour_control: self.hour_control,
      reason: self.reason,
      accepted: self.accepted,
      summoned: self.summoned,
      courier_delivery: self.courier_delivery,
      is_fenced: self.is_fenced,
      folder_id: None,
      created_at,
    }
  }
}
