//! Read-only row shapes returned by the listing and report queries.
//!
//! Each query variant has its own projection; none of them is a full
//! entity.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  control::{Acceptance, ControlState, ControlType},
  folder::FolderNature,
  minute::{MinuteStatus, Origin},
  plot::Risk,
};

/// An id with a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
  pub id:   Uuid,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBrowserRow {
  pub minute_id:    Uuid,
  pub num:          String,
  pub status:       MinuteStatus,
  pub date_opening: DateTime<Utc>,
  pub adherent:     NamedRef,
  pub town:         NamedRef,
  pub address:      Option<String>,
  pub place:        Option<String>,
  pub parcel:       Option<String>,
  /// Display names of the parties, in link order.
  pub humans:       Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteOverallRow {
  pub minute_id:    Uuid,
  pub num:          String,
  pub status:       MinuteStatus,
  pub date_opening: DateTime<Utc>,
  pub is_closed:    bool,
  pub adherent:     NamedRef,
  pub service:      Option<NamedRef>,
  pub town:         NamedRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteStatRow {
  pub minute_id:      Uuid,
  pub num:            String,
  pub status:         MinuteStatus,
  pub origin:         Origin,
  pub date_opening:   DateTime<Utc>,
  pub town:           NamedRef,
  pub risk:           Option<Risk>,
  pub controls:       usize,
  pub folder_natures: Vec<FolderNature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteAdherentRow {
  pub adherent:  NamedRef,
  pub minute_id: Uuid,
  pub num:       String,
  pub status:    MinuteStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteMapPoint {
  pub minute_id: Uuid,
  pub num:       String,
  pub status:    MinuteStatus,
  pub latitude:  f64,
  pub longitude: f64,
  pub town:      String,
  pub address:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDateRow {
  pub control_id:   Uuid,
  pub minute_id:    Uuid,
  pub minute_num:   String,
  pub state:        ControlState,
  pub date_control: Option<NaiveDate>,
  pub accepted:     Option<Acceptance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStateRow {
  pub control_id:   Uuid,
  pub minute_id:    Uuid,
  pub control_type: ControlType,
  pub state:        ControlState,
  pub date_control: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMapPoint {
  pub control_id:   Uuid,
  pub minute_id:    Uuid,
  pub minute_num:   String,
  pub latitude:     f64,
  pub longitude:    f64,
  pub date_control: Option<NaiveDate>,
}
