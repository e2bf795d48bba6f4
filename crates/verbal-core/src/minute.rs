//! Minute: the case record at the root of every enforcement procedure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{
  control::Control,
  decision::Decision,
  folder::Folder,
  plot::{NewPlot, Plot},
  reference::Human,
  updating::Updating,
};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Workflow stage of a minute. Variants are declared in workflow order, so
/// `Ord` compares how far a case has progressed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
  Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MinuteStatus {
  #[default]
  Open,
  Control,
  Folder,
  Courier,
  Ait,
  Updating,
  Decision,
  Closure,
}

/// How the case was brought to the caseworker's attention.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Origin {
  Courier,
  Phone,
  /// Aerial or satellite imagery survey.
  Eagle,
  #[default]
  Agent,
  Other,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClosureStatus {
  Regularized,
  ExecOffice,
  Relaxed,
  Other,
}

// ─── Closure & history ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
  pub status:       ClosureStatus,
  pub date_closing: DateTime<Utc>,
  pub observation:  Option<String>,
}

/// One status transition. History entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteStory {
  pub story_id:    Uuid,
  pub minute_id:   Uuid,
  pub status:      MinuteStatus,
  pub recorded_at: DateTime<Utc>,
}

// ─── Minute ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minute {
  pub minute_id:             Uuid,
  /// Case number, `YY-NNN`; see [`crate::numbering`].
  pub num:                   String,
  pub status:                MinuteStatus,
  pub origin:                Origin,
  pub adherent_id:           Uuid,
  pub agent_id:              Option<Uuid>,
  pub tribunal_id:           Option<Uuid>,
  pub tribunal_competent_id: Option<Uuid>,
  /// Organisational scope; folder numbers are unique within it.
  pub department:            Option<String>,
  pub date_opening:          DateTime<Utc>,
  pub date_last_update:      Option<DateTime<Utc>>,
  pub date_complaint:        Option<NaiveDate>,
  pub name_complaint:        Option<String>,
  pub is_closed:             bool,
  pub closure:               Option<Closure>,
  pub reporting:             Option<String>,
  pub created_at:            DateTime<Utc>,
}

/// A minute with every relation loaded: the aggregate the lifecycle and
/// classification rules operate on.
///
/// `controls` holds every control of the minute, including those owned by an
/// updating; `updatings[..].controls` repeats the owned subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteGraph {
  pub minute:    Minute,
  pub plot:      Plot,
  pub humans:    Vec<Human>,
  pub controls:  Vec<Control>,
  pub updatings: Vec<Updating>,
  pub folders:   Vec<Folder>,
  pub decisions: Vec<Decision>,
  pub history:   Vec<MinuteStory>,
}

impl MinuteGraph {
  pub fn folder_of(&self, control: &Control) -> Option<&Folder> {
    self.folders.iter().find(|f| f.control_id == control.control_id)
  }

  pub fn last_story(&self) -> Option<&MinuteStory> {
    self.history.iter().max_by_key(|s| s.recorded_at)
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CaseStore::create_minute`]. The case number,
/// status and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMinute {
  pub adherent_id:           Uuid,
  pub agent_id:              Option<Uuid>,
  pub origin:                Origin,
  pub department:            Option<String>,
  pub tribunal_id:           Option<Uuid>,
  pub tribunal_competent_id: Option<Uuid>,
  /// Defaults to now; replaced by `date_complaint` when that is set.
  pub date_opening:          Option<DateTime<Utc>>,
  pub date_complaint:        Option<NaiveDate>,
  pub name_complaint:        Option<String>,
  pub reporting:             Option<String>,
  pub humans:                Vec<Uuid>,
  pub plot:                  NewPlot,
}

impl NewMinute {
  pub fn new(adherent_id: Uuid, plot: NewPlot, humans: Vec<Uuid>) -> Self {
    Self {
      adherent_id,
      agent_id: None,
      origin: Origin::default(),
      department: None,
      tribunal_id: None,
      tribunal_competent_id: None,
      date_opening: None,
      date_complaint: None,
      name_complaint: None,
      reporting: None,
      humans,
      plot,
    }
  }

  /// The opening date the minute will carry once created.
  pub fn effective_opening(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(complaint) = self.date_complaint {
      return complaint.and_time(chrono::NaiveTime::MIN).and_utc();
    }
    self.date_opening.unwrap_or(now)
  }
}

/// Editable part of an existing minute, passed to
/// [`crate::store::CaseStore::update_minute`].
#[derive(Debug, Clone)]
pub struct MinuteEdit {
  pub agent_id:              Option<Uuid>,
  pub origin:                Origin,
  pub tribunal_id:           Option<Uuid>,
  pub tribunal_competent_id: Option<Uuid>,
  pub date_complaint:        Option<NaiveDate>,
  pub name_complaint:        Option<String>,
  pub reporting:             Option<String>,
  pub humans:                Vec<Uuid>,
  pub plot:                  Plot,
}

impl MinuteEdit {
  /// Start an edit from the currently stored state.
  pub fn from_graph(graph: &MinuteGraph) -> Self {
    Self {
      agent_id:              graph.minute.agent_id,
      origin:                graph.minute.origin,
      tribunal_id:           graph.minute.tribunal_id,
      tribunal_competent_id: graph.minute.tribunal_competent_id,
      date_complaint:        graph.minute.date_complaint,
      name_complaint:        graph.minute.name_complaint.clone(),
      reporting:             graph.minute.reporting.clone(),
      humans:                graph.humans.iter().map(|h| h.human_id).collect(),
      plot:                  graph.plot.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_order_follows_workflow() {
    assert!(MinuteStatus::Open < MinuteStatus::Control);
    assert!(MinuteStatus::Folder < MinuteStatus::Courier);
    assert!(MinuteStatus::Ait < MinuteStatus::Updating);
    assert!(MinuteStatus::Decision < MinuteStatus::Closure);
  }

  #[test]
  fn status_string_forms() {
    let s: &'static str = MinuteStatus::Ait.into();
    assert_eq!(s, "ait");
    assert_eq!("closure".parse::<MinuteStatus>().unwrap(), MinuteStatus::Closure);
  }

  #[test]
  fn complaint_date_overrides_opening() {
    let now = Utc::now();
    let mut input = NewMinute::new(Uuid::new_v4(), NewPlot::in_town(Uuid::new_v4()), vec![]);
    assert_eq!(input.effective_opening(now), now);

    input.date_complaint = NaiveDate::from_ymd_opt(2024, 5, 2);
    assert_eq!(
      input.effective_opening(now).date_naive(),
      NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    );
  }
}
