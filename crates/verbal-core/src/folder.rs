//! Folder: the formal enforcement dossier built from one control.
//!
//! The folder row carries the reference to its control. Deleting the control
//! deletes the folder; deleting the folder leaves the control in place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{
  control::ControlType,
  reference::{Natinf, Tag},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FolderNature {
  Hut,
  Other,
  Obstacle,
  FormalOffense,
  SubstantiveOffense,
}

/// Why an obstacle folder was drawn up.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReasonObstacle {
  RefuseAccessAfterLetter,
  RefuseByRecipient,
  UnclaimedByRecipient,
  AccessRefused,
  AbsentDuringControl,
}

/// Mailing of the folder to the offender and the prosecutor, and the
/// works-interruption order (AIT) that may follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Courier {
  pub date_offender: Option<NaiveDate>,
  pub date_judicial: Option<NaiveDate>,
  pub date_ait:      Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
  pub folder_id:        Uuid,
  /// Unique within the department of the minute.
  pub num:              String,
  pub minute_id:        Uuid,
  pub control_id:       Uuid,
  /// Copied from the originating control.
  pub folder_type:      ControlType,
  pub nature:           Option<FolderNature>,
  pub reason_obstacle:  Option<ReasonObstacle>,
  pub ascertainment:    Option<String>,
  pub details:          Option<String>,
  pub violation:        Option<String>,
  pub date_closure:     Option<DateTime<Utc>>,
  pub is_reread:        bool,
  /// Reference to the signed document in the external document store.
  pub folder_signed:    Option<String>,
  pub annexes:          Vec<String>,
  pub tags_nature:      Vec<Tag>,
  pub tags_town:        Vec<Tag>,
  pub natinfs:          Vec<Natinf>,
  pub humans_by_minute: Vec<Uuid>,
  pub humans_by_folder: Vec<Uuid>,
  pub courier:          Option<Courier>,
  pub created_at:       DateTime<Utc>,
}

impl Folder {
  /// True if either tag list carries a tag with exactly this name.
  pub fn has_tag(&self, name: &str) -> bool {
    self
      .tags_nature
      .iter()
      .chain(self.tags_town.iter())
      .any(|tag| tag.name == name)
  }

  pub fn has_natinf(&self, num: u32) -> bool {
    self.natinfs.iter().any(|natinf| natinf.num == num)
  }
}

/// Input to [`crate::store::CaseStore::create_folder`]. Tags and natinfs are
/// given by id; the store resolves them.
#[derive(Debug, Clone, Default)]
pub struct NewFolder {
  pub num:              String,
  pub nature:           Option<FolderNature>,
  pub reason_obstacle:  Option<ReasonObstacle>,
  pub ascertainment:    Option<String>,
  pub details:          Option<String>,
  pub violation:        Option<String>,
  pub tags:             Vec<Uuid>,
  pub natinfs:          Vec<Uuid>,
  pub humans_by_minute: Vec<Uuid>,
  pub humans_by_folder: Vec<Uuid>,
}

impl NewFolder {
  pub fn numbered(num: impl Into<String>) -> Self {
    Self { num: num.into(), ..Self::default() }
  }
}
