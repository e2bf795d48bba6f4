//! Reference data that cases point at but do not own: geography,
//! organisation, people and legal classification.

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

// ─── Geography ───────────────────────────────────────────────────────────────

/// A grouping of towns sharing an administration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intercommunal {
  pub intercommunal_id: Uuid,
  pub name:             String,
  pub code:             String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Town {
  pub town_id:          Uuid,
  pub name:             String,
  /// INSEE-style municipality code.
  pub code:             String,
  pub intercommunal_id: Option<Uuid>,
}

// ─── Organisation ────────────────────────────────────────────────────────────

/// An organisational service. Caseworkers attached to one see every case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
  pub service_id: Uuid,
  pub name:       String,
  pub code:       String,
}

/// The caseworker responsible for minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adherent {
  pub adherent_id:      Uuid,
  pub name:             String,
  pub firstname:        Option<String>,
  pub function:         Option<String>,
  pub city:             Option<String>,
  pub town_id:          Option<Uuid>,
  pub intercommunal_id: Option<Uuid>,
  pub service_id:       Option<Uuid>,
}

impl Adherent {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      adherent_id:      Uuid::new_v4(),
      name:             name.into(),
      firstname:        None,
      function:         None,
      city:             None,
      town_id:          None,
      intercommunal_id: None,
      service_id:       None,
    }
  }
}

/// A sworn agent acting for an adherent during controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
  pub agent_id:    Uuid,
  pub adherent_id: Uuid,
  pub name:        String,
  pub firstname:   Option<String>,
  pub function:    Option<String>,
}

/// Someone attending a control alongside the responsible agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAttendant {
  pub name:      String,
  pub firstname: Option<String>,
  pub function:  Option<String>,
}

// ─── Parties ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HumanKind {
  #[default]
  Person,
  Company,
}

/// A party involved in a case: owner, occupant, offender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Human {
  pub human_id:  Uuid,
  pub name:      String,
  pub firstname: Option<String>,
  pub kind:      HumanKind,
}

impl Human {
  pub fn person(name: impl Into<String>, firstname: Option<&str>) -> Self {
    Self {
      human_id:  Uuid::new_v4(),
      name:      name.into(),
      firstname: firstname.map(str::to_owned),
      kind:      HumanKind::Person,
    }
  }
}

// ─── Legal ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tribunal {
  pub tribunal_id: Uuid,
  pub name:        String,
  pub code:        String,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TagCategory {
  Nature,
  Town,
}

/// A label attached to folders, either describing the works or the town
/// planning zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id:   Uuid,
  pub name:     String,
  pub category: TagCategory,
}

/// A national offence classification code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Natinf {
  pub natinf_id:     Uuid,
  pub num:           u32,
  pub qualification: String,
}
