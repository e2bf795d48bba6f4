//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so they sort and compare as text. Calendar dates are `YYYY-MM-DD`, times
//! `HH:MM:SS`. Enumerations use their snake_case names. Lists of plain
//! values (attendants, annexes, commissions) are compact JSON. UUIDs are
//! hyphenated lowercase strings.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;
use verbal_core::{
  control::Control,
  decision::Decision,
  folder::{Courier, Folder},
  minute::{Closure, Minute, MinuteStory},
  plot::Plot,
  reference::{Adherent, Agent, Human, Natinf, Tag},
  updating::Updating,
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref()
    .map(|s| {
      NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
    })
    .transpose()
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M:%S").to_string() }

pub fn decode_opt_time(s: Option<String>) -> Result<Option<NaiveTime>> {
  s.as_deref()
    .map(|s| {
      NaiveTime::parse_from_str(s, "%H:%M:%S")
        .map_err(|e| Error::Decode(format!("time {s:?}: {e}")))
    })
    .transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn encode_enum<E: Into<&'static str>>(e: E) -> &'static str { e.into() }

pub fn decode_enum<E>(s: &str) -> Result<E>
where
  E: FromStr,
  E::Err: Display,
{
  s.parse().map_err(|e| Error::Decode(format!("{s:?}: {e}")))
}

pub fn decode_opt_enum<E>(s: Option<String>) -> Result<Option<E>>
where
  E: FromStr,
  E::Err: Display,
{
  s.as_deref().map(decode_enum).transpose()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

pub fn decode_opt_json<T: DeserializeOwned>(s: Option<String>) -> Result<Option<T>> {
  s.as_deref().map(decode_json).transpose()
}

// ─── Minute ──────────────────────────────────────────────────────────────────

/// Select list matching [`RawMinute::from_row`]; expects `minutes m LEFT JOIN
/// closures cl`.
pub const MINUTE_COLUMNS: &str = "
  m.minute_id, m.num, m.status, m.origin, m.adherent_id, m.agent_id,
  m.tribunal_id, m.tribunal_competent_id, m.department, m.date_opening,
  m.date_last_update, m.date_complaint, m.name_complaint, m.is_closed,
  m.reporting, m.created_at, cl.status, cl.date_closing, cl.observation";

pub struct RawMinute {
  pub minute_id:             String,
  pub num:                   String,
  pub status:                String,
  pub origin:                String,
  pub adherent_id:           String,
  pub agent_id:              Option<String>,
  pub tribunal_id:           Option<String>,
  pub tribunal_competent_id: Option<String>,
  pub department:            String,
  pub date_opening:          String,
  pub date_last_update:      Option<String>,
  pub date_complaint:        Option<String>,
  pub name_complaint:        Option<String>,
  pub is_closed:             bool,
  pub reporting:             Option<String>,
  pub created_at:            String,
  // closures join
  pub closure_status:        Option<String>,
  pub date_closing:          Option<String>,
  pub closure_observation:   Option<String>,
}

impl RawMinute {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      minute_id:             row.get(0)?,
      num:                   row.get(1)?,
      status:                row.get(2)?,
      origin:                row.get(3)?,
      adherent_id:           row.get(4)?,
      agent_id:              row.get(5)?,
      tribunal_id:           row.get(6)?,
      tribunal_competent_id: row.get(7)?,
      department:            row.get(8)?,
      date_opening:          row.get(9)?,
      date_last_update:      row.get(10)?,
      date_complaint:        row.get(11)?,
      name_complaint:        row.get(12)?,
      is_closed:             row.get(13)?,
      reporting:             row.get(14)?,
      created_at:            row.get(15)?,
      closure_status:        row.get(16)?,
      date_closing:          row.get(17)?,
      closure_observation:   row.get(18)?,
    })
  }

  pub fn into_minute(self) -> Result<Minute> {
    let closure = match (self.closure_status, self.date_closing) {
      (Some(status), Some(date_closing)) => Some(Closure {
        status:       decode_enum(&status)?,
        date_closing: decode_dt(&date_closing)?,
        observation:  self.closure_observation,
      }),
      _ => None,
    };

    Ok(Minute {
      minute_id: decode_uuid(&self.minute_id)?,
      num: self.num,
      status: decode_enum(&self.status)?,
      origin: decode_enum(&self.origin)?,
      adherent_id: decode_uuid(&self.adherent_id)?,
      agent_id: decode_opt_uuid(self.agent_id)?,
      tribunal_id: decode_opt_uuid(self.tribunal_id)?,
      tribunal_competent_id: decode_opt_uuid(self.tribunal_competent_id)?,
      department: Some(self.department).filter(|d| !d.is_empty()),
      date_opening: decode_dt(&self.date_opening)?,
      date_last_update: decode_opt_dt(self.date_last_update)?,
      date_complaint: decode_opt_date(self.date_complaint)?,
      name_complaint: self.name_complaint,
      is_closed: self.is_closed,
      closure,
      reporting: self.reporting,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Plot ────────────────────────────────────────────────────────────────────

pub const PLOT_COLUMNS: &str = "
  p.plot_id, p.town_id, p.parcel, p.parcel_clean, p.address, p.place,
  p.is_risk_zone, p.risk, p.latitude, p.longitude, p.location_from";

pub struct RawPlot {
  pub plot_id:       String,
  pub town_id:       String,
  pub parcel:        Option<String>,
  pub parcel_clean:  Option<String>,
  pub address:       Option<String>,
  pub place:         Option<String>,
  pub is_risk_zone:  Option<bool>,
  pub risk:          Option<String>,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub location_from: String,
}

impl RawPlot {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      plot_id:       row.get(0)?,
      town_id:       row.get(1)?,
      parcel:        row.get(2)?,
      parcel_clean:  row.get(3)?,
      address:       row.get(4)?,
      place:         row.get(5)?,
      is_risk_zone:  row.get(6)?,
      risk:          row.get(7)?,
      latitude:      row.get(8)?,
      longitude:     row.get(9)?,
      location_from: row.get(10)?,
    })
  }

  pub fn into_plot(self) -> Result<Plot> {
    Ok(Plot {
      plot_id:       decode_uuid(&self.plot_id)?,
      town_id:       decode_uuid(&self.town_id)?,
      parcel:        self.parcel,
      parcel_clean:  self.parcel_clean,
      address:       self.address,
      place:         self.place,
      is_risk_zone:  self.is_risk_zone,
      risk:          decode_opt_enum(self.risk)?,
      latitude:      self.latitude,
      longitude:     self.longitude,
      location_from: decode_enum(&self.location_from)?,
    })
  }
}

// ─── Control ─────────────────────────────────────────────────────────────────

/// Expects `controls c LEFT JOIN folders f ON f.control_id = c.control_id`.
pub const CONTROL_COLUMNS: &str = "
  c.control_id, c.minute_id, c.updating_id, c.agent_id, c.attendants,
  c.control_type, c.state, c.date_postal, c.date_sent, c.date_notified,
  c.date_returned, c.date_contact, c.date_control, c.hour_control, c.reason,
  c.accepted, c.summoned, c.courier_delivery, c.is_fenced, c.created_at,
  f.folder_id";

pub struct RawControl {
  pub control_id:       String,
  pub minute_id:        String,
  pub updating_id:      Option<String>,
  pub agent_id:         String,
  pub attendants:       String,
  pub control_type:     String,
  pub state:            String,
  pub date_postal:      Option<String>,
  pub date_sent:        Option<String>,
  pub date_notified:    Option<String>,
  pub date_returned:    Option<String>,
  pub date_contact:     Option<String>,
  pub date_control:     Option<String>,
  pub hour_control:     Option<String>,
  pub reason:           Option<String>,
  pub accepted:         Option<String>,
  pub summoned:         Option<bool>,
  pub courier_delivery: Option<String>,
  pub is_fenced:        bool,
  pub created_at:       String,
  // folders join
  pub folder_id:        Option<String>,
}

impl RawControl {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      control_id:       row.get(0)?,
      minute_id:        row.get(1)?,
      updating_id:      row.get(2)?,
      agent_id:         row.get(3)?,
      attendants:       row.get(4)?,
      control_type:     row.get(5)?,
      state:            row.get(6)?,
      date_postal:      row.get(7)?,
      date_sent:        row.get(8)?,
      date_notified:    row.get(9)?,
      date_returned:    row.get(10)?,
      date_contact:     row.get(11)?,
      date_control:     row.get(12)?,
      hour_control:     row.get(13)?,
      reason:           row.get(14)?,
      accepted:         row.get(15)?,
      summoned:         row.get(16)?,
      courier_delivery: row.get(17)?,
      is_fenced:        row.get(18)?,
      created_at:       row.get(19)?,
      folder_id:        row.get(20)?,
    })
  }

  /// Party links are loaded separately.
  pub fn into_control(self) -> Result<Control> {
    Ok(Control {
      control_id:        decode_uuid(&self.control_id)?,
      minute_id:         decode_uuid(&self.minute_id)?,
      updating_id:       decode_opt_uuid(self.updating_id)?,
      agent_id:          decode_uuid(&self.agent_id)?,
      attendants:        decode_json(&self.attendants)?,
      humans_by_minute:  Vec::new(),
      humans_by_control: Vec::new(),
      control_type:      decode_enum(&self.control_type)?,
      state:             decode_enum(&self.state)?,
      date_postal:       decode_opt_dt(self.date_postal)?,
      date_sent:         decode_opt_dt(self.date_sent)?,
      date_notified:     decode_opt_dt(self.date_notified)?,
      date_returned:     decode_opt_dt(self.date_returned)?,
      date_contact:      decode_opt_dt(self.date_contact)?,
      date_control:      decode_opt_date(self.date_control)?,
      hour_control:      decode_opt_time(self.hour_control)?,
      reason:            self.reason.map(Into::into),
      accepted:          decode_opt_enum(self.accepted)?,
      summoned:          self.summoned,
      courier_delivery:  self.courier_delivery,
      is_fenced:         self.is_fenced,
      folder_id:         decode_opt_uuid(self.folder_id)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

// ─── Folder ──────────────────────────────────────────────────────────────────

pub const FOLDER_COLUMNS: &str = "
  f.folder_id, f.num, f.minute_id, f.control_id, f.folder_type, f.nature,
  f.reason_obstacle, f.ascertainment, f.details, f.violation, f.date_closure,
  f.is_reread, f.folder_signed, f.annexes, f.has_courier,
  f.courier_date_offender, f.courier_date_judicial, f.courier_date_ait,
  f.created_at";

pub struct RawFolder {
  pub folder_id:             String,
  pub num:                   String,
  pub minute_id:             String,
  pub control_id:            String,
  pub folder_type:           String,
  pub nature:                Option<String>,
  pub reason_obstacle:       Option<String>,
  pub ascertainment:         Option<String>,
  pub details:               Option<String>,
  pub violation:             Option<String>,
  pub date_closure:          Option<String>,
  pub is_reread:             bool,
  pub folder_signed:         Option<String>,
  pub annexes:               String,
  pub has_courier:           bool,
  pub courier_date_offender: Option<String>,
  pub courier_date_judicial: Option<String>,
  pub courier_date_ait:      Option<String>,
  pub created_at:            String,
}

impl RawFolder {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      folder_id:             row.get(0)?,
      num:                   row.get(1)?,
      minute_id:             row.get(2)?,
      control_id:            row.get(3)?,
      folder_type:           row.get(4)?,
      nature:                row.get(5)?,
      reason_obstacle:       row.get(6)?,
      ascertainment:         row.get(7)?,
      details:               row.get(8)?,
      violation:             row.get(9)?,
      date_closure:          row.get(10)?,
      is_reread:             row.get(11)?,
      folder_signed:         row.get(12)?,
      annexes:               row.get(13)?,
      has_courier:           row.get(14)?,
      courier_date_offender: row.get(15)?,
      courier_date_judicial: row.get(16)?,
      courier_date_ait:      row.get(17)?,
      created_at:            row.get(18)?,
    })
  }

  /// Tags, natinfs and party links are loaded separately.
  pub fn into_folder(self) -> Result<Folder> {
    let courier = if self.has_courier {
      Some(Courier {
        date_offender: decode_opt_date(self.courier_date_offender)?,
        date_judicial: decode_opt_date(self.courier_date_judicial)?,
        date_ait:      decode_opt_date(self.courier_date_ait)?,
      })
    } else {
      None
    };

    Ok(Folder {
      folder_id: decode_uuid(&self.folder_id)?,
      num: self.num,
      minute_id: decode_uuid(&self.minute_id)?,
      control_id: decode_uuid(&self.control_id)?,
      folder_type: decode_enum(&self.folder_type)?,
      nature: decode_opt_enum(self.nature)?,
      reason_obstacle: decode_opt_enum(self.reason_obstacle)?,
      ascertainment: self.ascertainment,
      details: self.details,
      violation: self.violation,
      date_closure: decode_opt_dt(self.date_closure)?,
      is_reread: self.is_reread,
      folder_signed: self.folder_signed,
      annexes: decode_json(&self.annexes)?,
      tags_nature: Vec::new(),
      tags_town: Vec::new(),
      natinfs: Vec::new(),
      humans_by_minute: Vec::new(),
      humans_by_folder: Vec::new(),
      courier,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Small aggregate rows ────────────────────────────────────────────────────

pub struct RawUpdating {
  pub updating_id: String,
  pub minute_id:   String,
  pub num:         String,
  pub nature:      Option<String>,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawUpdating {
  pub const COLUMNS: &'static str = "updating_id, minute_id, num, nature, description, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      updating_id: row.get(0)?,
      minute_id:   row.get(1)?,
      num:         row.get(2)?,
      nature:      row.get(3)?,
      description: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  /// Owned controls are attached by the caller.
  pub fn into_updating(self) -> Result<Updating> {
    Ok(Updating {
      updating_id: decode_uuid(&self.updating_id)?,
      minute_id:   decode_uuid(&self.minute_id)?,
      num:         self.num,
      nature:      decode_opt_enum(self.nature)?,
      description: self.description,
      controls:    Vec::new(),
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawDecision {
  pub decision_id:         String,
  pub minute_id:           String,
  pub tribunal_id:         Option<String>,
  pub tribunal_commission: Option<String>,
  pub appeal_commission:   Option<String>,
  pub created_at:          String,
}

impl RawDecision {
  pub const COLUMNS: &'static str =
    "decision_id, minute_id, tribunal_id, tribunal_commission, appeal_commission, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      decision_id:         row.get(0)?,
      minute_id:           row.get(1)?,
      tribunal_id:         row.get(2)?,
      tribunal_commission: row.get(3)?,
      appeal_commission:   row.get(4)?,
      created_at:          row.get(5)?,
    })
  }

  pub fn into_decision(self) -> Result<Decision> {
    Ok(Decision {
      decision_id:         decode_uuid(&self.decision_id)?,
      minute_id:           decode_uuid(&self.minute_id)?,
      tribunal_id:         decode_opt_uuid(self.tribunal_id)?,
      tribunal_commission: decode_opt_json(self.tribunal_commission)?,
      appeal_commission:   decode_opt_json(self.appeal_commission)?,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawStory {
  pub story_id:    String,
  pub minute_id:   String,
  pub status:      String,
  pub recorded_at: String,
}

impl RawStory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      story_id:    row.get(0)?,
      minute_id:   row.get(1)?,
      status:      row.get(2)?,
      recorded_at: row.get(3)?,
    })
  }

  pub fn into_story(self) -> Result<MinuteStory> {
    Ok(MinuteStory {
      story_id:    decode_uuid(&self.story_id)?,
      minute_id:   decode_uuid(&self.minute_id)?,
      status:      decode_enum(&self.status)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

// ─── Reference rows ──────────────────────────────────────────────────────────

pub fn human_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, Option<String>, String)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

pub fn into_human(raw: (String, String, Option<String>, String)) -> Result<Human> {
  let (human_id, name, firstname, kind) = raw;
  Ok(Human { human_id: decode_uuid(&human_id)?, name, firstname, kind: decode_enum(&kind)? })
}

pub fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

pub fn into_tag(raw: (String, String, String)) -> Result<Tag> {
  let (tag_id, name, category) = raw;
  Ok(Tag { tag_id: decode_uuid(&tag_id)?, name, category: decode_enum(&category)? })
}

pub fn natinf_from_row(row: &Row<'_>) -> rusqlite::Result<(String, u32, String)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

pub fn into_natinf(raw: (String, u32, String)) -> Result<Natinf> {
  let (natinf_id, num, qualification) = raw;
  Ok(Natinf { natinf_id: decode_uuid(&natinf_id)?, num, qualification })
}

pub struct RawAdherent {
  pub adherent_id:      String,
  pub name:             String,
  pub firstname:        Option<String>,
  pub function:         Option<String>,
  pub city:             Option<String>,
  pub town_id:          Option<String>,
  pub intercommunal_id: Option<String>,
  pub service_id:       Option<String>,
}

impl RawAdherent {
  pub const COLUMNS: &'static str =
    "adherent_id, name, firstname, function, city, town_id, intercommunal_id, service_id";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      adherent_id:      row.get(0)?,
      name:             row.get(1)?,
      firstname:        row.get(2)?,
      function:         row.get(3)?,
      city:             row.get(4)?,
      town_id:          row.get(5)?,
      intercommunal_id: row.get(6)?,
      service_id:       row.get(7)?,
    })
  }

  pub fn into_adherent(self) -> Result<Adherent> {
    Ok(Adherent {
      adherent_id:      decode_uuid(&self.adherent_id)?,
      name:             self.name,
      firstname:        self.firstname,
      function:         self.function,
      city:             self.city,
      town_id:          decode_opt_uuid(self.town_id)?,
      intercommunal_id: decode_opt_uuid(self.intercommunal_id)?,
      service_id:       decode_opt_uuid(self.service_id)?,
    })
  }
}

pub fn agent_from_row(
  row: &Row<'_>,
) -> rusqlite::Result<(String, String, String, Option<String>, Option<String>)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

pub fn into_agent(raw: (String, String, String, Option<String>, Option<String>)) -> Result<Agent> {
  let (agent_id, adherent_id, name, firstname, function) = raw;
  Ok(Agent {
    agent_id: decode_uuid(&agent_id)?,
    adherent_id: decode_uuid(&adherent_id)?,
    name,
    firstname,
    function,
  })
}
