//! Row writers. Every function takes the connection (or the open
//! transaction) and writes exactly the rows it names; callers own the
//! transaction boundary.

use rusqlite::{Connection, params};
use uuid::Uuid;
use verbal_core::{
  control::Control,
  decision::Decision,
  folder::Folder,
  minute::{Closure, Minute, MinuteEdit, MinuteStory},
  plot::Plot,
  reference::{Adherent, Agent, Human, Intercommunal, Natinf, Service, Tag, Town, Tribunal},
  updating::Updating,
};

use crate::{
  Result,
  encode::{encode_date, encode_dt, encode_enum, encode_json, encode_time, encode_uuid},
};

// ─── Reference data ──────────────────────────────────────────────────────────

pub fn upsert_intercommunal(conn: &Connection, i: &Intercommunal) -> Result<()> {
  conn.execute(
    "INSERT INTO intercommunals (intercommunal_id, name, code) VALUES (?1, ?2, ?3)
     ON CONFLICT (intercommunal_id) DO UPDATE SET name = excluded.name, code = excluded.code",
    params![encode_uuid(i.intercommunal_id), i.name, i.code],
  )?;
  Ok(())
}

pub fn upsert_town(conn: &Connection, t: &Town) -> Result<()> {
  conn.execute(
    "INSERT INTO towns (town_id, name, code, intercommunal_id) VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (town_id) DO UPDATE SET
       name = excluded.name, code = excluded.code, intercommunal_id = excluded.intercommunal_id",
    params![encode_uuid(t.town_id), t.name, t.code, t.intercommunal_id.map(encode_uuid)],
  )?;
  Ok(())
}

pub fn upsert_service(conn: &Connection, s: &Service) -> Result<()> {
  conn.execute(
    "INSERT INTO services (service_id, name, code) VALUES (?1, ?2, ?3)
     ON CONFLICT (service_id) DO UPDATE SET name = excluded.name, code = excluded.code",
    params![encode_uuid(s.service_id), s.name, s.code],
  )?;
  Ok(())
}

pub fn upsert_adherent(conn: &Connection, a: &Adherent) -> Result<()> {
  conn.execute(
    "INSERT INTO adherents (
       adherent_id, name, firstname, function, city, town_id, intercommunal_id, service_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (adherent_id) DO UPDATE SET
       name = excluded.name, firstname = excluded.firstname,
       function = excluded.function, city = excluded.city,
       town_id = excluded.town_id, intercommunal_id = excluded.intercommunal_id,
       service_id = excluded.service_id",
    params![
      encode_uuid(a.adherent_id),
      a.name,
      a.firstname,
      a.function,
      a.city,
      a.town_id.map(encode_uuid),
      a.intercommunal_id.map(encode_uuid),
      a.service_id.map(encode_uuid),
    ],
  )?;
  Ok(())
}

pub fn upsert_agent(conn: &Connection, a: &Agent) -> Result<()> {
  conn.execute(
    "INSERT INTO agents (agent_id, adherent_id, name, firstname, function)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (agent_id) DO UPDATE SET
       adherent_id = excluded.adherent_id, name = excluded.name,
       firstname = excluded.firstname, function = excluded.function",
    params![encode_uuid(a.agent_id), encode_uuid(a.adherent_id), a.name, a.firstname, a.function],
  )?;
  Ok(())
}

pub fn upsert_human(conn: &Connection, h: &Human) -> Result<()> {
  conn.execute(
    "INSERT INTO humans (human_id, name, firstname, kind) VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (human_id) DO UPDATE SET
       name = excluded.name, firstname = excluded.firstname, kind = excluded.kind",
    params![encode_uuid(h.human_id), h.name, h.firstname, encode_enum(h.kind)],
  )?;
  Ok(())
}

pub fn upsert_tribunal(conn: &Connection, t: &Tribunal) -> Result<()> {
  conn.execute(
    "INSERT INTO tribunals (tribunal_id, name, code) VALUES (?1, ?2, ?3)
     ON CONFLICT (tribunal_id) DO UPDATE SET name = excluded.name, code = excluded.code",
    params![encode_uuid(t.tribunal_id), t.name, t.code],
  )?;
  Ok(())
}

pub fn upsert_tag(conn: &Connection, t: &Tag) -> Result<()> {
  conn.execute(
    "INSERT INTO tags (tag_id, name, category) VALUES (?1, ?2, ?3)
     ON CONFLICT (tag_id) DO UPDATE SET name = excluded.name, category = excluded.category",
    params![encode_uuid(t.tag_id), t.name, encode_enum(t.category)],
  )?;
  Ok(())
}

pub fn upsert_natinf(conn: &Connection, n: &Natinf) -> Result<()> {
  conn.execute(
    "INSERT INTO natinfs (natinf_id, num, qualification) VALUES (?1, ?2, ?3)
     ON CONFLICT (natinf_id) DO UPDATE SET
       num = excluded.num, qualification = excluded.qualification",
    params![encode_uuid(n.natinf_id), n.num, n.qualification],
  )?;
  Ok(())
}

// ─── Minute ──────────────────────────────────────────────────────────────────

pub fn insert_minute(conn: &Connection, m: &Minute) -> Result<()> {
  conn.execute(
    "INSERT INTO minutes (
       minute_id, num, status, origin, adherent_id, agent_id, tribunal_id,
       tribunal_competent_id, department, date_opening, date_last_update,
       date_complaint, name_complaint, is_closed, reporting, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    params![
      encode_uuid(m.minute_id),
      m.num,
      encode_enum(m.status),
      encode_enum(m.origin),
      encode_uuid(m.adherent_id),
      m.agent_id.map(encode_uuid),
      m.tribunal_id.map(encode_uuid),
      m.tribunal_competent_id.map(encode_uuid),
      m.department.as_deref().unwrap_or_default(),
      encode_dt(m.date_opening),
      m.date_last_update.map(encode_dt),
      m.date_complaint.map(encode_date),
      m.name_complaint,
      m.is_closed,
      m.reporting,
      encode_dt(m.created_at),
    ],
  )?;
  Ok(())
}

/// Returns the number of rows touched; zero when the minute is unknown.
pub fn update_minute(
  conn: &Connection,
  minute_id: Uuid,
  edit: &MinuteEdit,
  now: chrono::DateTime<chrono::Utc>,
) -> Result<usize> {
  let n = conn.execute(
    "UPDATE minutes SET
       agent_id = ?2, origin = ?3, tribunal_id = ?4, tribunal_competent_id = ?5,
       date_complaint = ?6, name_complaint = ?7, reporting = ?8, date_last_update = ?9
     WHERE minute_id = ?1",
    params![
      encode_uuid(minute_id),
      edit.agent_id.map(encode_uuid),
      encode_enum(edit.origin),
      edit.tribunal_id.map(encode_uuid),
      edit.tribunal_competent_id.map(encode_uuid),
      edit.date_complaint.map(encode_date),
      edit.name_complaint,
      edit.reporting,
      encode_dt(now),
    ],
  )?;
  Ok(n)
}

pub fn set_status(
  conn: &Connection,
  minute_id: Uuid,
  status: verbal_core::minute::MinuteStatus,
  now: chrono::DateTime<chrono::Utc>,
) -> Result<usize> {
  let n = conn.execute(
    "UPDATE minutes SET status = ?2, date_last_update = ?3 WHERE minute_id = ?1",
    params![encode_uuid(minute_id), encode_enum(status), encode_dt(now)],
  )?;
  Ok(n)
}

pub fn touch_minute(conn: &Connection, minute_id: Uuid, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
  conn.execute(
    "UPDATE minutes SET date_last_update = ?2 WHERE minute_id = ?1",
    params![encode_uuid(minute_id), encode_dt(now)],
  )?;
  Ok(())
}

pub fn upsert_closure(conn: &Connection, minute_id: Uuid, closure: &Closure) -> Result<()> {
  conn.execute(
    "INSERT INTO closures (minute_id, status, date_closing, observation)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (minute_id) DO UPDATE SET
       status = excluded.status, date_closing = excluded.date_closing,
       observation = excluded.observation",
    params![
      encode_uuid(minute_id),
      encode_enum(closure.status),
      encode_dt(closure.date_closing),
      closure.observation,
    ],
  )?;
  conn.execute(
    "UPDATE minutes SET is_closed = 1 WHERE minute_id = ?1",
    params![encode_uuid(minute_id)],
  )?;
  Ok(())
}

/// Insert the plot of `minute_id`, or rewrite it in place.
pub fn upsert_plot(conn: &Connection, minute_id: Uuid, p: &Plot) -> Result<()> {
  conn.execute(
    "INSERT INTO plots (
       plot_id, minute_id, town_id, parcel, parcel_clean, address, place,
       is_risk_zone, risk, latitude, longitude, location_from
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
     ON CONFLICT (minute_id) DO UPDATE SET
       town_id = excluded.town_id, parcel = excluded.parcel,
       parcel_clean = excluded.parcel_clean, address = excluded.address,
       place = excluded.place, is_risk_zone = excluded.is_risk_zone,
       risk = excluded.risk, latitude = excluded.latitude,
       longitude = excluded.longitude, location_from = excluded.location_from",
    params![
      encode_uuid(p.plot_id),
      encode_uuid(minute_id),
      encode_uuid(p.town_id),
      p.parcel,
      p.parcel_clean,
      p.address,
      p.place,
      p.is_risk_zone,
      p.risk.map(encode_enum),
      p.latitude,
      p.longitude,
      encode_enum(p.location_from),
    ],
  )?;
  Ok(())
}

pub fn replace_minute_humans(conn: &Connection, minute_id: Uuid, humans: &[Uuid]) -> Result<()> {
  let id = encode_uuid(minute_id);
  conn.execute("DELETE FROM minute_humans WHERE minute_id = ?1", params![id])?;
  let mut stmt =
    conn.prepare("INSERT INTO minute_humans (minute_id, human_id, position) VALUES (?1, ?2, ?3)")?;
  for (position, human_id) in humans.iter().enumerate() {
    stmt.execute(params![id, encode_uuid(*human_id), position as i64])?;
  }
  Ok(())
}

pub fn insert_story(conn: &Connection, s: &MinuteStory) -> Result<()> {
  conn.execute(
    "INSERT INTO minute_stories (story_id, minute_id, status, recorded_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(s.story_id),
      encode_uuid(s.minute_id),
      encode_enum(s.status),
      encode_dt(s.recorded_at),
    ],
  )?;
  Ok(())
}

// ─── Controls ────────────────────────────────────────────────────────────────

pub fn insert_control(conn: &Connection, c: &Control) -> Result<()> {
  conn.execute(
    "INSERT INTO controls (
       control_id, minute_id, updating_id, agent_id, attendants, control_type,
       state, date_postal, date_sent, date_notified, date_returned, date_contact,
       date_control, hour_control, reason, accepted, summoned, courier_delivery,
       is_fenced, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
               ?16, ?17, ?18, ?19, ?20)",
    params![
      encode_uuid(c.control_id),
      encode_uuid(c.minute_id),
      c.updating_id.map(encode_uuid),
      encode_uuid(c.agent_id),
      encode_json(&c.attendants)?,
      encode_enum(c.control_type),
      encode_enum(c.state),
      c.date_postal.map(encode_dt),
      c.date_sent.map(encode_dt),
      c.date_notified.map(encode_dt),
      c.date_returned.map(encode_dt),
      c.date_contact.map(encode_dt),
      c.date_control.map(encode_date),
      c.hour_control.map(encode_time),
      c.reason.as_ref().map(|r| r.as_str().to_owned()),
      c.accepted.map(encode_enum),
      c.summoned,
      c.courier_delivery,
      c.is_fenced,
      encode_dt(c.created_at),
    ],
  )?;
  replace_control_humans(conn, c)
}

/// Rewrite the mutable columns of a control. Ownership and type are fixed
/// at creation.
pub fn update_control(conn: &Connection, c: &Control) -> Result<usize> {
  let n = conn.execute(
    "UPDATE controls SET
       agent_id = ?2, attendants = ?3, state = ?4, date_postal = ?5,
       date_sent = ?6, date_notified = ?7, date_returned = ?8, date_contact = ?9,
       date_control = ?10, hour_control = ?11, reason = ?12, accepted = ?13,
       summoned = ?14, courier_delivery = ?15, is_fenced = ?16
     WHERE control_id = ?1",
    params![
      encode_uuid(c.control_id),
      encode_uuid(c.agent_id),
      encode_json(&c.attendants)?,
      encode_enum(c.state),
      c.date_postal.map(encode_dt),
      c.date_sent.map(encode_dt),
      c.date_notified.map(encode_dt),
      c.date_returned.map(encode_dt),
      c.date_contact.map(encode_dt),
      c.date_control.map(encode_date),
      c.hour_control.map(encode_time),
      c.reason.as_ref().map(|r| r.as_str().to_owned()),
      c.accepted.map(encode_enum),
      c.summoned,
      c.courier_delivery,
      c.is_fenced,
    ],
  )?;
  if n > 0 {
    replace_control_humans(conn, c)?;
  }
  Ok(n)
}

fn replace_control_humans(conn: &Connection, c: &Control) -> Result<()> {
  let id = encode_uuid(c.control_id);
  conn.execute("DELETE FROM control_humans WHERE control_id = ?1", params![id])?;
  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO control_humans (control_id, human_id, role, position)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (position, human_id) in c.humans_by_minute.iter().enumerate() {
    stmt.execute(params![id, encode_uuid(*human_id), "minute", position as i64])?;
  }
  for (position, human_id) in c.humans_by_control.iter().enumerate() {
    stmt.execute(params![id, encode_uuid(*human_id), "control", position as i64])?;
  }
  Ok(())
}

// ─── Updatings & decisions ───────────────────────────────────────────────────

pub fn insert_updating(conn: &Connection, u: &Updating) -> Result<()> {
  conn.execute(
    "INSERT INTO updatings (updating_id, minute_id, num, nature, description, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(u.updating_id),
      encode_uuid(u.minute_id),
      u.num,
      u.nature.map(encode_enum),
      u.description,
      encode_dt(u.created_at),
    ],
  )?;
  Ok(())
}

pub fn insert_decision(conn: &Connection, d: &Decision) -> Result<()> {
  conn.execute(
    "INSERT INTO decisions (
       decision_id, minute_id, tribunal_id, tribunal_commission,
       appeal_commission, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(d.decision_id),
      encode_uuid(d.minute_id),
      d.tribunal_id.map(encode_uuid),
      d.tribunal_commission.as_ref().map(encode_json).transpose()?,
      d.appeal_commission.as_ref().map(encode_json).transpose()?,
      encode_dt(d.created_at),
    ],
  )?;
  Ok(())
}

// ─── Folders ─────────────────────────────────────────────────────────────────

pub fn insert_folder(conn: &Connection, f: &Folder, department: &str) -> Result<()> {
  let courier = f.courier.clone().unwrap_or_default();
  conn.execute(
    "INSERT INTO folders (
       folder_id, num, department, minute_id, control_id, folder_type, nature,
       reason_obstacle, ascertainment, details, violation, date_closure,
       is_reread, folder_signed, annexes, has_courier, courier_date_offender,
       courier_date_judicial, courier_date_ait, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
               ?16, ?17, ?18, ?19, ?20)",
    params![
      encode_uuid(f.folder_id),
      f.num,
      department,
      encode_uuid(f.minute_id),
      encode_uuid(f.control_id),
      encode_enum(f.folder_type),
      f.nature.map(encode_enum),
      f.reason_obstacle.map(encode_enum),
      f.ascertainment,
      f.details,
      f.violation,
      f.date_closure.map(encode_dt),
      f.is_reread,
      f.folder_signed,
      encode_json(&f.annexes)?,
      f.courier.is_some(),
      courier.date_offender.map(encode_date),
      courier.date_judicial.map(encode_date),
      courier.date_ait.map(encode_date),
      encode_dt(f.created_at),
    ],
  )?;
  replace_folder_links(conn, f)
}

pub fn update_folder(conn: &Connection, f: &Folder) -> Result<usize> {
  let courier = f.courier.clone().unwrap_or_default();
  let n = conn.execute(
    "UPDATE folders SET
       num = ?2, nature = ?3, reason_obstacle = ?4, ascertainment = ?5,
       details = ?6, violation = ?7, date_closure = ?8, is_reread = ?9,
       folder_signed = ?10, annexes = ?11, has_courier = ?12,
       courier_date_offender = ?13, courier_date_judicial = ?14,
       courier_date_ait = ?15
     WHERE folder_id = ?1",
    params![
      encode_uuid(f.folder_id),
      f.num,
      f.nature.map(encode_enum),
      f.reason_obstacle.map(encode_enum),
      f.ascertainment,
      f.details,
      f.violation,
      f.date_closure.map(encode_dt),
      f.is_reread,
      f.folder_signed,
      encode_json(&f.annexes)?,
      f.courier.is_some(),
      courier.date_offender.map(encode_date),
      courier.date_judicial.map(encode_date),
      courier.date_ait.map(encode_date),
    ],
  )?;
  if n > 0 {
    replace_folder_links(conn, f)?;
  }
  Ok(n)
}

fn replace_folder_links(conn: &Connection, f: &Folder) -> Result<()> {
  let id = encode_uuid(f.folder_id);
  conn.execute("DELETE FROM folder_tags WHERE folder_id = ?1", params![id])?;
  conn.execute("DELETE FROM folder_natinfs WHERE folder_id = ?1", params![id])?;
  conn.execute("DELETE FROM folder_humans WHERE folder_id = ?1", params![id])?;

  let mut tags = conn.prepare("INSERT OR IGNORE INTO folder_tags (folder_id, tag_id) VALUES (?1, ?2)")?;
  for tag in f.tags_nature.iter().chain(&f.tags_town) {
    tags.execute(params![id, encode_uuid(tag.tag_id)])?;
  }

  let mut natinfs =
    conn.prepare("INSERT OR IGNORE INTO folder_natinfs (folder_id, natinf_id) VALUES (?1, ?2)")?;
  for natinf in &f.natinfs {
    natinfs.execute(params![id, encode_uuid(natinf.natinf_id)])?;
  }

  let mut humans = conn.prepare(
    "INSERT OR IGNORE INTO folder_humans (folder_id, human_id, role, position)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (position, human_id) in f.humans_by_minute.iter().enumerate() {
    humans.execute(params![id, encode_uuid(*human_id), "minute", position as i64])?;
  }
  for (position, human_id) in f.humans_by_folder.iter().enumerate() {
    humans.execute(params![id, encode_uuid(*human_id), "folder", position as i64])?;
  }
  Ok(())
}
