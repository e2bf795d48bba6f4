//! Loading the minute aggregate.
//!
//! The main row is read with its to-one joins; every to-many relation is
//! loaded by one extra query keyed on the minute id.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;
use verbal_core::{
  control::Control,
  folder::Folder,
  minute::{Minute, MinuteGraph},
  plot::Plot,
  reference::{Adherent, Agent, Human, Natinf, Tag, TagCategory},
};

use crate::{
  Result,
  encode::{
    CONTROL_COLUMNS, FOLDER_COLUMNS, MINUTE_COLUMNS, PLOT_COLUMNS, RawAdherent, RawControl,
    RawDecision, RawFolder, RawMinute, RawPlot, RawStory, RawUpdating, agent_from_row, decode_uuid,
    encode_uuid, human_from_row, into_agent, into_human, into_natinf, into_tag, natinf_from_row,
    tag_from_row,
  },
};

// ─── Minute ──────────────────────────────────────────────────────────────────

pub fn minute(conn: &Connection, minute_id: Uuid) -> Result<Option<Minute>> {
  let sql = format!(
    "SELECT {MINUTE_COLUMNS}
     FROM minutes m
     LEFT JOIN closures cl ON cl.minute_id = m.minute_id
     WHERE m.minute_id = ?1"
  );
  conn
    .query_row(&sql, params![encode_uuid(minute_id)], RawMinute::from_row)
    .optional()?
    .map(RawMinute::into_minute)
    .transpose()
}

pub fn plot(conn: &Connection, minute_id: Uuid) -> Result<Option<Plot>> {
  let sql = format!("SELECT {PLOT_COLUMNS} FROM plots p WHERE p.minute_id = ?1");
  conn
    .query_row(&sql, params![encode_uuid(minute_id)], RawPlot::from_row)
    .optional()?
    .map(RawPlot::into_plot)
    .transpose()
}

pub fn graph(conn: &Connection, minute_id: Uuid) -> Result<Option<MinuteGraph>> {
  let Some(minute) = minute(conn, minute_id)? else {
    return Ok(None);
  };
  let Some(plot) = plot(conn, minute_id)? else {
    return Err(crate::Error::Decode(format!("minute {minute_id} has no plot")));
  };

  let humans = minute_humans(conn, minute_id)?;
  let controls = controls_where(conn, "c.minute_id = ?1", &encode_uuid(minute_id))?;

  let mut updatings = {
    let sql = format!(
      "SELECT {} FROM updatings WHERE minute_id = ?1 ORDER BY created_at, rowid",
      RawUpdating::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
      .query_map(params![encode_uuid(minute_id)], RawUpdating::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawUpdating::into_updating).collect::<Result<Vec<_>>>()?
  };
  for updating in &mut updatings {
    updating.controls = controls
      .iter()
      .filter(|c| c.updating_id == Some(updating.updating_id))
      .cloned()
      .collect();
  }

  let folders = folders_where(conn, "f.minute_id = ?1", &encode_uuid(minute_id))?;

  let decisions = {
    let sql = format!(
      "SELECT {} FROM decisions WHERE minute_id = ?1 ORDER BY created_at, rowid",
      RawDecision::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
      .query_map(params![encode_uuid(minute_id)], RawDecision::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawDecision::into_decision).collect::<Result<Vec<_>>>()?
  };

  let history = {
    let mut stmt = conn.prepare(
      "SELECT story_id, minute_id, status, recorded_at
       FROM minute_stories WHERE minute_id = ?1
       ORDER BY recorded_at, rowid",
    )?;
    let raws = stmt
      .query_map(params![encode_uuid(minute_id)], RawStory::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawStory::into_story).collect::<Result<Vec<_>>>()?
  };

  Ok(Some(MinuteGraph { minute, plot, humans, controls, updatings, folders, decisions, history }))
}

fn minute_humans(conn: &Connection, minute_id: Uuid) -> Result<Vec<Human>> {
  let mut stmt = conn.prepare(
    "SELECT h.human_id, h.name, h.firstname, h.kind
     FROM minute_humans mh
     JOIN humans h ON h.human_id = mh.human_id
     WHERE mh.minute_id = ?1
     ORDER BY mh.position",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(minute_id)], human_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(into_human).collect()
}

// ─── Controls ────────────────────────────────────────────────────────────────

/// Controls matching `cond` (one `?1` parameter), oldest first, with their
/// party links.
pub fn controls_where(conn: &Connection, cond: &str, param: &str) -> Result<Vec<Control>> {
  let sql = format!(
    "SELECT {CONTROL_COLUMNS}
     FROM controls c
     LEFT JOIN folders f ON f.control_id = c.control_id
     WHERE {cond}
     ORDER BY c.created_at, c.rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![param], RawControl::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let mut controls = raws.into_iter().map(RawControl::into_control).collect::<Result<Vec<_>>>()?;

  let mut links = conn.prepare(
    "SELECT human_id, role FROM control_humans WHERE control_id = ?1 ORDER BY position",
  )?;
  for control in &mut controls {
    let rows = links
      .query_map(params![encode_uuid(control.control_id)], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for (human_id, role) in rows {
      let human_id = decode_uuid(&human_id)?;
      if role == "minute" {
        control.humans_by_minute.push(human_id);
      } else {
        control.humans_by_control.push(human_id);
      }
    }
  }
  Ok(controls)
}

pub fn control(conn: &Connection, control_id: Uuid) -> Result<Option<Control>> {
  Ok(controls_where(conn, "c.control_id = ?1", &encode_uuid(control_id))?.into_iter().next())
}

// ─── Folders ─────────────────────────────────────────────────────────────────

pub fn folders_where(conn: &Connection, cond: &str, param: &str) -> Result<Vec<Folder>> {
  let sql = format!(
    "SELECT {FOLDER_COLUMNS}
     FROM folders f
     WHERE {cond}
     ORDER BY f.created_at, f.rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![param], RawFolder::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let mut folders = raws.into_iter().map(RawFolder::into_folder).collect::<Result<Vec<_>>>()?;

  let mut tags = conn.prepare(
    "SELECT t.tag_id, t.name, t.category
     FROM folder_tags ft JOIN tags t ON t.tag_id = ft.tag_id
     WHERE ft.folder_id = ?1
     ORDER BY t.name",
  )?;
  let mut natinfs = conn.prepare(
    "SELECT n.natinf_id, n.num, n.qualification
     FROM folder_natinfs fnat JOIN natinfs n ON n.natinf_id = fnat.natinf_id
     WHERE fnat.folder_id = ?1
     ORDER BY n.num",
  )?;
  let mut humans = conn.prepare(
    "SELECT human_id, role FROM folder_humans WHERE folder_id = ?1 ORDER BY position",
  )?;

  for folder in &mut folders {
    let id = encode_uuid(folder.folder_id);

    let rows = tags.query_map(params![id], tag_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
    for tag in rows.into_iter().map(into_tag) {
      let tag = tag?;
      match tag.category {
        TagCategory::Nature => folder.tags_nature.push(tag),
        TagCategory::Town => folder.tags_town.push(tag),
      }
    }

    let rows =
      natinfs.query_map(params![id], natinf_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
    folder.natinfs = rows.into_iter().map(into_natinf).collect::<Result<Vec<_>>>()?;

    let rows = humans
      .query_map(params![id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for (human_id, role) in rows {
      let human_id = decode_uuid(&human_id)?;
      if role == "minute" {
        folder.humans_by_minute.push(human_id);
      } else {
        folder.humans_by_folder.push(human_id);
      }
    }
  }
  Ok(folders)
}

pub fn folder(conn: &Connection, folder_id: Uuid) -> Result<Option<Folder>> {
  Ok(folders_where(conn, "f.folder_id = ?1", &encode_uuid(folder_id))?.into_iter().next())
}

// ─── Reference data ──────────────────────────────────────────────────────────

pub fn adherent(conn: &Connection, adherent_id: Uuid) -> Result<Option<Adherent>> {
  let sql = format!("SELECT {} FROM adherents WHERE adherent_id = ?1", RawAdherent::COLUMNS);
  conn
    .query_row(&sql, params![encode_uuid(adherent_id)], RawAdherent::from_row)
    .optional()?
    .map(RawAdherent::into_adherent)
    .transpose()
}

pub fn agents(conn: &Connection, adherent_id: Uuid) -> Result<Vec<Agent>> {
  let mut stmt = conn.prepare(
    "SELECT agent_id, adherent_id, name, firstname, function
     FROM agents WHERE adherent_id = ?1 ORDER BY name",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(adherent_id)], agent_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(into_agent).collect()
}

/// Display names (`name firstname`) of the parties of each minute, in link
/// order.
pub fn human_names(conn: &Connection, minute_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<String>>> {
  let mut out: HashMap<Uuid, Vec<String>> = HashMap::new();
  let mut stmt = conn.prepare(
    "SELECT h.name, h.firstname
     FROM minute_humans mh JOIN humans h ON h.human_id = mh.human_id
     WHERE mh.minute_id = ?1
     ORDER BY mh.position",
  )?;
  for &minute_id in minute_ids {
    let names = stmt
      .query_map(params![encode_uuid(minute_id)], |r| {
        let name: String = r.get(0)?;
        let firstname: Option<String> = r.get(1)?;
        Ok(match firstname {
          Some(first) => format!("{name} {first}"),
          None => name,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    out.insert(minute_id, names);
  }
  Ok(out)
}

/// Resolve tag ids; unknown ids are dropped.
pub fn tags(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Tag>> {
  let mut stmt = conn.prepare("SELECT tag_id, name, category FROM tags WHERE tag_id = ?1")?;
  let mut out = Vec::with_capacity(ids.len());
  for id in ids {
    if let Some(raw) = stmt.query_row(params![encode_uuid(*id)], tag_from_row).optional()? {
      out.push(into_tag(raw)?);
    }
  }
  Ok(out)
}

/// Resolve natinf ids; unknown ids are dropped.
pub fn natinfs(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Natinf>> {
  let mut stmt =
    conn.prepare("SELECT natinf_id, num, qualification FROM natinfs WHERE natinf_id = ?1")?;
  let mut out = Vec::with_capacity(ids.len());
  for id in ids {
    if let Some(raw) = stmt.query_row(params![encode_uuid(*id)], natinf_from_row).optional()? {
      out.push(into_natinf(raw)?);
    }
  }
  Ok(out)
}
