//! Listing, report and map queries.
//!
//! Each query starts from a fixed `SELECT` with to-one joins only and adds
//! one condition per non-empty filter. Filters over to-many relations use
//! `EXISTS` so rows never multiply.

use rusqlite::{Connection, Row, types::Value};
use uuid::Uuid;
use verbal_core::{
  control::ControlState,
  folder::FolderNature,
  minute::ClosureStatus,
  projection::{
    ControlDateRow, ControlMapPoint, ControlStateRow, MinuteAdherentRow, MinuteBrowserRow,
    MinuteMapPoint, MinuteOverallRow, MinuteStatRow, NamedRef,
  },
  query::{
    AreaFilter, BrowseFilter, CallerContext, DEFAULT_CONTROL_STATES, LocalScope, OverallFilter,
    Scope, StatsFilter,
  },
};

use crate::{
  Result,
  encode::{decode_dt, decode_enum, decode_opt_date, decode_opt_enum, decode_uuid, encode_uuid},
  read,
  sql::{Select, enum_values, placeholders, uuid_value, uuid_values},
};

const MINUTE_FROM: &str = "
FROM minutes m
JOIN plots p     ON p.minute_id = m.minute_id
JOIN towns t     ON t.town_id = p.town_id
JOIN adherents a ON a.adherent_id = m.adherent_id";

fn named(id: String, name: String) -> Result<NamedRef> { Ok(NamedRef { id: decode_uuid(&id)?, name }) }

// ─── Browser ─────────────────────────────────────────────────────────────────

struct RawBrowserRow {
  minute_id:     String,
  num:           String,
  status:        String,
  date_opening:  String,
  adherent_id:   String,
  adherent_name: String,
  town_id:       String,
  town_name:     String,
  address:       Option<String>,
  place:         Option<String>,
  parcel:        Option<String>,
}

impl RawBrowserRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      minute_id:     row.get(0)?,
      num:           row.get(1)?,
      status:        row.get(2)?,
      date_opening:  row.get(3)?,
      adherent_id:   row.get(4)?,
      adherent_name: row.get(5)?,
      town_id:       row.get(6)?,
      town_name:     row.get(7)?,
      address:       row.get(8)?,
      place:         row.get(9)?,
      parcel:        row.get(10)?,
    })
  }

  fn into_row(self) -> Result<MinuteBrowserRow> {
    Ok(MinuteBrowserRow {
      minute_id:    decode_uuid(&self.minute_id)?,
      num:          self.num,
      status:       decode_enum(&self.status)?,
      date_opening: decode_dt(&self.date_opening)?,
      adherent:     named(self.adherent_id, self.adherent_name)?,
      town:         named(self.town_id, self.town_name)?,
      address:      self.address,
      place:        self.place,
      parcel:       self.parcel,
      humans:       Vec::new(),
    })
  }
}

/// Build the browser query. Scoped callers only ever see their own minutes;
/// the caseworker, service and caseworker-locality filters are then
/// ignored.
pub(crate) fn browser_select(caller: &CallerContext, filter: &BrowseFilter) -> Select {
  let mut q = Select::new(format!(
    "SELECT m.minute_id, m.num, m.status, m.date_opening, a.adherent_id, a.name,
            t.town_id, t.name, p.address, p.place, p.parcel
     {MINUTE_FROM}"
  ));

  q.between("m.date_opening", &filter.range);
  if let Some(num) = filter.num.as_deref().filter(|n| !n.trim().is_empty()) {
    q.like("m.num", num.trim());
  }
  q.in_list("m.status", enum_values(&filter.statuses));
  q.geo(filter.plot_geo.predicate(), "p.town_id", "t.intercommunal_id");

  match caller.scope() {
    Scope::Caseworker(adherent_id) => {
      q.eq("m.adherent_id", uuid_value(adherent_id));
    }
    Scope::Unrestricted => {
      q.in_list("m.adherent_id", uuid_values(&filter.adherents));
      q.geo(filter.adherent_geo.predicate(), "a.town_id", "a.intercommunal_id");
      q.in_list("a.service_id", uuid_values(&filter.services));
    }
  }

  q.order_by("m.date_opening ASC, m.num ASC");
  q
}

pub fn minutes_browser(
  conn: &Connection,
  caller: &CallerContext,
  filter: &BrowseFilter,
) -> Result<Vec<MinuteBrowserRow>> {
  let raws = browser_select(caller, filter).query(conn, RawBrowserRow::from_row)?;
  let mut rows = raws.into_iter().map(RawBrowserRow::into_row).collect::<Result<Vec<_>>>()?;

  let ids: Vec<Uuid> = rows.iter().map(|r| r.minute_id).collect();
  let mut names = read::human_names(conn, &ids)?;
  for row in &mut rows {
    row.humans = names.remove(&row.minute_id).unwrap_or_default();
  }
  Ok(rows)
}

// ─── Reports ─────────────────────────────────────────────────────────────────

fn apply_overall(q: &mut Select, filter: &OverallFilter) {
  if let Some(range) = &filter.range {
    q.between("m.date_opening", range);
  }
  q.in_list("m.adherent_id", uuid_values(&filter.adherents));
  q.in_list("p.town_id", uuid_values(&filter.plot_towns));
  q.in_list("a.town_id", uuid_values(&filter.adherent_towns));
  q.in_list("a.intercommunal_id", uuid_values(&filter.adherent_intercommunals));
  q.in_list("a.service_id", uuid_values(&filter.services));
}

pub fn minute_overall(conn: &Connection, filter: &OverallFilter) -> Result<Vec<MinuteOverallRow>> {
  let mut q = Select::new(format!(
    "SELECT m.minute_id, m.num, m.status, m.date_opening, m.is_closed,
            a.adherent_id, a.name, s.service_id, s.name, t.town_id, t.name
     {MINUTE_FROM}"
  ));
  q.join("LEFT JOIN services s ON s.service_id = a.service_id");
  apply_overall(&mut q, filter);
  q.order_by("m.date_opening ASC, m.num ASC");

  let raws = q.query(conn, |r| {
    Ok((
      (r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?),
      (r.get::<_, String>(3)?, r.get::<_, bool>(4)?),
      (r.get::<_, String>(5)?, r.get::<_, String>(6)?),
      (r.get::<_, Option<String>>(7)?, r.get::<_, Option<String>>(8)?),
      (r.get::<_, String>(9)?, r.get::<_, String>(10)?),
    ))
  })?;

  raws
    .into_iter()
    .map(|((id, num, status), (opening, is_closed), (aid, aname), (sid, sname), (tid, tname))| {
      let service = match (sid, sname) {
        (Some(id), Some(name)) => Some(named(id, name)?),
        _ => None,
      };
      Ok(MinuteOverallRow {
        minute_id: decode_uuid(&id)?,
        num,
        status: decode_enum(&status)?,
        date_opening: decode_dt(&opening)?,
        is_closed,
        adherent: named(aid, aname)?,
        service,
        town: named(tid, tname)?,
      })
    })
    .collect()
}

struct RawStatRow {
  minute_id:    String,
  num:          String,
  status:       String,
  origin:       String,
  date_opening: String,
  town_id:      String,
  town_name:    String,
  risk:         Option<String>,
  controls:     i64,
}

pub fn minute_stats(conn: &Connection, filter: &StatsFilter) -> Result<Vec<MinuteStatRow>> {
  let mut q = Select::new(format!(
    "SELECT m.minute_id, m.num, m.status, m.origin, m.date_opening,
            t.town_id, t.name, p.risk,
            (SELECT COUNT(*) FROM controls c WHERE c.minute_id = m.minute_id)
     {MINUTE_FROM}"
  ));
  apply_overall(&mut q, &filter.overall);
  q.in_list("m.origin", enum_values(&filter.origins));
  q.in_list("p.risk", enum_values(&filter.risks));
  if !filter.folder_natures.is_empty() {
    let values = enum_values(&filter.folder_natures);
    let marks = placeholders(values.len());
    q.cond(
      format!(
        "EXISTS (SELECT 1 FROM folders f WHERE f.minute_id = m.minute_id AND f.nature IN ({marks}))"
      ),
      values,
    );
  }
  q.order_by("m.date_opening ASC, m.num ASC");

  let raws = q.query(conn, |r| {
    Ok(RawStatRow {
      minute_id:    r.get(0)?,
      num:          r.get(1)?,
      status:       r.get(2)?,
      origin:       r.get(3)?,
      date_opening: r.get(4)?,
      town_id:      r.get(5)?,
      town_name:    r.get(6)?,
      risk:         r.get(7)?,
      controls:     r.get(8)?,
    })
  })?;

  let mut natures = conn.prepare(
    "SELECT DISTINCT nature FROM folders
     WHERE minute_id = ?1 AND nature IS NOT NULL
     ORDER BY nature",
  )?;

  let mut rows = Vec::with_capacity(raws.len());
  for raw in raws {
    let folder_natures: Vec<FolderNature> = natures
      .query_map([&raw.minute_id], |r| r.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
      .iter()
      .map(|s| decode_enum(s))
      .collect::<Result<Vec<_>>>()?;
    rows.push(MinuteStatRow {
      minute_id: decode_uuid(&raw.minute_id)?,
      num: raw.num,
      status: decode_enum(&raw.status)?,
      origin: decode_enum(&raw.origin)?,
      date_opening: decode_dt(&raw.date_opening)?,
      town: named(raw.town_id, raw.town_name)?,
      risk: decode_opt_enum(raw.risk)?,
      controls: raw.controls as usize,
      folder_natures,
    });
  }
  Ok(rows)
}

pub fn minutes_by_adherents(conn: &Connection, adherents: &[Uuid]) -> Result<Vec<MinuteAdherentRow>> {
  let mut q = Select::new(
    "SELECT a.adherent_id, a.name, m.minute_id, m.num, m.status
     FROM minutes m
     JOIN adherents a ON a.adherent_id = m.adherent_id",
  );
  q.in_list("m.adherent_id", uuid_values(adherents));

  let raws = q.query(conn, |r| {
    Ok((
      r.get::<_, String>(0)?,
      r.get::<_, String>(1)?,
      r.get::<_, String>(2)?,
      r.get::<_, String>(3)?,
      r.get::<_, String>(4)?,
    ))
  })?;
  raws
    .into_iter()
    .map(|(aid, aname, mid, num, status)| {
      Ok(MinuteAdherentRow {
        adherent: named(aid, aname)?,
        minute_id: decode_uuid(&mid)?,
        num,
        status: decode_enum(&status)?,
      })
    })
    .collect()
}

// ─── Minute maps ─────────────────────────────────────────────────────────────

fn map_select(local: Option<LocalScope>, closure_states: &[ClosureStatus]) -> Select {
  let mut q = Select::new(
    "SELECT m.minute_id, m.num, m.status, p.latitude, p.longitude, t.name, p.address
     FROM minutes m
     JOIN plots p ON p.minute_id = m.minute_id
     JOIN towns t ON t.town_id = p.town_id",
  );
  q.join("LEFT JOIN closures cl ON cl.minute_id = m.minute_id");
  q.cond("p.latitude IS NOT NULL AND p.longitude IS NOT NULL", []);
  q.local(local, "p.town_id", "t.intercommunal_id");
  if closure_states.is_empty() {
    q.cond("cl.minute_id IS NULL", []);
  } else {
    q.in_list("cl.status", enum_values(closure_states));
  }
  q
}

fn map_point(r: &Row<'_>) -> rusqlite::Result<(String, String, String, f64, f64, String, Option<String>)> {
  Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?))
}

fn into_map_points(
  raws: Vec<(String, String, String, f64, f64, String, Option<String>)>,
) -> Result<Vec<MinuteMapPoint>> {
  raws
    .into_iter()
    .map(|(id, num, status, latitude, longitude, town, address)| {
      Ok(MinuteMapPoint {
        minute_id: decode_uuid(&id)?,
        num,
        status: decode_enum(&status)?,
        latitude,
        longitude,
        town,
        address,
      })
    })
    .collect()
}

fn apply_bounds(q: &mut Select, filter: &AreaFilter) {
  if let Some(b) = filter.bounds {
    q.cond(
      "p.latitude BETWEEN ? AND ? AND p.longitude BETWEEN ? AND ?",
      [Value::Real(b.min_lat), Value::Real(b.max_lat), Value::Real(b.min_lon), Value::Real(b.max_lon)],
    );
  }
}

pub fn minutes_in_area(conn: &Connection, filter: &AreaFilter) -> Result<Vec<MinuteMapPoint>> {
  let mut q = map_select(filter.local, &filter.closure_states);
  apply_bounds(&mut q, filter);
  q.in_list("m.minute_id", uuid_values(&filter.minutes));
  q.order_by("m.date_opening ASC, m.num ASC").limit(filter.max_results);
  into_map_points(q.query(conn, map_point)?)
}

pub fn minutes_with_geocode(
  conn: &Connection,
  local: Option<LocalScope>,
  closure_states: &[ClosureStatus],
) -> Result<Vec<MinuteMapPoint>> {
  let mut q = map_select(local, closure_states);
  q.group_by("m.num").order_by("m.date_opening ASC, m.num ASC");
  into_map_points(q.query(conn, map_point)?)
}

/// Minutes reported but not yet acted upon.
pub fn spotting_with_geocode(
  conn: &Connection,
  local: Option<LocalScope>,
  closure_states: &[ClosureStatus],
) -> Result<Vec<MinuteMapPoint>> {
  let mut q = map_select(local, closure_states);
  q.cond("NOT EXISTS (SELECT 1 FROM controls c WHERE c.minute_id = m.minute_id)", []);
  q.cond("NOT EXISTS (SELECT 1 FROM updatings u WHERE u.minute_id = m.minute_id)", []);
  q.cond("NOT EXISTS (SELECT 1 FROM decisions d WHERE d.minute_id = m.minute_id)", []);
  q.order_by("m.date_opening ASC, m.num ASC");
  into_map_points(q.query(conn, map_point)?)
}

/// The owning minute, directly or through the owning updating.
pub fn minute_by_control(conn: &Connection, control_id: Uuid) -> Result<Option<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT minute_id FROM (
       SELECT c.minute_id AS minute_id FROM controls c WHERE c.control_id = ?1
       UNION ALL
       SELECT u.minute_id AS minute_id
       FROM controls c JOIN updatings u ON u.updating_id = c.updating_id
       WHERE c.control_id = ?1
     )",
  )?;
  let ids = stmt
    .query_map([encode_uuid(control_id)], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  match ids.as_slice() {
    [] => Ok(None),
    [one] => Ok(Some(decode_uuid(one)?)),
    many => {
      tracing::error!(%control_id, matches = many.len(), "control attached to several minutes");
      Ok(None)
    }
  }
}

// ─── Controls ────────────────────────────────────────────────────────────────

fn states_or_default(states: &[ControlState]) -> Vec<Value> {
  if states.is_empty() {
    enum_values(&DEFAULT_CONTROL_STATES)
  } else {
    enum_values(states)
  }
}

/// Controls of the given minutes (all minutes when empty) in the given
/// states.
pub fn controls_between_dates(
  conn: &Connection,
  minutes: &[Uuid],
  states: &[ControlState],
) -> Result<Vec<ControlDateRow>> {
  let mut q = Select::new(
    "SELECT c.control_id, c.minute_id, m.num, c.state, c.date_control, c.accepted
     FROM controls c
     JOIN minutes m ON m.minute_id = c.minute_id",
  );
  q.in_list("c.minute_id", uuid_values(minutes));
  q.in_list("c.state", states_or_default(states));
  q.order_by("m.date_opening ASC, c.date_control ASC, c.created_at ASC");

  let raws = q.query(conn, |r| {
    Ok((
      r.get::<_, String>(0)?,
      r.get::<_, String>(1)?,
      r.get::<_, String>(2)?,
      r.get::<_, String>(3)?,
      r.get::<_, Option<String>>(4)?,
      r.get::<_, Option<String>>(5)?,
    ))
  })?;
  raws
    .into_iter()
    .map(|(cid, mid, num, state, date_control, accepted)| {
      Ok(ControlDateRow {
        control_id:   decode_uuid(&cid)?,
        minute_id:    decode_uuid(&mid)?,
        minute_num:   num,
        state:        decode_enum(&state)?,
        date_control: decode_opt_date(date_control)?,
        accepted:     decode_opt_enum(accepted)?,
      })
    })
    .collect()
}

pub fn control_stats(conn: &Connection, states: &[ControlState]) -> Result<Vec<ControlStateRow>> {
  let mut q = Select::new(
    "SELECT c.control_id, c.minute_id, c.control_type, c.state, c.date_control
     FROM controls c
     JOIN minutes m ON m.minute_id = c.minute_id",
  );
  q.in_list("c.state", states_or_default(states));
  q.order_by("m.date_opening ASC, c.created_at ASC");

  let raws = q.query(conn, |r| {
    Ok((
      r.get::<_, String>(0)?,
      r.get::<_, String>(1)?,
      r.get::<_, String>(2)?,
      r.get::<_, String>(3)?,
      r.get::<_, Option<String>>(4)?,
    ))
  })?;
  raws
    .into_iter()
    .map(|(cid, mid, control_type, state, date_control)| {
      Ok(ControlStateRow {
        control_id:   decode_uuid(&cid)?,
        minute_id:    decode_uuid(&mid)?,
        control_type: decode_enum(&control_type)?,
        state:        decode_enum(&state)?,
        date_control: decode_opt_date(date_control)?,
      })
    })
    .collect()
}

fn control_map_select() -> Select {
  let mut q = Select::new(
    "SELECT c.control_id, c.minute_id, m.num, p.latitude, p.longitude, c.date_control
     FROM controls c
     JOIN minutes m ON m.minute_id = c.minute_id
     JOIN plots p   ON p.minute_id = m.minute_id
     JOIN towns t   ON t.town_id = p.town_id",
  );
  q.cond("p.latitude IS NOT NULL AND p.longitude IS NOT NULL", []);
  q
}

fn into_control_points(
  raws: Vec<(String, String, String, f64, f64, Option<String>)>,
) -> Result<Vec<ControlMapPoint>> {
  raws
    .into_iter()
    .map(|(cid, mid, num, latitude, longitude, date_control)| {
      Ok(ControlMapPoint {
        control_id: decode_uuid(&cid)?,
        minute_id: decode_uuid(&mid)?,
        minute_num: num,
        latitude,
        longitude,
        date_control: decode_opt_date(date_control)?,
      })
    })
    .collect()
}

fn control_point(r: &Row<'_>) -> rusqlite::Result<(String, String, String, f64, f64, Option<String>)> {
  Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
}

pub fn controls_in_area(conn: &Connection, filter: &AreaFilter) -> Result<Vec<ControlMapPoint>> {
  let mut q = control_map_select();
  apply_bounds(&mut q, filter);
  q.local(filter.local, "p.town_id", "t.intercommunal_id");
  q.in_list("c.minute_id", uuid_values(&filter.minutes));
  q.order_by("m.date_opening ASC, c.created_at ASC").limit(filter.max_results);
  into_control_points(q.query(conn, control_point)?)
}

pub fn controls_with_geocode(conn: &Connection, local: Option<LocalScope>) -> Result<Vec<ControlMapPoint>> {
  let mut q = control_map_select();
  q.local(local, "p.town_id", "t.intercommunal_id");
  q.order_by("m.date_opening ASC, c.created_at ASC");
  into_control_points(q.query(conn, control_point)?)
}
