//! [`SqliteStore`], the SQLite implementation of [`CaseStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use verbal_core::{
  classify::define_accepted_automatically,
  control::{Control, ControlState, ControlType, NewControl},
  decision::{Decision, NewDecision},
  folder::{Folder, NewFolder},
  minute::{
    Closure, ClosureStatus, Minute, MinuteEdit, MinuteGraph, MinuteStatus, MinuteStory, NewMinute,
  },
  numbering::{like_pattern, next_number, year_key},
  plot::normalize_parcel,
  projection::{
    ControlDateRow, ControlMapPoint, ControlStateRow, MinuteAdherentRow, MinuteBrowserRow,
    MinuteMapPoint, MinuteOverallRow, MinuteStatRow,
  },
  query::{AreaFilter, BrowseFilter, CallerContext, LocalScope, OverallFilter, StatsFilter},
  reference::{
    Adherent, Agent, Human, Intercommunal, Natinf, Service, Tag, TagCategory, Town, Tribunal,
  },
  store::CaseStore,
  updating::{NewUpdating, Updating},
  validate::{
    Violations, validate_caller, validate_control, validate_minute, validate_minute_edit,
  },
};

use crate::{Error, Result, browse, encode::{decode_uuid, encode_uuid}, read, schema::SCHEMA, write};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A case-records store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection handle is shared. Several stores
/// (or processes) may open the same file: writers serialize on SQLite's
/// write lock and wait up to [`BUSY_TIMEOUT`] for it.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .run(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread.
  pub(crate) async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn is_unique_violation(err: &Error) -> bool {
  matches!(
    err,
    Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn exists(conn: &Connection, sql: &str, id: Uuid) -> Result<bool> {
  Ok(conn.query_row(sql, params![encode_uuid(id)], |r| r.get(0))?)
}

fn require_minute(conn: &Connection, minute_id: Uuid) -> Result<()> {
  if exists(conn, "SELECT EXISTS (SELECT 1 FROM minutes WHERE minute_id = ?1)", minute_id)? {
    Ok(())
  } else {
    Err(verbal_core::Error::MinuteNotFound(minute_id).into())
  }
}

/// Next case number for `year`, from every stored number that mentions it.
fn next_number_in(conn: &Connection, year: u32) -> Result<String> {
  let mut stmt = conn.prepare("SELECT num FROM minutes WHERE num LIKE ?1")?;
  let nums = stmt
    .query_map(params![like_pattern(year)], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  next_number(year, nums.iter().map(String::as_str)).map_err(Error::from)
}

fn department_of(conn: &Connection, minute_id: Uuid) -> Result<String> {
  Ok(conn.query_row(
    "SELECT department FROM minutes WHERE minute_id = ?1",
    params![encode_uuid(minute_id)],
    |r| r.get(0),
  )?)
}

fn folder_num_taken(
  conn: &Connection,
  department: &str,
  num: &str,
  except: Option<Uuid>,
) -> Result<bool> {
  Ok(conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM folders
       WHERE department = ?1 AND num = ?2 AND folder_id IS NOT ?3
     )",
    params![department, num, except.map(encode_uuid)],
    |r| r.get(0),
  )?)
}

/// Derive acceptance, check the notice dates, and stamp the result.
fn prepare_control(mut control: Control) -> Result<Control> {
  define_accepted_automatically(&mut control);
  Violations::check(validate_control(&control))?;
  Ok(control)
}

fn is_eligible(graph: &MinuteGraph, control: &Control) -> bool {
  match control.updating_id {
    Some(updating_id) => graph
      .updatings
      .iter()
      .find(|u| u.updating_id == updating_id)
      .is_some_and(|u| u.controls_for_folder().iter().any(|c| c.control_id == control.control_id)),
    None => graph.is_folder_eligible(control),
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = Error;

  // ── Reference data ────────────────────────────────────────────────────────

  async fn save_intercommunal(&self, intercommunal: Intercommunal) -> Result<()> {
    self.run(move |conn| write::upsert_intercommunal(conn, &intercommunal)).await
  }

  async fn save_town(&self, town: Town) -> Result<()> {
    self.run(move |conn| write::upsert_town(conn, &town)).await
  }

  async fn save_service(&self, service: Service) -> Result<()> {
    self.run(move |conn| write::upsert_service(conn, &service)).await
  }

  async fn save_adherent(&self, adherent: Adherent) -> Result<()> {
    self.run(move |conn| write::upsert_adherent(conn, &adherent)).await
  }

  async fn save_agent(&self, agent: Agent) -> Result<()> {
    self.run(move |conn| write::upsert_agent(conn, &agent)).await
  }

  async fn save_human(&self, human: Human) -> Result<()> {
    self.run(move |conn| write::upsert_human(conn, &human)).await
  }

  async fn save_tribunal(&self, tribunal: Tribunal) -> Result<()> {
    self.run(move |conn| write::upsert_tribunal(conn, &tribunal)).await
  }

  async fn save_tag(&self, tag: Tag) -> Result<()> {
    self.run(move |conn| write::upsert_tag(conn, &tag)).await
  }

  async fn save_natinf(&self, natinf: Natinf) -> Result<()> {
    self.run(move |conn| write::upsert_natinf(conn, &natinf)).await
  }

  async fn get_adherent(&self, adherent_id: Uuid) -> Result<Option<Adherent>> {
    self.run(move |conn| read::adherent(conn, adherent_id)).await
  }

  async fn list_agents(&self, adherent_id: Uuid) -> Result<Vec<Agent>> {
    self.run(move |conn| read::agents(conn, adherent_id)).await
  }

  // ── Minutes ───────────────────────────────────────────────────────────────

  async fn create_minute(&self, caller: &CallerContext, input: NewMinute) -> Result<Minute> {
    let caller = caller.clone();
    let minute = self
      .run(move |conn| {
        let now = now();
        let plot = input.plot.clone().build();

        if !exists(
          conn,
          "SELECT EXISTS (SELECT 1 FROM adherents WHERE adherent_id = ?1)",
          input.adherent_id,
        )? {
          return Err(verbal_core::Error::AdherentNotFound(input.adherent_id).into());
        }
        let has_agent = exists(
          conn,
          "SELECT EXISTS (SELECT 1 FROM agents WHERE adherent_id = ?1)",
          caller.adherent_id,
        )?;

        let mut violations = validate_minute(&input, &plot, now.date_naive());
        violations.extend(validate_caller(&caller, has_agent, &plot));
        Violations::check(violations)?;

        let date_opening = input.effective_opening(now);

        // The write lock is taken before reading the last number, so two
        // creators can never read the same maximum.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let num = next_number_in(&tx, year_key(date_opening))?;

        let minute = Minute {
          minute_id: Uuid::new_v4(),
          num: num.clone(),
          status: MinuteStatus::Open,
          origin: input.origin,
          adherent_id: input.adherent_id,
          agent_id: input.agent_id,
          tribunal_id: input.tribunal_id,
          tribunal_competent_id: input.tribunal_competent_id,
          department: input.department.filter(|d| !d.is_empty()),
          date_opening,
          date_last_update: None,
          date_complaint: input.date_complaint,
          name_complaint: input.name_complaint,
          is_closed: false,
          closure: None,
          reporting: input.reporting,
          created_at: now,
        };

        write::insert_minute(&tx, &minute).map_err(|e| {
          if is_unique_violation(&e) {
            tracing::error!(%num, "case number collision");
            Error::Core(verbal_core::Error::NumberCollision(num.clone()))
          } else {
            e
          }
        })?;
        write::upsert_plot(&tx, minute.minute_id, &plot)?;
        write::replace_minute_humans(&tx, minute.minute_id, &input.humans)?;
        write::insert_story(&tx, &MinuteStory {
          story_id:    Uuid::new_v4(),
          minute_id:   minute.minute_id,
          status:      MinuteStatus::Open,
          recorded_at: now,
        })?;
        tx.commit()?;
        Ok(minute)
      })
      .await?;

    tracing::info!(minute_id = %minute.minute_id, num = %minute.num, "minute created");
    Ok(minute)
  }

  async fn get_minute(&self, minute_id: Uuid) -> Result<Option<MinuteGraph>> {
    self.run(move |conn| read::graph(conn, minute_id)).await
  }

  async fn update_minute(&self, minute_id: Uuid, mut edit: MinuteEdit) -> Result<Minute> {
    edit.plot.parcel_clean = edit.plot.parcel.as_deref().and_then(normalize_parcel);
    self
      .run(move |conn| {
        let now = now();
        Violations::check(validate_minute_edit(&edit, now.date_naive()))?;

        let tx = conn.transaction()?;
        if write::update_minute(&tx, minute_id, &edit, now)? == 0 {
          return Err(verbal_core::Error::MinuteNotFound(minute_id).into());
        }
        write::upsert_plot(&tx, minute_id, &edit.plot)?;
        write::replace_minute_humans(&tx, minute_id, &edit.humans)?;
        tx.commit()?;

        read::minute(conn, minute_id)?
          .ok_or_else(|| verbal_core::Error::MinuteNotFound(minute_id).into())
      })
      .await
  }

  async fn delete_minute(&self, minute_id: Uuid) -> Result<()> {
    self
      .run(move |conn| {
        let n = conn.execute(
          "DELETE FROM minutes WHERE minute_id = ?1",
          params![encode_uuid(minute_id)],
        )?;
        if n == 0 {
          return Err(verbal_core::Error::MinuteNotFound(minute_id).into());
        }
        tracing::info!(%minute_id, "minute deleted");
        Ok(())
      })
      .await
  }

  async fn close_minute(&self, minute_id: Uuid, closure: Closure) -> Result<()> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        require_minute(&tx, minute_id)?;
        write::upsert_closure(&tx, minute_id, &closure)?;
        write::touch_minute(&tx, minute_id, now())?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn record_status(
    &self,
    minute_id: Uuid,
    status: MinuteStatus,
    append: bool,
  ) -> Result<Option<MinuteStory>> {
    self
      .run(move |conn| {
        let now = now();
        let tx = conn.transaction()?;
        if write::set_status(&tx, minute_id, status, now)? == 0 {
          return Err(verbal_core::Error::MinuteNotFound(minute_id).into());
        }
        let story = if append {
          let story = MinuteStory { story_id: Uuid::new_v4(), minute_id, status, recorded_at: now };
          write::insert_story(&tx, &story)?;
          Some(story)
        } else {
          None
        };
        tx.commit()?;
        Ok(story)
      })
      .await
  }

  async fn peek_next_number(&self, year: u32) -> Result<String> {
    self.run(move |conn| next_number_in(conn, year)).await
  }

  // ── Controls ──────────────────────────────────────────────────────────────

  async fn add_control(&self, minute_id: Uuid, input: NewControl) -> Result<Control> {
    self
      .run(move |conn| {
        let now = now();
        let control = prepare_control(input.build(minute_id, None, now))?;
        let tx = conn.transaction()?;
        require_minute(&tx, minute_id)?;
        write::insert_control(&tx, &control)?;
        write::touch_minute(&tx, minute_id, now)?;
        tx.commit()?;
        Ok(control)
      })
      .await
  }

  async fn add_updating_control(&self, updating_id: Uuid, mut input: NewControl) -> Result<Control> {
    input.control_type = ControlType::Refresh;
    self
      .run(move |conn| {
        let now = now();
        let tx = conn.transaction()?;
        let minute_id: Option<String> = tx
          .query_row(
            "SELECT minute_id FROM updatings WHERE updating_id = ?1",
            params![encode_uuid(updating_id)],
            |r| r.get(0),
          )
          .optional()?;
        let Some(minute_id) = minute_id else {
          return Err(verbal_core::Error::UpdatingNotFound(updating_id).into());
        };
        let minute_id = decode_uuid(&minute_id)?;

        let control = prepare_control(input.build(minute_id, Some(updating_id), now))?;
        write::insert_control(&tx, &control)?;
        write::touch_minute(&tx, minute_id, now)?;
        tx.commit()?;
        Ok(control)
      })
      .await
  }

  async fn update_control(&self, control: Control) -> Result<Control> {
    self
      .run(move |conn| {
        let control = prepare_control(control)?;
        let control_id = control.control_id;
        let tx = conn.transaction()?;
        if write::update_control(&tx, &control)? == 0 {
          return Err(verbal_core::Error::ControlNotFound(control_id).into());
        }
        write::touch_minute(&tx, control.minute_id, now())?;
        tx.commit()?;
        read::control(conn, control_id)?
          .ok_or_else(|| verbal_core::Error::ControlNotFound(control_id).into())
      })
      .await
  }

  async fn delete_control(&self, control_id: Uuid) -> Result<()> {
    self
      .run(move |conn| {
        let n = conn.execute(
          "DELETE FROM controls WHERE control_id = ?1",
          params![encode_uuid(control_id)],
        )?;
        if n == 0 {
          return Err(verbal_core::Error::ControlNotFound(control_id).into());
        }
        Ok(())
      })
      .await
  }

  // ── Updatings ─────────────────────────────────────────────────────────────

  async fn create_updating(&self, minute_id: Uuid, input: NewUpdating) -> Result<Updating> {
    self
      .run(move |conn| {
        let now = now();
        let updating = Updating {
          updating_id: Uuid::new_v4(),
          minute_id,
          num: input.num,
          nature: input.nature,
          description: input.description,
          controls: Vec::new(),
          created_at: now,
        };
        let tx = conn.transaction()?;
        require_minute(&tx, minute_id)?;
        write::insert_updating(&tx, &updating)?;
        write::touch_minute(&tx, minute_id, now)?;
        tx.commit()?;
        Ok(updating)
      })
      .await
  }

  async fn delete_updating(&self, updating_id: Uuid) -> Result<()> {
    self
      .run(move |conn| {
        let n = conn.execute(
          "DELETE FROM updatings WHERE updating_id = ?1",
          params![encode_uuid(updating_id)],
        )?;
        if n == 0 {
          return Err(verbal_core::Error::UpdatingNotFound(updating_id).into());
        }
        Ok(())
      })
      .await
  }

  // ── Folders ───────────────────────────────────────────────────────────────

  async fn create_folder(&self, control_id: Uuid, input: NewFolder) -> Result<Folder> {
    self
      .run(move |conn| {
        let now = now();
        let tx = conn.transaction()?;

        let control = read::control(&tx, control_id)?
          .ok_or(verbal_core::Error::ControlNotFound(control_id))?;
        if control.folder_id.is_some() {
          return Err(verbal_core::Error::AlreadyLinked(control_id).into());
        }
        let graph = read::graph(&tx, control.minute_id)?
          .ok_or(verbal_core::Error::MinuteNotFound(control.minute_id))?;
        if !is_eligible(&graph, &control) {
          return Err(verbal_core::Error::NotEligible(control_id).into());
        }

        let department = department_of(&tx, control.minute_id)?;
        if folder_num_taken(&tx, &department, &input.num, None)? {
          return Err(verbal_core::Error::DuplicateFolderNumber(input.num).into());
        }

        let (tags_nature, tags_town): (Vec<Tag>, Vec<Tag>) = read::tags(&tx, &input.tags)?
          .into_iter()
          .partition(|t| t.category == TagCategory::Nature);

        let folder = Folder {
          folder_id: Uuid::new_v4(),
          num: input.num,
          minute_id: control.minute_id,
          control_id,
          folder_type: control.control_type,
          nature: input.nature,
          reason_obstacle: input.reason_obstacle,
          ascertainment: input.ascertainment,
          details: input.details,
          violation: input.violation,
          date_closure: None,
          is_reread: false,
          folder_signed: None,
          annexes: Vec::new(),
          tags_nature,
          tags_town,
          natinfs: read::natinfs(&tx, &input.natinfs)?,
          humans_by_minute: input.humans_by_minute,
          humans_by_folder: input.humans_by_folder,
          courier: None,
          created_at: now,
        };
        write::insert_folder(&tx, &folder, &department)?;
        write::touch_minute(&tx, folder.minute_id, now)?;
        tx.commit()?;

        tracing::info!(folder_id = %folder.folder_id, %control_id, num = %folder.num, "folder created");
        read::folder(conn, folder.folder_id)?
          .ok_or_else(|| verbal_core::Error::FolderNotFound(folder.folder_id).into())
      })
      .await
  }

  async fn update_folder(&self, folder: Folder) -> Result<Folder> {
    self
      .run(move |conn| {
        let folder_id = folder.folder_id;
        let tx = conn.transaction()?;
        let department = department_of(&tx, folder.minute_id)?;
        if folder_num_taken(&tx, &department, &folder.num, Some(folder_id))? {
          return Err(verbal_core::Error::DuplicateFolderNumber(folder.num).into());
        }
        if write::update_folder(&tx, &folder)? == 0 {
          return Err(verbal_core::Error::FolderNotFound(folder_id).into());
        }
        write::touch_minute(&tx, folder.minute_id, now())?;
        tx.commit()?;
        read::folder(conn, folder_id)?
          .ok_or_else(|| verbal_core::Error::FolderNotFound(folder_id).into())
      })
      .await
  }

  async fn delete_folder(&self, folder_id: Uuid) -> Result<()> {
    self
      .run(move |conn| {
        let n = conn.execute(
          "DELETE FROM folders WHERE folder_id = ?1",
          params![encode_uuid(folder_id)],
        )?;
        if n == 0 {
          return Err(verbal_core::Error::FolderNotFound(folder_id).into());
        }
        Ok(())
      })
      .await
  }

  // ── Decisions ─────────────────────────────────────────────────────────────

  async fn record_decision(&self, minute_id: Uuid, input: NewDecision) -> Result<Decision> {
    self
      .run(move |conn| {
        let now = now();
        let decision = Decision {
          decision_id: Uuid::new_v4(),
          minute_id,
          tribunal_id: input.tribunal_id,
          tribunal_commission: input.tribunal_commission,
          appeal_commission: input.appeal_commission,
          created_at: now,
        };
        let tx = conn.transaction()?;
        require_minute(&tx, minute_id)?;
        write::insert_decision(&tx, &decision)?;
        write::touch_minute(&tx, minute_id, now)?;
        tx.commit()?;
        Ok(decision)
      })
      .await
  }

  // ── Minute queries ────────────────────────────────────────────────────────

  async fn find_minutes_browser(
    &self,
    caller: &CallerContext,
    filter: &BrowseFilter,
  ) -> Result<Vec<MinuteBrowserRow>> {
    let caller = caller.clone();
    let filter = filter.clone();
    self.run(move |conn| browse::minutes_browser(conn, &caller, &filter)).await
  }

  async fn stat_minute_overall(&self, filter: &OverallFilter) -> Result<Vec<MinuteOverallRow>> {
    let filter = filter.clone();
    self.run(move |conn| browse::minute_overall(conn, &filter)).await
  }

  async fn stat_minutes(&self, filter: &StatsFilter) -> Result<Vec<MinuteStatRow>> {
    let filter = filter.clone();
    self.run(move |conn| browse::minute_stats(conn, &filter)).await
  }

  async fn stat_minutes_by_adherents(&self, adherents: &[Uuid]) -> Result<Vec<MinuteAdherentRow>> {
    let adherents = adherents.to_vec();
    self.run(move |conn| browse::minutes_by_adherents(conn, &adherents)).await
  }

  async fn find_minutes_in_area(&self, filter: &AreaFilter) -> Result<Vec<MinuteMapPoint>> {
    let filter = filter.clone();
    self.run(move |conn| browse::minutes_in_area(conn, &filter)).await
  }

  async fn find_minutes_with_geocode(
    &self,
    local: Option<LocalScope>,
    closure_states: &[ClosureStatus],
  ) -> Result<Vec<MinuteMapPoint>> {
    let closure_states = closure_states.to_vec();
    self.run(move |conn| browse::minutes_with_geocode(conn, local, &closure_states)).await
  }

  async fn find_spotting_with_geocode(
    &self,
    local: Option<LocalScope>,
    closure_states: &[ClosureStatus],
  ) -> Result<Vec<MinuteMapPoint>> {
    let closure_states = closure_states.to_vec();
    self.run(move |conn| browse::spotting_with_geocode(conn, local, &closure_states)).await
  }

  async fn find_minute_by_control(&self, control_id: Uuid) -> Result<Option<Uuid>> {
    self.run(move |conn| browse::minute_by_control(conn, control_id)).await
  }

  // ── Control queries ───────────────────────────────────────────────────────

  async fn find_controls_between_dates(
    &self,
    minutes: &[Uuid],
    states: &[ControlState],
  ) -> Result<Vec<ControlDateRow>> {
    let minutes = minutes.to_vec();
    let states = states.to_vec();
    self.run(move |conn| browse::controls_between_dates(conn, &minutes, &states)).await
  }

  async fn stat_controls(&self, states: &[ControlState]) -> Result<Vec<ControlStateRow>> {
    let states = states.to_vec();
    self.run(move |conn| browse::control_stats(conn, &states)).await
  }

  async fn find_controls_in_area(&self, filter: &AreaFilter) -> Result<Vec<ControlMapPoint>> {
    let filter = filter.clone();
    self.run(move |conn| browse::controls_in_area(conn, &filter)).await
  }

  async fn find_controls_with_geocode(&self, local: Option<LocalScope>) -> Result<Vec<ControlMapPoint>> {
    self.run(move |conn| browse::controls_with_geocode(conn, local)).await
  }

  async fn find_controls_by_minute(&self, minute_id: Uuid) -> Result<Vec<Control>> {
    self
      .run(move |conn| read::controls_where(conn, "c.minute_id = ?1", &encode_uuid(minute_id)))
      .await
  }
}
