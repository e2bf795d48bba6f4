//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;
use verbal_core::{
  control::{ControlState, ControlType, NewControl},
  decision::NewDecision,
  folder::{Courier, NewFolder},
  lifecycle::{HistoryPolicy, open_minute, refresh_status},
  minute::{Closure, ClosureStatus, Minute, MinuteEdit, MinuteStatus, NewMinute},
  notify::{NoopNotifier, NotifyError, StatusNotifier},
  plot::NewPlot,
  query::{AreaFilter, BoundingBox, BrowseFilter, CallerContext, DateRange, GeoFilter, LocalScope},
  reference::{Adherent, Agent, Human, Intercommunal, Natinf, Tag, TagCategory, Town},
  store::CaseStore,
  updating::NewUpdating,
  validate::ViolationCode,
};

use crate::{Error, SqliteStore};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct World {
  store:    SqliteStore,
  adherent: Adherent,
  caller:   CallerContext,
  human:    Human,
  interco:  [Intercommunal; 2],
  /// `towns[0]` in `interco[0]`, `towns[1]` in `interco[1]`, `towns[2]` in
  /// none, `towns[3]` in `interco[0]`.
  towns:    [Town; 4],
}

fn interco(name: &str) -> Intercommunal {
  Intercommunal {
    intercommunal_id: Uuid::new_v4(),
    name:             name.into(),
    code:             name.to_uppercase(),
  }
}

fn town(name: &str, code: &str, interco: Option<&Intercommunal>) -> Town {
  Town {
    town_id:          Uuid::new_v4(),
    name:             name.into(),
    code:             code.into(),
    intercommunal_id: interco.map(|i| i.intercommunal_id),
  }
}

async fn seed_adherent(store: &SqliteStore, name: &str) -> Adherent {
  let adherent = Adherent::new(name);
  store.save_adherent(adherent.clone()).await.unwrap();
  store
    .save_agent(Agent {
      agent_id:    Uuid::new_v4(),
      adherent_id: adherent.adherent_id,
      name:        format!("agent of {name}"),
      firstname:   None,
      function:    Some("inspector".into()),
    })
    .await
    .unwrap();
  adherent
}

async fn world_on(store: SqliteStore) -> World {
  let interco = [interco("north"), interco("south")];
  let towns = [
    town("Baillif", "97104", Some(&interco[0])),
    town("Goyave", "97114", Some(&interco[1])),
    town("Deshaies", "97111", None),
    town("Vieux-Habitants", "97134", Some(&interco[0])),
  ];
  for i in &interco {
    store.save_intercommunal(i.clone()).await.unwrap();
  }
  for t in &towns {
    store.save_town(t.clone()).await.unwrap();
  }

  let adherent = seed_adherent(&store, "Martin").await;
  let human = Human::person("Durand", Some("Paul"));
  store.save_human(human.clone()).await.unwrap();

  World {
    caller: CallerContext::admin(adherent.adherent_id),
    store,
    adherent,
    human,
    interco,
    towns,
  }
}

async fn world() -> World {
  world_on(SqliteStore::open_in_memory().await.expect("in-memory store")).await
}

fn geocoded_plot(town: &Town) -> NewPlot {
  NewPlot {
    address: Some("12 rue des Lilas".into()),
    latitude: Some(16.05),
    longitude: Some(-61.70),
    ..NewPlot::in_town(town.town_id)
  }
}

impl World {
  fn new_minute(&self, town: &Town) -> NewMinute {
    NewMinute::new(self.adherent.adherent_id, geocoded_plot(town), vec![self.human.human_id])
  }

  async fn minute_in(&self, town: &Town) -> Minute {
    self.store.create_minute(&self.caller, self.new_minute(town)).await.unwrap()
  }

  async fn folder_control(&self, minute_id: Uuid) -> verbal_core::control::Control {
    let agent = self.store.list_agents(self.adherent.adherent_id).await.unwrap()[0].agent_id;
    self
      .store
      .add_control(minute_id, NewControl::new(agent, ControlType::Folder, ControlState::Inside))
      .await
      .unwrap()
  }

  fn wide_browse(&self) -> BrowseFilter {
    BrowseFilter::for_range(DateRange::days(
      NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
      NaiveDate::from_ymd_opt(2100, 12, 31).unwrap(),
    ))
  }
}

fn violation_of(err: Error) -> verbal_core::validate::Violations {
  match err {
    Error::Core(verbal_core::Error::Validation(v)) => v,
    other => panic!("expected validation error, got {other:?}"),
  }
}

struct FailingNotifier;

impl StatusNotifier for FailingNotifier {
  async fn status_changed<'a>(
    &'a self,
    _minute: &'a Minute,
    _status: MinuteStatus,
  ) -> Result<(), NotifyError> {
    Err(NotifyError::Transport("connection refused".into()))
  }
}

// ─── Minutes ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_minute() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;

  assert_eq!(minute.status, MinuteStatus::Open);
  assert!(!minute.is_closed);
  assert!(minute.num.ends_with("-001"));

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.minute, minute);
  assert_eq!(graph.plot.town_id, w.towns[0].town_id);
  assert_eq!(graph.plot.latitude, Some(16.05));
  assert_eq!(graph.humans, vec![w.human.clone()]);
  assert_eq!(graph.history.len(), 1);
  assert_eq!(graph.history[0].status, MinuteStatus::Open);
}

#[tokio::test]
async fn get_minute_missing_returns_none() {
  let w = world().await;
  assert!(w.store.get_minute(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_minute_reports_every_violation() {
  let w = world().await;
  let input = NewMinute::new(w.adherent.adherent_id, NewPlot::in_town(w.towns[0].town_id), vec![]);
  let v = violation_of(w.store.create_minute(&w.caller, input).await.unwrap_err());

  assert!(v.has("humans", ViolationCode::HumansRequired));
  assert!(v.has("plot.address", ViolationCode::AddressOrParcelNeeded));
  assert!(v.has("plot.latitude", ViolationCode::LocationNeeded));
}

#[tokio::test]
async fn create_minute_requires_an_agent_and_the_callers_town() {
  let w = world().await;
  let lonely = Adherent::new("Lonely");
  w.store.save_adherent(lonely.clone()).await.unwrap();

  let mut caller = CallerContext::caseworker(lonely.adherent_id);
  caller.town_id = Some(w.towns[1].town_id);
  let input = NewMinute::new(lonely.adherent_id, geocoded_plot(&w.towns[0]), vec![w.human.human_id]);

  let v = violation_of(w.store.create_minute(&caller, input).await.unwrap_err());
  assert!(v.has("agent", ViolationCode::AgentRequired));
  assert!(v.has("plot.town", ViolationCode::TownNotAuthorized));
}

#[tokio::test]
async fn create_minute_unknown_adherent() {
  let w = world().await;
  let mut input = w.new_minute(&w.towns[0]);
  input.adherent_id = Uuid::new_v4();
  let err = w.store.create_minute(&w.caller, input).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::AdherentNotFound(_))));
}

#[tokio::test]
async fn update_minute_rewrites_plot_and_parties() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let other = Human::person("Bernard", None);
  w.store.save_human(other.clone()).await.unwrap();

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  let mut edit = MinuteEdit::from_graph(&graph);
  edit.plot.parcel = Some("a 123, b 45".into());
  edit.humans = vec![other.human_id];
  edit.name_complaint = Some("Neighbour".into());

  let updated = w.store.update_minute(minute.minute_id, edit).await.unwrap();
  assert_eq!(updated.name_complaint.as_deref(), Some("Neighbour"));
  assert!(updated.date_last_update.is_some());

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.plot.parcel_clean.as_deref(), Some("A123, B45"));
  assert_eq!(graph.humans, vec![other]);
}

// ─── Numbering ───────────────────────────────────────────────────────────────

async fn set_num(store: &SqliteStore, minute_id: Uuid, num: &'static str) {
  store
    .run(move |conn| {
      conn.execute(
        "UPDATE minutes SET num = ?1 WHERE minute_id = ?2",
        rusqlite::params![num, crate::encode::encode_uuid(minute_id)],
      )?;
      Ok(())
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn numbers_follow_the_complaint_year() {
  let w = world().await;
  let mut numbered = Vec::new();
  for (y, m, d) in [(2012, 3, 1), (2012, 4, 1), (2013, 1, 10)] {
    let mut input = w.new_minute(&w.towns[0]);
    input.date_complaint = NaiveDate::from_ymd_opt(y, m, d);
    numbered.push(w.store.create_minute(&w.caller, input).await.unwrap());
  }
  assert_eq!(numbered[0].num, "12-001");
  assert_eq!(numbered[1].num, "12-002");
  assert_eq!(numbered[2].num, "13-001");
  assert_eq!(numbered[0].date_opening, Utc.with_ymd_and_hms(2012, 3, 1, 0, 0, 0).unwrap());

  set_num(&w.store, numbered[0].minute_id, "12-045").await;
  set_num(&w.store, numbered[1].minute_id, "12-099").await;
  set_num(&w.store, numbered[2].minute_id, "13-003").await;

  assert_eq!(w.store.peek_next_number(12).await.unwrap(), "12-100");
  assert_eq!(w.store.peek_next_number(13).await.unwrap(), "13-004");
  assert_eq!(w.store.peek_next_number(14).await.unwrap(), "14-001");

  let mut input = w.new_minute(&w.towns[0]);
  input.date_complaint = NaiveDate::from_ymd_opt(2012, 9, 9);
  let next = w.store.create_minute(&w.caller, input).await.unwrap();
  assert_eq!(next.num, "12-100");
}

#[tokio::test]
async fn exhausted_year_refuses_new_minutes() {
  let w = world().await;
  let mut input = w.new_minute(&w.towns[0]);
  input.date_complaint = NaiveDate::from_ymd_opt(2012, 3, 1);
  let last = w.store.create_minute(&w.caller, input.clone()).await.unwrap();
  set_num(&w.store, last.minute_id, "12-4294967295").await;

  let err = w.store.peek_next_number(12).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::NumbersExhausted(12))));

  let err = w.store.create_minute(&w.caller, input).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::NumbersExhausted(12))));
  assert_eq!(w.store.peek_next_number(13).await.unwrap(), "13-001");
}

#[tokio::test]
async fn concurrent_creators_never_share_a_number() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("cases.db");
  let first = SqliteStore::open(&path).await.unwrap();
  let second = SqliteStore::open(&path).await.unwrap();
  let w = world_on(first.clone()).await;

  let mut tasks = Vec::new();
  for i in 0..20 {
    let store = if i % 2 == 0 { first.clone() } else { second.clone() };
    let caller = w.caller.clone();
    let input = w.new_minute(&w.towns[0]);
    tasks.push(tokio::spawn(async move { store.create_minute(&caller, input).await }));
  }

  let mut nums = HashSet::new();
  for task in tasks {
    let minute = task.await.unwrap().unwrap();
    assert!(nums.insert(minute.num.clone()), "duplicate number {}", minute.num);
  }
  assert_eq!(nums.len(), 20);

  let year = Utc::now().format("%y").to_string();
  for seq in 1..=20 {
    assert!(nums.contains(&format!("{year}-{seq:03}")));
  }
}

// ─── Cascades ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_minute_removes_what_it_owns() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();

  w.store.delete_minute(minute.minute_id).await.unwrap();

  assert!(w.store.get_minute(minute.minute_id).await.unwrap().is_none());
  assert!(w.store.find_minute_by_control(control.control_id).await.unwrap().is_none());
  assert!(w.store.find_controls_by_minute(minute.minute_id).await.unwrap().is_empty());

  let err = w.store.delete_minute(minute.minute_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::MinuteNotFound(_))));
}

#[tokio::test]
async fn deleting_a_control_removes_its_folder() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();

  w.store.delete_control(control.control_id).await.unwrap();

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert!(graph.controls.is_empty());
  assert!(graph.folders.is_empty());
}

#[tokio::test]
async fn deleting_a_folder_keeps_its_control() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  let folder =
    w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();

  w.store.delete_folder(folder.folder_id).await.unwrap();

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert!(graph.folders.is_empty());
  assert_eq!(graph.controls.len(), 1);
  assert_eq!(graph.controls[0].folder_id, None);
}

#[tokio::test]
async fn deleting_an_updating_removes_its_controls() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let direct = w.folder_control(minute.minute_id).await;
  let updating = w
    .store
    .create_updating(minute.minute_id, NewUpdating { num: "U-1".into(), ..Default::default() })
    .await
    .unwrap();
  let owned = w
    .store
    .add_updating_control(
      updating.updating_id,
      NewControl::new(direct.agent_id, ControlType::Folder, ControlState::Outside),
    )
    .await
    .unwrap();
  assert_eq!(owned.control_type, ControlType::Refresh);
  assert_eq!(owned.updating_id, Some(updating.updating_id));

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.controls.len(), 2);
  assert_eq!(graph.updatings[0].controls.len(), 1);

  w.store.delete_updating(updating.updating_id).await.unwrap();

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert!(graph.updatings.is_empty());
  assert_eq!(graph.controls.len(), 1);
  assert_eq!(graph.controls[0].control_id, direct.control_id);
}

// ─── Controls ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_control_derives_acceptance() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  assert_eq!(control.accepted, None);

  let mut outside = NewControl::new(control.agent_id, ControlType::Folder, ControlState::Outside);
  outside.accepted = Some(verbal_core::control::Acceptance::Nok);
  let outside = w.store.add_control(minute.minute_id, outside).await.unwrap();
  assert_eq!(outside.accepted, Some(verbal_core::control::Acceptance::Ok));
}

#[tokio::test]
async fn update_control_rejects_out_of_order_notice_dates() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let mut control = w.folder_control(minute.minute_id).await;
  control.date_notified = Some(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap());
  control.date_returned = Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());

  let v = violation_of(w.store.update_control(control).await.unwrap_err());
  assert!(v.has("date_returned", ViolationCode::ReturnedNotAfterNotified));
  assert!(v.has("date_notified", ViolationCode::NotifiedNotBeforeReturned));
}

#[tokio::test]
async fn update_control_round_trips() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let mut control = w.folder_control(minute.minute_id).await;
  control.date_control = NaiveDate::from_ymd_opt(2024, 5, 6);
  control.hour_control = NaiveTime::from_hms_opt(14, 30, 0);
  control.courier_delivery = Some("registered".into());
  control.humans_by_control = vec![w.human.human_id];

  let stored = w.store.update_control(control.clone()).await.unwrap();
  assert_eq!(stored, control);
}

#[tokio::test]
async fn find_minute_by_control_follows_updatings() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let direct = w.folder_control(minute.minute_id).await;
  let updating = w
    .store
    .create_updating(minute.minute_id, NewUpdating { num: "U-1".into(), ..Default::default() })
    .await
    .unwrap();
  let owned = w
    .store
    .add_updating_control(
      updating.updating_id,
      NewControl::new(direct.agent_id, ControlType::Refresh, ControlState::Inside),
    )
    .await
    .unwrap();

  let by_control = |id| w.store.find_minute_by_control(id);
  assert_eq!(by_control(direct.control_id).await.unwrap(), Some(minute.minute_id));
  assert_eq!(by_control(owned.control_id).await.unwrap(), Some(minute.minute_id));
  assert_eq!(by_control(Uuid::new_v4()).await.unwrap(), None);
}

// ─── Folders ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_folder_resolves_tags_and_natinfs() {
  let w = world().await;
  let pool = Tag { tag_id: Uuid::new_v4(), name: "pool".into(), category: TagCategory::Nature };
  let zone = Tag { tag_id: Uuid::new_v4(), name: "zone N".into(), category: TagCategory::Town };
  let natinf =
    Natinf { natinf_id: Uuid::new_v4(), num: 7_140, qualification: "no permit".into() };
  w.store.save_tag(pool.clone()).await.unwrap();
  w.store.save_tag(zone.clone()).await.unwrap();
  w.store.save_natinf(natinf.clone()).await.unwrap();

  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  let input = NewFolder {
    tags: vec![pool.tag_id, zone.tag_id],
    natinfs: vec![natinf.natinf_id],
    humans_by_folder: vec![w.human.human_id],
    ..NewFolder::numbered("F-1")
  };
  let folder = w.store.create_folder(control.control_id, input).await.unwrap();

  assert_eq!(folder.folder_type, ControlType::Folder);
  assert_eq!(folder.tags_nature, vec![pool]);
  assert_eq!(folder.tags_town, vec![zone]);
  assert_eq!(folder.natinfs, vec![natinf]);
  assert_eq!(folder.humans_by_folder, vec![w.human.human_id]);

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.controls[0].folder_id, Some(folder.folder_id));
}

#[tokio::test]
async fn create_folder_rejects_linked_and_ineligible_controls() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let control = w.folder_control(minute.minute_id).await;
  w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();

  let err = w.store.create_folder(control.control_id, NewFolder::numbered("F-2")).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::AlreadyLinked(_))));

  let mut fenced = NewControl::new(control.agent_id, ControlType::Folder, ControlState::Inside);
  fenced.is_fenced = true;
  let fenced = w.store.add_control(minute.minute_id, fenced).await.unwrap();
  let err = w.store.create_folder(fenced.control_id, NewFolder::numbered("F-3")).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::NotEligible(_))));

  let refresh = NewControl::new(control.agent_id, ControlType::Refresh, ControlState::Inside);
  let refresh = w.store.add_control(minute.minute_id, refresh).await.unwrap();
  let err = w.store.create_folder(refresh.control_id, NewFolder::numbered("F-4")).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::NotEligible(_))));

  let err = w.store.create_folder(Uuid::new_v4(), NewFolder::numbered("F-5")).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::ControlNotFound(_))));
}

#[tokio::test]
async fn fenced_but_unanswered_visit_is_eligible() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let agent = w.store.list_agents(w.adherent.adherent_id).await.unwrap()[0].agent_id;

  let mut input = NewControl::new(agent, ControlType::Folder, ControlState::Inside);
  input.is_fenced = true;
  input.reason = Some(verbal_core::control::ControlReason::UnknownAddress);
  input.date_control = NaiveDate::from_ymd_opt(2024, 2, 2);
  input.hour_control = NaiveTime::from_hms_opt(10, 0, 0);
  let control = w.store.add_control(minute.minute_id, input).await.unwrap();
  assert_eq!(control.accepted, Some(verbal_core::control::Acceptance::None));

  w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();
}

#[tokio::test]
async fn folder_numbers_are_unique_per_department() {
  let w = world().await;
  let in_dept = |dept: &str| {
    let mut input = w.new_minute(&w.towns[0]);
    input.department = Some(dept.into());
    input
  };
  let a = w.store.create_minute(&w.caller, in_dept("971")).await.unwrap();
  let b = w.store.create_minute(&w.caller, in_dept("971")).await.unwrap();
  let c = w.store.create_minute(&w.caller, in_dept("972")).await.unwrap();

  let ca = w.folder_control(a.minute_id).await;
  let cb = w.folder_control(b.minute_id).await;
  let cc = w.folder_control(c.minute_id).await;

  w.store.create_folder(ca.control_id, NewFolder::numbered("PV-1")).await.unwrap();
  let err = w.store.create_folder(cb.control_id, NewFolder::numbered("PV-1")).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::DuplicateFolderNumber(_))));
  w.store.create_folder(cc.control_id, NewFolder::numbered("PV-1")).await.unwrap();

  let mut second = w.store.create_folder(cb.control_id, NewFolder::numbered("PV-2")).await.unwrap();
  second.num = "PV-1".into();
  let err = w.store.update_folder(second).await.unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::DuplicateFolderNumber(_))));
}

// ─── Status lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_status_climbs_the_workflow() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let policy = HistoryPolicy::SuppressRepeats;
  let refresh = || refresh_status(&w.store, &NoopNotifier, policy, minute.minute_id);

  let control = w.folder_control(minute.minute_id).await;
  let outcome = refresh().await.unwrap();
  assert_eq!((outcome.previous, outcome.status), (MinuteStatus::Open, MinuteStatus::Control));
  assert!(outcome.changed);

  let mut folder =
    w.store.create_folder(control.control_id, NewFolder::numbered("F-1")).await.unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Folder);

  folder.courier = Some(Courier::default());
  let mut folder = w.store.update_folder(folder).await.unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Courier);

  folder.courier = Some(Courier { date_ait: NaiveDate::from_ymd_opt(2024, 6, 1), ..Courier::default() });
  w.store.update_folder(folder).await.unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Ait);

  w.store
    .create_updating(minute.minute_id, NewUpdating { num: "U-1".into(), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Updating);

  w.store.record_decision(minute.minute_id, NewDecision::default()).await.unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Decision);

  w.store
    .close_minute(minute.minute_id, Closure {
      status:       ClosureStatus::Regularized,
      date_closing: Utc::now(),
      observation:  None,
    })
    .await
    .unwrap();
  assert_eq!(refresh().await.unwrap().status, MinuteStatus::Closure);

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert!(graph.minute.is_closed);
  assert_eq!(graph.minute.status, MinuteStatus::Closure);
  let statuses: Vec<_> = graph.history.iter().map(|s| s.status).collect();
  assert_eq!(statuses, vec![
    MinuteStatus::Open,
    MinuteStatus::Control,
    MinuteStatus::Folder,
    MinuteStatus::Courier,
    MinuteStatus::Ait,
    MinuteStatus::Updating,
    MinuteStatus::Decision,
    MinuteStatus::Closure,
  ]);
}

#[tokio::test]
async fn history_policy_controls_repeated_entries() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  w.folder_control(minute.minute_id).await;

  for _ in 0..2 {
    refresh_status(&w.store, &NoopNotifier, HistoryPolicy::SuppressRepeats, minute.minute_id)
      .await
      .unwrap();
  }
  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.history.len(), 2);

  let outcome =
    refresh_status(&w.store, &NoopNotifier, HistoryPolicy::AppendAlways, minute.minute_id)
      .await
      .unwrap();
  assert!(!outcome.changed);
  assert!(outcome.story.is_some());
  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.history.len(), 3);
}

#[tokio::test]
async fn failing_notifier_does_not_roll_back() {
  let w = world().await;
  let (minute, warning) =
    open_minute(&w.store, &FailingNotifier, &w.caller, w.new_minute(&w.towns[0])).await.unwrap();
  assert!(warning.is_some());

  w.folder_control(minute.minute_id).await;
  let outcome =
    refresh_status(&w.store, &FailingNotifier, HistoryPolicy::default(), minute.minute_id)
      .await
      .unwrap();
  assert_eq!(outcome.status, MinuteStatus::Control);
  assert!(outcome.warning.unwrap().contains("connection refused"));

  let graph = w.store.get_minute(minute.minute_id).await.unwrap().unwrap();
  assert_eq!(graph.minute.status, MinuteStatus::Control);
}

#[tokio::test]
async fn refresh_status_missing_minute() {
  let w = world().await;
  let err = refresh_status(&w.store, &NoopNotifier, HistoryPolicy::default(), Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(verbal_core::Error::MinuteNotFound(_))));
}

// ─── Browsing ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plot_geography_combines_towns_and_intercommunals() {
  let w = &world().await;
  let in_north = w.minute_in(&w.towns[0]).await;
  let in_south = w.minute_in(&w.towns[1]).await;
  let unattached = w.minute_in(&w.towns[2]).await;
  let north_too = w.minute_in(&w.towns[3]).await;

  let browse = |geo: GeoFilter| {
    let mut filter = w.wide_browse();
    filter.plot_geo = geo;
    async move {
      let rows = w.store.find_minutes_browser(&w.caller, &filter).await.unwrap();
      rows.into_iter().map(|r| r.minute_id).collect::<HashSet<_>>()
    }
  };

  let all = browse(GeoFilter::default()).await;
  assert_eq!(all.len(), 4);

  let towns_only = browse(GeoFilter::towns(vec![w.towns[2].town_id])).await;
  assert_eq!(towns_only, HashSet::from([unattached.minute_id]));

  let interco_only =
    browse(GeoFilter::intercommunals(vec![w.interco[0].intercommunal_id])).await;
  assert_eq!(interco_only, HashSet::from([in_north.minute_id, north_too.minute_id]));

  let either = browse(GeoFilter {
    towns:          vec![w.towns[2].town_id],
    intercommunals: vec![w.interco[1].intercommunal_id],
  })
  .await;
  assert_eq!(either, HashSet::from([in_south.minute_id, unattached.minute_id]));
}

#[tokio::test]
async fn caseworker_geography_combines_towns_and_intercommunals() {
  let w = &world().await;

  let mut townsman = seed_adherent(&w.store, "Petit").await;
  townsman.town_id = Some(w.towns[2].town_id);
  w.store.save_adherent(townsman.clone()).await.unwrap();

  let mut regional = seed_adherent(&w.store, "Moreau").await;
  regional.intercommunal_id = Some(w.interco[1].intercommunal_id);
  w.store.save_adherent(regional.clone()).await.unwrap();

  let minute_of = |adherent: &Adherent| {
    let input =
      NewMinute::new(adherent.adherent_id, geocoded_plot(&w.towns[0]), vec![w.human.human_id]);
    async move { w.store.create_minute(&w.caller, input).await.unwrap().minute_id }
  };
  let homeless = minute_of(&w.adherent).await;
  let by_town = minute_of(&townsman).await;
  let by_interco = minute_of(&regional).await;

  let browse = |geo: GeoFilter| {
    let mut filter = w.wide_browse();
    filter.adherent_geo = geo;
    async move {
      let rows = w.store.find_minutes_browser(&w.caller, &filter).await.unwrap();
      rows.into_iter().map(|r| r.minute_id).collect::<HashSet<_>>()
    }
  };

  let all = browse(GeoFilter::default()).await;
  assert_eq!(all, HashSet::from([homeless, by_town, by_interco]));

  let towns_only = browse(GeoFilter::towns(vec![w.towns[2].town_id])).await;
  assert_eq!(towns_only, HashSet::from([by_town]));

  let interco_only =
    browse(GeoFilter::intercommunals(vec![w.interco[1].intercommunal_id])).await;
  assert_eq!(interco_only, HashSet::from([by_interco]));

  let either = browse(GeoFilter {
    towns:          vec![w.towns[2].town_id],
    intercommunals: vec![w.interco[1].intercommunal_id],
  })
  .await;
  assert_eq!(either, HashSet::from([by_town, by_interco]));
}

#[tokio::test]
async fn browser_rows_carry_party_names() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let rows = w.store.find_minutes_browser(&w.caller, &w.wide_browse()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].minute_id, minute.minute_id);
  assert_eq!(rows[0].town.name, "Baillif");
  assert_eq!(rows[0].adherent.id, w.adherent.adherent_id);
  assert_eq!(rows[0].humans.len(), 1);
  assert!(rows[0].humans[0].contains("Durand"));
}

#[tokio::test]
async fn scoped_callers_only_see_their_minutes() {
  let w = world().await;
  let other = seed_adherent(&w.store, "Petit").await;
  let mine = w.minute_in(&w.towns[0]).await;
  let theirs = w
    .store
    .create_minute(
      &CallerContext::admin(other.adherent_id),
      NewMinute::new(other.adherent_id, geocoded_plot(&w.towns[1]), vec![w.human.human_id]),
    )
    .await
    .unwrap();

  let scoped = CallerContext::caseworker(w.adherent.adherent_id);
  let mut filter = w.wide_browse();
  filter.adherents = vec![other.adherent_id];
  let rows = w.store.find_minutes_browser(&scoped, &filter).await.unwrap();
  assert_eq!(rows.iter().map(|r| r.minute_id).collect::<Vec<_>>(), vec![mine.minute_id]);

  let rows = w.store.find_minutes_browser(&w.caller, &filter).await.unwrap();
  assert_eq!(rows.iter().map(|r| r.minute_id).collect::<Vec<_>>(), vec![theirs.minute_id]);
}

#[tokio::test]
async fn browse_filters_by_status_and_number() {
  let w = world().await;
  let first = w.minute_in(&w.towns[0]).await;
  let second = w.minute_in(&w.towns[0]).await;
  w.folder_control(second.minute_id).await;
  refresh_status(&w.store, &NoopNotifier, HistoryPolicy::default(), second.minute_id)
    .await
    .unwrap();

  let mut filter = w.wide_browse();
  filter.statuses = vec![MinuteStatus::Control];
  let rows = w.store.find_minutes_browser(&w.caller, &filter).await.unwrap();
  assert_eq!(rows.iter().map(|r| r.minute_id).collect::<Vec<_>>(), vec![second.minute_id]);

  let mut filter = w.wide_browse();
  filter.num = Some(first.num.clone());
  let rows = w.store.find_minutes_browser(&w.caller, &filter).await.unwrap();
  assert_eq!(rows.iter().map(|r| r.minute_id).collect::<Vec<_>>(), vec![first.minute_id]);
}

// ─── Maps & reports ──────────────────────────────────────────────────────────

#[tokio::test]
async fn geocoded_maps_respect_closure_states() {
  let w = world().await;
  let open = w.minute_in(&w.towns[0]).await;
  let closed = w.minute_in(&w.towns[0]).await;
  let mut no_coords = w.new_minute(&w.towns[0]);
  no_coords.plot.latitude = None;
  no_coords.plot.longitude = None;
  w.store.create_minute(&w.caller, no_coords).await.unwrap();

  w.store
    .close_minute(closed.minute_id, Closure {
      status:       ClosureStatus::Regularized,
      date_closing: Utc::now(),
      observation:  Some("works removed".into()),
    })
    .await
    .unwrap();

  let ids = |points: Vec<verbal_core::projection::MinuteMapPoint>| {
    points.into_iter().map(|p| p.minute_id).collect::<HashSet<_>>()
  };

  let open_only = w.store.find_minutes_with_geocode(None, &[]).await.unwrap();
  assert_eq!(ids(open_only), HashSet::from([open.minute_id]));

  let regularized =
    w.store.find_minutes_with_geocode(None, &[ClosureStatus::Regularized]).await.unwrap();
  assert_eq!(ids(regularized), HashSet::from([closed.minute_id]));

  let either = [ClosureStatus::Regularized, ClosureStatus::Relaxed];
  let either = w.store.find_minutes_with_geocode(None, &either).await.unwrap();
  assert_eq!(ids(either), HashSet::from([closed.minute_id]));

  let other_closure =
    w.store.find_minutes_with_geocode(None, &[ClosureStatus::Relaxed]).await.unwrap();
  assert!(other_closure.is_empty());

  let elsewhere = LocalScope::Intercommunal(w.interco[1].intercommunal_id);
  assert!(w.store.find_minutes_with_geocode(Some(elsewhere), &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn control_map_skips_plots_without_coordinates() {
  let w = world().await;
  let located = w.minute_in(&w.towns[0]).await;
  let mut blind = w.new_minute(&w.towns[1]);
  blind.plot.latitude = None;
  blind.plot.longitude = None;
  let blind = w.store.create_minute(&w.caller, blind).await.unwrap();

  let visible = w.folder_control(located.minute_id).await;
  w.folder_control(blind.minute_id).await;

  let points = w.store.find_controls_with_geocode(None).await.unwrap();
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].control_id, visible.control_id);
  assert_eq!(points[0].minute_num, located.num);

  let town = LocalScope::Town(w.towns[0].town_id);
  assert_eq!(w.store.find_controls_with_geocode(Some(town)).await.unwrap().len(), 1);

  let elsewhere = LocalScope::Intercommunal(w.interco[1].intercommunal_id);
  assert!(w.store.find_controls_with_geocode(Some(elsewhere)).await.unwrap().is_empty());
}

#[tokio::test]
async fn spotting_excludes_minutes_already_acted_upon() {
  let w = world().await;
  let untouched = w.minute_in(&w.towns[0]).await;
  let visited = w.minute_in(&w.towns[0]).await;
  w.folder_control(visited.minute_id).await;

  let points = w.store.find_spotting_with_geocode(None, &[]).await.unwrap();
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].minute_id, untouched.minute_id);
}

#[tokio::test]
async fn area_queries_apply_bounds_and_limit() {
  let w = world().await;
  let inside = w.minute_in(&w.towns[0]).await;
  let mut far = w.new_minute(&w.towns[0]);
  far.plot.latitude = Some(45.0);
  far.plot.longitude = Some(2.0);
  w.store.create_minute(&w.caller, far).await.unwrap();
  let control = w.folder_control(inside.minute_id).await;

  let filter = AreaFilter {
    bounds: Some(BoundingBox { min_lat: 16.0, max_lat: 16.1, min_lon: -61.8, max_lon: -61.6 }),
    ..AreaFilter::default()
  };
  let minutes = w.store.find_minutes_in_area(&filter).await.unwrap();
  assert_eq!(minutes.len(), 1);
  assert_eq!(minutes[0].minute_id, inside.minute_id);

  let controls = w.store.find_controls_in_area(&filter).await.unwrap();
  assert_eq!(controls.len(), 1);
  assert_eq!(controls[0].control_id, control.control_id);

  let limited = AreaFilter { max_results: Some(1), ..AreaFilter::default() };
  assert_eq!(w.store.find_minutes_in_area(&limited).await.unwrap().len(), 1);
}

#[tokio::test]
async fn control_queries_default_to_inside_states() {
  let w = world().await;
  let minute = w.minute_in(&w.towns[0]).await;
  let inside = w.folder_control(minute.minute_id).await;
  w.store
    .add_control(
      minute.minute_id,
      NewControl::new(inside.agent_id, ControlType::Folder, ControlState::Neighbour),
    )
    .await
    .unwrap();

  let rows = w.store.find_controls_between_dates(&[minute.minute_id], &[]).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].control_id, inside.control_id);
  assert_eq!(rows[0].minute_num, minute.num);

  let rows = w.store.find_controls_between_dates(&[], &[ControlState::Neighbour]).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].state, ControlState::Neighbour);

  let stats = w.store.stat_controls(&[]).await.unwrap();
  assert_eq!(stats.len(), 1);
}

#[tokio::test]
async fn reports_group_by_adherent() {
  let w = world().await;
  let other = seed_adherent(&w.store, "Petit").await;
  w.minute_in(&w.towns[0]).await;
  w.store
    .create_minute(
      &CallerContext::admin(other.adherent_id),
      NewMinute::new(other.adherent_id, geocoded_plot(&w.towns[1]), vec![w.human.human_id]),
    )
    .await
    .unwrap();

  let rows = w.store.stat_minutes_by_adherents(&[other.adherent_id]).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].adherent.name, "Petit");

  let overall = w.store.stat_minute_overall(&Default::default()).await.unwrap();
  assert_eq!(overall.len(), 2);

  let stats = w.store.stat_minutes(&Default::default()).await.unwrap();
  assert_eq!(stats.len(), 2);
  assert!(stats.iter().all(|s| s.controls == 0 && s.folder_natures.is_empty()));
}
