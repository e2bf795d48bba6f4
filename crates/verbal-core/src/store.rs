//! The `CaseStore` trait: persistence of the case graph and the listing
//! queries.
//!
//! The trait is implemented by storage backends (e.g. `verbal-store-sqlite`).
//! The binary and the lifecycle manager depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  control::{Control, ControlState, NewControl},
  decision::{Decision, NewDecision},
  folder::{Folder, NewFolder},
  minute::{Closure, Minute, MinuteEdit, MinuteGraph, MinuteStatus, MinuteStory, NewMinute},
  projection::{
    ControlDateRow, ControlMapPoint, ControlStateRow, MinuteAdherentRow, MinuteBrowserRow,
    MinuteMapPoint, MinuteOverallRow, MinuteStatRow,
  },
  query::{AreaFilter, BrowseFilter, CallerContext, LocalScope, OverallFilter, StatsFilter},
  reference::{Adherent, Agent, Human, Intercommunal, Natinf, Service, Tag, Town, Tribunal},
  updating::{NewUpdating, Updating},
};

/// Abstraction over a case-records backend.
///
/// Every mutation of an aggregate runs as one transaction. Owned rows
/// (plot, controls, updatings, folders, decisions, history) go with their
/// owner; reference data is never cascaded.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  // ── Reference data ────────────────────────────────────────────────────

  fn save_intercommunal(
    &self,
    intercommunal: Intercommunal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_town(&self, town: Town) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_service(
    &self,
    service: Service,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_adherent(
    &self,
    adherent: Adherent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_agent(&self, agent: Agent) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_human(&self, human: Human) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_tribunal(
    &self,
    tribunal: Tribunal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_tag(&self, tag: Tag) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn save_natinf(&self, natinf: Natinf) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_adherent(
    &self,
    adherent_id: Uuid,
  ) -> impl Future<Output = Result<Option<Adherent>, Self::Error>> + Send + '_;

  fn list_agents(
    &self,
    adherent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Agent>, Self::Error>> + Send + '_;

  // ── Minutes ───────────────────────────────────────────────────────────

  /// Validate, allocate the case number and persist the minute with its
  /// plot, party links and initial history entry, atomically.
  fn create_minute<'a>(
    &'a self,
    caller: &'a CallerContext,
    input: NewMinute,
  ) -> impl Future<Output = Result<Minute, Self::Error>> + Send + 'a;

  /// Load the minute with every relation. Returns `None` if not found.
  fn get_minute(
    &self,
    minute_id: Uuid,
  ) -> impl Future<Output = Result<Option<MinuteGraph>, Self::Error>> + Send + '_;

  fn update_minute(
    &self,
    minute_id: Uuid,
    edit: MinuteEdit,
  ) -> impl Future<Output = Result<Minute, Self::Error>> + Send + '_;

  /// Delete the minute and everything it owns.
  fn delete_minute(&self, minute_id: Uuid)
  -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Close the minute. Status is not touched; refresh it afterwards.
  fn close_minute(
    &self,
    minute_id: Uuid,
    closure: Closure,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist `status` on the minute. With `append`, also add a history
  /// entry and return it.
  fn record_status(
    &self,
    minute_id: Uuid,
    status: MinuteStatus,
    append: bool,
  ) -> impl Future<Output = Result<Option<MinuteStory>, Self::Error>> + Send + '_;

  /// The number the next minute opened in `year` (two digits) would get.
  fn peek_next_number(&self, year: u32)
  -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  // ── Controls ──────────────────────────────────────────────────────────

  fn add_control(
    &self,
    minute_id: Uuid,
    input: NewControl,
  ) -> impl Future<Output = Result<Control, Self::Error>> + Send + '_;

  /// Add a refresh control owned by an updating.
  fn add_updating_control(
    &self,
    updating_id: Uuid,
    input: NewControl,
  ) -> impl Future<Output = Result<Control, Self::Error>> + Send + '_;

  /// Rewrite an existing control. Acceptance is derived before the
  /// notice dates are validated.
  fn update_control(
    &self,
    control: Control,
  ) -> impl Future<Output = Result<Control, Self::Error>> + Send + '_;

  /// Delete the control and the folder built from it, if any.
  fn delete_control(
    &self,
    control_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Updatings ─────────────────────────────────────────────────────────

  fn create_updating(
    &self,
    minute_id: Uuid,
    input: NewUpdating,
  ) -> impl Future<Output = Result<Updating, Self::Error>> + Send + '_;

  /// Delete the updating and its controls.
  fn delete_updating(
    &self,
    updating_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Folders ───────────────────────────────────────────────────────────

  /// Build a folder from a control. The control must be eligible and not
  /// linked to another folder.
  fn create_folder(
    &self,
    control_id: Uuid,
    input: NewFolder,
  ) -> impl Future<Output = Result<Folder, Self::Error>> + Send + '_;

  /// Rewrite an existing folder, its courier, tags, natinfs and party
  /// links.
  fn update_folder(
    &self,
    folder: Folder,
  ) -> impl Future<Output = Result<Folder, Self::Error>> + Send + '_;

  /// Delete the folder. Its control stays.
  fn delete_folder(&self, folder_id: Uuid)
  -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Decisions ─────────────────────────────────────────────────────────

  fn record_decision(
    &self,
    minute_id: Uuid,
    input: NewDecision,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  // ── Minute queries ────────────────────────────────────────────────────

  fn find_minutes_browser<'a>(
    &'a self,
    caller: &'a CallerContext,
    filter: &'a BrowseFilter,
  ) -> impl Future<Output = Result<Vec<MinuteBrowserRow>, Self::Error>> + Send + 'a;

  fn stat_minute_overall<'a>(
    &'a self,
    filter: &'a OverallFilter,
  ) -> impl Future<Output = Result<Vec<MinuteOverallRow>, Self::Error>> + Send + 'a;

  fn stat_minutes<'a>(
    &'a self,
    filter: &'a StatsFilter,
  ) -> impl Future<Output = Result<Vec<MinuteStatRow>, Self::Error>> + Send + 'a;

  fn stat_minutes_by_adherents<'a>(
    &'a self,
    adherents: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<MinuteAdherentRow>, Self::Error>> + Send + 'a;

  fn find_minutes_in_area<'a>(
    &'a self,
    filter: &'a AreaFilter,
  ) -> impl Future<Output = Result<Vec<MinuteMapPoint>, Self::Error>> + Send + 'a;

  fn find_minutes_with_geocode<'a>(
    &'a self,
    local: Option<LocalScope>,
    closure_states: &'a [crate::minute::ClosureStatus],
  ) -> impl Future<Output = Result<Vec<MinuteMapPoint>, Self::Error>> + Send + 'a;

  /// Geocoded minutes with no control, updating or decision yet.
  fn find_spotting_with_geocode<'a>(
    &'a self,
    local: Option<LocalScope>,
    closure_states: &'a [crate::minute::ClosureStatus],
  ) -> impl Future<Output = Result<Vec<MinuteMapPoint>, Self::Error>> + Send + 'a;

  /// The minute owning a control. Returns `None` when nothing, or more than
  /// one row, matches.
  fn find_minute_by_control(
    &self,
    control_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Control queries ───────────────────────────────────────────────────

  /// Controls of `minutes` in one of `states`; an empty `states` means
  /// [`crate::query::DEFAULT_CONTROL_STATES`].
  fn find_controls_between_dates<'a>(
    &'a self,
    minutes: &'a [Uuid],
    states: &'a [ControlState],
  ) -> impl Future<Output = Result<Vec<ControlDateRow>, Self::Error>> + Send + 'a;

  fn stat_controls<'a>(
    &'a self,
    states: &'a [ControlState],
  ) -> impl Future<Output = Result<Vec<ControlStateRow>, Self::Error>> + Send + 'a;

  fn find_controls_in_area<'a>(
    &'a self,
    filter: &'a AreaFilter,
  ) -> impl Future<Output = Result<Vec<ControlMapPoint>, Self::Error>> + Send + 'a;

  fn find_controls_with_geocode(
    &self,
    local: Option<LocalScope>,
  ) -> impl Future<Output = Result<Vec<ControlMapPoint>, Self::Error>> + Send + '_;

  fn find_controls_by_minute(
    &self,
    minute_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Control>, Self::Error>> + Send + '_;
}
