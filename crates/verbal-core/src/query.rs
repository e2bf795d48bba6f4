//! Filter criteria for listings and reports, and the caller context that
//! scopes them.
//!
//! These are plain value objects built by the caller; the store turns them
//! into SQL.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  control::ControlState,
  folder::FolderNature,
  minute::{ClosureStatus, Minute, MinuteStatus, Origin},
  plot::Risk,
  reference::Adherent,
};

// ─── Caller ──────────────────────────────────────────────────────────────────

/// Who is asking. Passed explicitly to every scoped query and command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerContext {
  pub adherent_id:      Uuid,
  pub is_admin:         bool,
  pub service_id:       Option<Uuid>,
  pub town_id:          Option<Uuid>,
  pub intercommunal_id: Option<Uuid>,
}

/// Visibility of a caller over minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Sees only the minutes it is responsible for.
  Caseworker(Uuid),
  Unrestricted,
}

impl CallerContext {
  /// A plain caseworker with no service and no locality.
  pub fn caseworker(adherent_id: Uuid) -> Self {
    Self {
      adherent_id,
      is_admin: false,
      service_id: None,
      town_id: None,
      intercommunal_id: None,
    }
  }

  pub fn admin(adherent_id: Uuid) -> Self {
    Self { is_admin: true, ..Self::caseworker(adherent_id) }
  }

  pub fn from_adherent(adherent: &Adherent, is_admin: bool) -> Self {
    Self {
      adherent_id: adherent.adherent_id,
      is_admin,
      service_id: adherent.service_id,
      town_id: adherent.town_id,
      intercommunal_id: adherent.intercommunal_id,
    }
  }

  pub fn scope(&self) -> Scope {
    if self.is_admin || self.service_id.is_some() {
      Scope::Unrestricted
    } else {
      Scope::Caseworker(self.adherent_id)
    }
  }

  pub fn can_access(&self, minute: &Minute) -> bool {
    match self.scope() {
      Scope::Unrestricted => true,
      Scope::Caseworker(id) => minute.adherent_id == id,
    }
  }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// Inclusive instant range, compiled to `BETWEEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

fn end_of_day() -> NaiveTime { NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN) }

fn last_day_of_month(day: NaiveDate) -> NaiveDate {
  day
    .with_day(1)
    .and_then(|first| first.checked_add_months(Months::new(1)))
    .and_then(|next| next.checked_sub_days(Days::new(1)))
    .unwrap_or(day)
}

impl DateRange {
  /// From the start of `from` to the end of `to`.
  pub fn days(from: NaiveDate, to: NaiveDate) -> Self {
    Self {
      start: from.and_time(NaiveTime::MIN).and_utc(),
      end:   to.and_time(end_of_day()).and_utc(),
    }
  }

  /// January 1st to December 31st of `today`'s year.
  pub fn calendar_year(today: NaiveDate) -> Self {
    let year = today.year();
    let from = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
    let to = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today);
    Self::days(from, to)
  }

  /// Twelve months ending on the last day of the current month.
  pub fn rolling_year(today: NaiveDate) -> Self {
    let to = last_day_of_month(today);
    let from = to.checked_sub_months(Months::new(12)).unwrap_or(to);
    Self::days(from, to)
  }

  pub fn span_days(&self) -> i64 { (self.end - self.start).num_days() }

  /// `false` when the range is inverted or longer than `max_days`.
  pub fn check_span(&self, max_days: i64) -> bool {
    self.start <= self.end && self.span_days() <= max_days
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool { self.start <= at && at <= self.end }
}

// ─── Geography ───────────────────────────────────────────────────────────────

/// Towns and intercommunals selected in a filter form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoFilter {
  pub towns:          Vec<Uuid>,
  pub intercommunals: Vec<Uuid>,
}

/// What a [`GeoFilter`] compiles to. When both lists are given, a row
/// matches through either of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoPredicate {
  Town(Vec<Uuid>),
  Intercommunal(Vec<Uuid>),
  Either { towns: Vec<Uuid>, intercommunals: Vec<Uuid> },
}

impl GeoFilter {
  pub fn towns(towns: Vec<Uuid>) -> Self { Self { towns, intercommunals: Vec::new() } }

  pub fn intercommunals(intercommunals: Vec<Uuid>) -> Self {
    Self { towns: Vec::new(), intercommunals }
  }

  pub fn is_empty(&self) -> bool { self.towns.is_empty() && self.intercommunals.is_empty() }

  pub fn predicate(&self) -> Option<GeoPredicate> {
    match (self.towns.is_empty(), self.intercommunals.is_empty()) {
      (true, true) => None,
      (false, true) => Some(GeoPredicate::Town(self.towns.clone())),
      (true, false) => Some(GeoPredicate::Intercommunal(self.intercommunals.clone())),
      (false, false) => Some(GeoPredicate::Either {
        towns:          self.towns.clone(),
        intercommunals: self.intercommunals.clone(),
      }),
    }
  }
}

/// Locality of an adherent, used by the map queries: its intercommunal when
/// it has one, its town otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalScope {
  Intercommunal(Uuid),
  Town(Uuid),
}

impl LocalScope {
  pub fn of(adherent: &Adherent) -> Option<Self> {
    adherent
      .intercommunal_id
      .map(Self::Intercommunal)
      .or(adherent.town_id.map(Self::Town))
  }
}

// ─── Browse ──────────────────────────────────────────────────────────────────

/// Browser preferences that shape default filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseDefaults {
  /// Rolling twelve months instead of the calendar year.
  pub rolling_year:    bool,
  /// Preselect the caller as caseworker even when it could see everything.
  pub preset_adherent: bool,
  pub max_span_days:   i64,
}

impl Default for BrowseDefaults {
  fn default() -> Self {
    Self { rolling_year: false, preset_adherent: false, max_span_days: 366 * 3 }
  }
}

/// Filters of the main minute listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseFilter {
  pub range:        DateRange,
  /// Substring of the case number.
  pub num:          Option<String>,
  pub statuses:     Vec<MinuteStatus>,
  /// Ignored for scoped callers.
  pub adherents:    Vec<Uuid>,
  pub plot_geo:     GeoFilter,
  /// Ignored for scoped callers.
  pub adherent_geo: GeoFilter,
  /// Ignored for scoped callers.
  pub services:     Vec<Uuid>,
}

impl BrowseFilter {
  pub fn for_range(range: DateRange) -> Self {
    Self {
      range,
      num: None,
      statuses: Vec::new(),
      adherents: Vec::new(),
      plot_geo: GeoFilter::default(),
      adherent_geo: GeoFilter::default(),
      services: Vec::new(),
    }
  }

  pub fn default_range(settings: &BrowseDefaults, today: NaiveDate) -> DateRange {
    if settings.rolling_year {
      DateRange::rolling_year(today)
    } else {
      DateRange::calendar_year(today)
    }
  }

  /// The filter a listing opens with.
  ///
  /// Scoped callers see their own minutes in their own locality. Other
  /// callers start unfiltered unless `preset_adherent` is set.
  pub fn defaults_for(caller: &CallerContext, settings: &BrowseDefaults, today: NaiveDate) -> Self {
    let mut filter = Self::for_range(Self::default_range(settings, today));
    match caller.scope() {
      Scope::Caseworker(id) => {
        filter.adherents = vec![id];
        if let Some(interco) = caller.intercommunal_id {
          filter.plot_geo.intercommunals.push(interco);
        } else if let Some(town) = caller.town_id {
          filter.plot_geo.towns.push(town);
        }
      }
      Scope::Unrestricted if settings.preset_adherent => {
        filter.adherents = vec![caller.adherent_id];
      }
      Scope::Unrestricted => {}
    }
    filter
  }

  /// Replace an oversized range with the default one. Returns `true` when
  /// the range was replaced.
  pub fn clamp_span(&mut self, settings: &BrowseDefaults, today: NaiveDate) -> bool {
    if self.range.check_span(settings.max_span_days) {
      return false;
    }
    tracing::warn!(
      span_days = self.range.span_days(),
      max = settings.max_span_days,
      "browse range too wide, falling back to default"
    );
    self.range = Self::default_range(settings, today);
    true
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Filters of the overall statistics table. All lists combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallFilter {
  pub range:                   Option<DateRange>,
  pub adherents:               Vec<Uuid>,
  pub plot_towns:              Vec<Uuid>,
  pub adherent_towns:          Vec<Uuid>,
  pub adherent_intercommunals: Vec<Uuid>,
  pub services:                Vec<Uuid>,
}

/// Filters of the detailed statistics table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsFilter {
  pub overall:        OverallFilter,
  pub origins:        Vec<Origin>,
  pub risks:          Vec<Risk>,
  pub folder_natures: Vec<FolderNature>,
}

/// Axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub min_lat: f64,
  pub max_lat: f64,
  pub min_lon: f64,
  pub max_lon: f64,
}

/// Filters of the map views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaFilter {
  pub bounds:         Option<BoundingBox>,
  pub local:          Option<LocalScope>,
  /// Only minutes closed with one of these statuses. When empty, only
  /// minutes without a closure are shown.
  pub closure_states: Vec<ClosureStatus>,
  pub minutes:        Vec<Uuid>,
  pub max_results:    Option<usize>,
}

/// Visit states counted by the control listings when none are given.
pub const DEFAULT_CONTROL_STATES: [ControlState; 2] =
  [ControlState::Inside, ControlState::InsideWithoutConvocation];
