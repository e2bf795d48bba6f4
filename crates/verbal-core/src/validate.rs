//! Pure validation rules.
//!
//! Each function inspects one entity and returns every violation found as a
//! `(field, code)` pair. Nothing is persisted by the caller while the list is
//! non-empty.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use strum::IntoStaticStr;

use crate::{
  control::Control,
  minute::{MinuteEdit, NewMinute},
  plot::{Plot, is_valid_parcel},
  query::CallerContext,
};

/// Stable identifier of a rule; the UI layer maps these to messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationCode {
  SentBeforePostal,
  SentNotBeforeNotified,
  SentNotBeforeReturned,
  NotifiedNotAfterPostal,
  NotifiedNotAfterSent,
  NotifiedNotBeforeReturned,
  ReturnedNotAfterPostal,
  ReturnedNotAfterSent,
  ReturnedNotAfterNotified,
  AddressOrParcelNeeded,
  LocationNeeded,
  ParcelFormat,
  TooShort,
  TooLong,
  HumansRequired,
  ComplaintDateOutOfRange,
  AgentRequired,
  TownNotAuthorized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
  pub field: String,
  pub code:  ViolationCode,
}

impl Violation {
  pub fn new(field: impl Into<String>, code: ViolationCode) -> Self {
    Self { field: field.into(), code }
  }
}

/// A non-empty list of violations, carried by [`crate::Error::Validation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
  /// `Ok(())` when `list` is empty, the wrapped list otherwise.
  pub fn check(list: Vec<Violation>) -> crate::Result<()> {
    if list.is_empty() {
      Ok(())
    } else {
      Err(crate::Error::Validation(Self(list)))
    }
  }

  pub fn has(&self, field: &str, code: ViolationCode) -> bool {
    self.0.iter().any(|v| v.field == field && v.code == code)
  }
}

impl fmt::Display for Violations {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .0
      .iter()
      .map(|v| {
        let code: &'static str = v.code.into();
        format!("{}: {code}", v.field)
      })
      .collect();
    f.write_str(&parts.join(", "))
  }
}

// ─── Control ─────────────────────────────────────────────────────────────────

/// Ordering of the notice pipeline: postal ≤ sent < notified < returned.
pub fn validate_control(control: &Control) -> Vec<Violation> {
  use ViolationCode::*;

  let mut out = Vec::new();
  let postal = control.date_postal;
  let sent = control.date_sent;
  let notified = control.date_notified;
  let returned = control.date_returned;

  let fails = |a: Option<DateTime<Utc>>, holds: &dyn Fn(DateTime<Utc>) -> bool| {
    a.is_some_and(|a| !holds(a))
  };

  if let Some(sent) = sent {
    if fails(postal, &|p| sent >= p) {
      out.push(Violation::new("date_sent", SentBeforePostal));
    }
    if fails(notified, &|n| sent < n) {
      out.push(Violation::new("date_sent", SentNotBeforeNotified));
    }
    if fails(returned, &|r| sent < r) {
      out.push(Violation::new("date_sent", SentNotBeforeReturned));
    }
  }

  if let Some(notified) = notified {
    if fails(postal, &|p| notified > p) {
      out.push(Violation::new("date_notified", NotifiedNotAfterPostal));
    }
    if fails(sent, &|s| notified > s) {
      out.push(Violation::new("date_notified", NotifiedNotAfterSent));
    }
    if fails(returned, &|r| notified < r) {
      out.push(Violation::new("date_notified", NotifiedNotBeforeReturned));
    }
  }

  if let Some(returned) = returned {
    if fails(postal, &|p| returned > p) {
      out.push(Violation::new("date_returned", ReturnedNotAfterPostal));
    }
    if fails(sent, &|s| returned > s) {
      out.push(Violation::new("date_returned", ReturnedNotAfterSent));
    }
    if fails(notified, &|n| returned > n) {
      out.push(Violation::new("date_returned", ReturnedNotAfterNotified));
    }
  }

  if let Some(delivery) = &control.courier_delivery {
    length_between(&mut out, "courier_delivery", delivery, 2, 50);
  }

  out
}

// ─── Plot ────────────────────────────────────────────────────────────────────

/// Field names are prefixed with `prefix` (e.g. `"plot."`) so the same rules
/// report correctly when nested under a minute.
pub fn validate_plot(plot: &Plot, prefix: &str) -> Vec<Violation> {
  use ViolationCode::*;

  let mut out = Vec::new();
  if !plot.has_location() {
    out.push(Violation::new(format!("{prefix}address"), AddressOrParcelNeeded));
    out.push(Violation::new(format!("{prefix}place"), AddressOrParcelNeeded));
    out.push(Violation::new(format!("{prefix}longitude"), LocationNeeded));
    out.push(Violation::new(format!("{prefix}latitude"), LocationNeeded));
  }

  if let Some(clean) = &plot.parcel_clean
    && !is_valid_parcel(clean)
  {
    out.push(Violation::new(format!("{prefix}parcel"), ParcelFormat));
  }
  if let Some(address) = &plot.address {
    length_between(&mut out, &format!("{prefix}address"), address, 2, 255);
  }
  if let Some(place) = &plot.place {
    length_between(&mut out, &format!("{prefix}place"), place, 2, 50);
  }

  out
}

// ─── Minute ──────────────────────────────────────────────────────────────────

/// Rules on the minute itself and its plot. `today` bounds the complaint
/// date to the current calendar year.
pub fn validate_minute(input: &NewMinute, plot: &Plot, today: NaiveDate) -> Vec<Violation> {
  minute_rules(
    input.humans.len(),
    input.date_complaint,
    input.name_complaint.as_deref(),
    plot,
    today,
  )
}

/// Same rules as [`validate_minute`], applied to an edit of a stored minute.
pub fn validate_minute_edit(edit: &MinuteEdit, today: NaiveDate) -> Vec<Violation> {
  minute_rules(
    edit.humans.len(),
    edit.date_complaint,
    edit.name_complaint.as_deref(),
    &edit.plot,
    today,
  )
}

fn minute_rules(
  humans: usize,
  date_complaint: Option<NaiveDate>,
  name_complaint: Option<&str>,
  plot: &Plot,
  today: NaiveDate,
) -> Vec<Violation> {
  let mut out = Vec::new();

  if humans == 0 {
    out.push(Violation::new("humans", ViolationCode::HumansRequired));
  }

  if let Some(date) = date_complaint {
    let min = NaiveDate::from_ymd_opt(2000, 1, 1);
    let max = NaiveDate::from_ymd_opt(today.year(), 12, 31);
    if min.is_some_and(|m| date < m) || max.is_some_and(|m| date > m) {
      out.push(Violation::new(
        "date_complaint",
        ViolationCode::ComplaintDateOutOfRange,
      ));
    }
  }

  if let Some(name) = name_complaint {
    length_between(&mut out, "name_complaint", name, 2, 60);
  }

  out.extend(validate_plot(plot, "plot."));
  out
}

/// Rules that depend on who files the minute: the caller needs at least one
/// agent, and a non-admin caller attached to a town may only file in it.
pub fn validate_caller(caller: &CallerContext, caller_has_agent: bool, plot: &Plot) -> Vec<Violation> {
  let mut out = Vec::new();
  if !caller_has_agent {
    out.push(Violation::new("agent", ViolationCode::AgentRequired));
  }
  if !caller.is_admin
    && let Some(town_id) = caller.town_id
    && town_id != plot.town_id
  {
    out.push(Violation::new("plot.town", ViolationCode::TownNotAuthorized));
  }
  out
}

fn length_between(out: &mut Vec<Violation>, field: &str, value: &str, min: usize, max: usize) {
  let len = value.chars().count();
  if len < min {
    out.push(Violation::new(field, ViolationCode::TooShort));
  } else if len > max {
    out.push(Violation::new(field, ViolationCode::TooLong));
  }
}
