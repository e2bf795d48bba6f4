//! Plot: where the reported works are located.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::reference::Town;

/// Accepted shape for cadastral parcel lists, e.g. `"A123, B456, 123ABC456"`.
static PARCEL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(([0-9]+)?[A-Z]+[0-9]+)(, ?([0-9]+)?[A-Z]+[0-9]+)*$")
    .expect("parcel pattern is valid")
});

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Natural or technological risk category of a zone.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Risk {
  Flood,
  Fire,
  Avalanche,
  GroundMovement,
  Technological,
  Other,
}

/// Which input the plot coordinates were derived from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationFrom {
  #[default]
  Address,
  Coordinates,
  Manual,
}

// ─── Plot ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
  pub plot_id:       Uuid,
  pub town_id:       Uuid,
  /// Parcel references as typed by the caseworker.
  pub parcel:        Option<String>,
  /// Normalised form of `parcel`; see [`normalize_parcel`].
  pub parcel_clean:  Option<String>,
  pub address:       Option<String>,
  pub place:         Option<String>,
  pub is_risk_zone:  Option<bool>,
  pub risk:          Option<Risk>,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub location_from: LocationFrom,
}

impl Plot {
  /// True when at least one of address, place, latitude or longitude is set.
  pub fn has_location(&self) -> bool {
    non_blank(&self.address)
      || non_blank(&self.place)
      || self.latitude.is_some()
      || self.longitude.is_some()
  }

  pub fn is_geocoded(&self) -> bool {
    self.latitude.is_some() && self.longitude.is_some()
  }

  /// Human-readable location: address, place and `town - code`.
  pub fn full_address(&self, town: Option<&Town>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(address) = self.address.as_deref().filter(|s| !s.is_empty()) {
      parts.push(address.to_owned());
    }
    if let Some(place) = self.place.as_deref().filter(|s| !s.is_empty()) {
      parts.push(place.to_owned());
    }
    if let Some(town) = town {
      parts.push(format!("{} - {}", town.name, town.code));
    }
    parts.join(" ")
  }
}

fn non_blank(value: &Option<String>) -> bool {
  value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Input to plot creation; the id and the normalised parcel are derived.
#[derive(Debug, Clone, Default)]
pub struct NewPlot {
  pub town_id:       Uuid,
  pub parcel:        Option<String>,
  pub address:       Option<String>,
  pub place:         Option<String>,
  pub is_risk_zone:  Option<bool>,
  pub risk:          Option<Risk>,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub location_from: LocationFrom,
}

impl NewPlot {
  pub fn in_town(town_id: Uuid) -> Self {
    Self { town_id, ..Self::default() }
  }

  pub fn build(self) -> Plot {
    let parcel_clean = self.parcel.as_deref().and_then(normalize_parcel);
    Plot {
      plot_id: Uuid::new_v4(),
      town_id: self.town_id,
      parcel: self.parcel,
      parcel_clean,
      address: self.address,
      place: self.place,
      is_risk_zone: self.is_risk_zone,
      risk: self.risk,
      latitude: self.latitude,
      longitude: self.longitude,
      location_from: self.location_from,
    }
  }
}

// ─── Parcels ─────────────────────────────────────────────────────────────────

/// Uppercase every parcel reference, drop inner whitespace and join them with
/// `", "`. Returns `None` when nothing remains.
pub fn normalize_parcel(raw: &str) -> Option<String> {
  let items: Vec<String> = raw
    .split(',')
    .map(|item| {
      item
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect::<String>()
    })
    .filter(|item| !item.is_empty())
    .collect();

  (!items.is_empty()).then(|| items.join(", "))
}

pub fn is_valid_parcel(parcel: &str) -> bool { PARCEL_RE.is_match(parcel) }
