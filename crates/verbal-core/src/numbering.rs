//! Case numbers: `YY-NNN`, restarting every year.
//!
//! The store selects candidates with a loose substring match on the year and
//! allocates inside a write-locked transaction; this module only does the
//! arithmetic.

use chrono::{DateTime, Datelike, Utc};

use crate::{Error, Result};

/// Two-digit year key of an opening date.
pub fn year_key(date_opening: DateTime<Utc>) -> u32 {
  date_opening.year().rem_euclid(100) as u32
}

pub fn format_number(year: u32, seq: u32) -> String { format!("{year:02}-{seq:03}") }

/// Split `YY-NNN` into its parts.
pub fn parse_number(num: &str) -> Option<(u32, u32)> {
  let (year, seq) = num.trim().split_once('-')?;
  Some((year.parse().ok()?, seq.parse().ok()?))
}

/// The next free sequence number for `year`, given the numbers already
/// present. Candidates from another year or with an unparsable shape are
/// ignored; sequences compare numerically. `None` once the sequence cannot
/// grow any further.
pub fn next_sequence<'a>(year: u32, candidates: impl IntoIterator<Item = &'a str>) -> Option<u32> {
  candidates
    .into_iter()
    .filter_map(parse_number)
    .filter(|(y, _)| *y == year)
    .map(|(_, seq)| seq)
    .max()
    .map_or(Some(1), |max| max.checked_add(1))
}

pub fn next_number<'a>(
  year: u32,
  candidates: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
  let seq = next_sequence(year, candidates).ok_or(Error::NumbersExhausted(year))?;
  Ok(format_number(year, seq))
}

/// The `LIKE` pattern used to preselect candidates for `year`.
pub fn like_pattern(year: u32) -> String { format!("%{year:02}%") }
