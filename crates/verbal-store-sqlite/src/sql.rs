//! A small `SELECT` assembler for the filtered listings.
//!
//! Conditions are appended in order together with their positional
//! parameters; empty filter lists add nothing. The result is bound with
//! [`rusqlite::params_from_iter`].

use rusqlite::types::Value;
use uuid::Uuid;
use verbal_core::query::{DateRange, GeoPredicate, LocalScope};

use crate::encode::{encode_dt, encode_uuid};

pub fn uuid_value(id: Uuid) -> Value { Value::Text(encode_uuid(id)) }

pub fn text_value(s: impl Into<String>) -> Value { Value::Text(s.into()) }

pub fn uuid_values(ids: &[Uuid]) -> Vec<Value> { ids.iter().copied().map(uuid_value).collect() }

pub fn enum_values<E: Copy + Into<&'static str>>(items: &[E]) -> Vec<Value> {
  items.iter().map(|e| text_value((*e).into())).collect()
}

pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

#[derive(Debug)]
pub struct Select {
  head:     String,
  joins:    Vec<String>,
  conds:    Vec<String>,
  params:   Vec<Value>,
  group_by: Option<&'static str>,
  order_by: Option<&'static str>,
  limit:    Option<usize>,
}

impl Select {
  /// `head` is everything up to and including the `FROM` table.
  pub fn new(head: impl Into<String>) -> Self {
    Self {
      head:     head.into(),
      joins:    Vec::new(),
      conds:    Vec::new(),
      params:   Vec::new(),
      group_by: None,
      order_by: None,
      limit:    None,
    }
  }

  /// Appended after the head; the same clause is only added once.
  pub fn join(&mut self, clause: &str) -> &mut Self {
    if !self.joins.iter().any(|j| j == clause) {
      self.joins.push(clause.to_owned());
    }
    self
  }

  /// Raw condition with its parameters, in placeholder order.
  pub fn cond(&mut self, sql: impl Into<String>, params: impl IntoIterator<Item = Value>) -> &mut Self {
    self.conds.push(sql.into());
    self.params.extend(params);
    self
  }

  pub fn eq(&mut self, column: &str, value: Value) -> &mut Self {
    self.cond(format!("{column} = ?"), [value])
  }

  /// `column IN (...)`; a no-op for an empty list.
  pub fn in_list(&mut self, column: &str, values: Vec<Value>) -> &mut Self {
    if values.is_empty() {
      return self;
    }
    let sql = format!("{column} IN ({})", placeholders(values.len()));
    self.cond(sql, values)
  }

  pub fn between(&mut self, column: &str, range: &DateRange) -> &mut Self {
    self.cond(
      format!("{column} BETWEEN ? AND ?"),
      [text_value(encode_dt(range.start)), text_value(encode_dt(range.end))],
    )
  }

  pub fn like(&mut self, column: &str, needle: &str) -> &mut Self {
    self.cond(format!("{column} LIKE ?"), [text_value(format!("%{needle}%"))])
  }

  /// Towns only, intercommunals only, or either of the two.
  pub fn geo(&mut self, predicate: Option<GeoPredicate>, town_col: &str, interco_col: &str) -> &mut Self {
    match predicate {
      None => self,
      Some(GeoPredicate::Town(towns)) => self.in_list(town_col, uuid_values(&towns)),
      Some(GeoPredicate::Intercommunal(intercos)) => {
        self.in_list(interco_col, uuid_values(&intercos))
      }
      Some(GeoPredicate::Either { towns, intercommunals }) => {
        let sql = format!(
          "({interco_col} IN ({}) OR {town_col} IN ({}))",
          placeholders(intercommunals.len()),
          placeholders(towns.len()),
        );
        let params = uuid_values(&intercommunals).into_iter().chain(uuid_values(&towns));
        self.cond(sql, params)
      }
    }
  }

  pub fn local(&mut self, local: Option<LocalScope>, town_col: &str, interco_col: &str) -> &mut Self {
    match local {
      None => self,
      Some(LocalScope::Town(id)) => self.eq(town_col, uuid_value(id)),
      Some(LocalScope::Intercommunal(id)) => self.eq(interco_col, uuid_value(id)),
    }
  }

  pub fn group_by(&mut self, clause: &'static str) -> &mut Self {
    self.group_by = Some(clause);
    self
  }

  pub fn order_by(&mut self, clause: &'static str) -> &mut Self {
    self.order_by = Some(clause);
    self
  }

  pub fn limit(&mut self, limit: Option<usize>) -> &mut Self {
    self.limit = limit;
    self
  }

  pub fn sql(&self) -> String {
    let mut sql = self.head.clone();
    for join in &self.joins {
      sql.push('\n');
      sql.push_str(join);
    }
    if !self.conds.is_empty() {
      sql.push_str("\nWHERE ");
      sql.push_str(&self.conds.join("\n  AND "));
    }
    if let Some(group_by) = self.group_by {
      sql.push_str("\nGROUP BY ");
      sql.push_str(group_by);
    }
    if let Some(order_by) = self.order_by {
      sql.push_str("\nORDER BY ");
      sql.push_str(order_by);
    }
    if let Some(limit) = self.limit {
      sql.push_str(&format!("\nLIMIT {limit}"));
    }
    sql
  }

  pub fn params(&self) -> &[Value] { &self.params }

  /// Prepare, bind and map every row.
  pub fn query<T>(
    &self,
    conn: &rusqlite::Connection,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> rusqlite::Result<Vec<T>> {
    let sql = self.sql();
    tracing::debug!(%sql, params = self.params().len(), "query");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
      .query_map(rusqlite::params_from_iter(self.params()), map)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }
}
