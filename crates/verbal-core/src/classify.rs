//! Control classification: automatic acceptance, valid-control counting and
//! the controls a folder may be built from.

use std::cmp::Reverse;

use crate::{
  control::{Acceptance, Control, ControlReason, ControlState, ControlType},
  minute::MinuteGraph,
  updating::Updating,
};

/// Fill `accepted` from the visit state and the letter outcome.
///
/// A visit that did not take place inside the property is always accepted.
/// Inside visits follow the letter: refused or unclaimed means refused,
/// a bad address means nobody could answer. Any other reason leaves the
/// recorded value alone.
pub fn define_accepted_automatically(control: &mut Control) {
  if control.state != ControlState::Inside {
    control.accepted = Some(Acceptance::Ok);
  } else if matches!(
    control.reason,
    Some(ControlReason::RefusedLetter | ControlReason::UnclaimedLetter)
  ) {
    control.accepted = Some(Acceptance::Nok);
  } else if matches!(
    control.reason,
    Some(ControlReason::ErrorAddress | ControlReason::UnknownAddress)
  ) {
    control.accepted = Some(Acceptance::None);
  }
}

/// Refresh controls of the minute that no updating claims.
pub fn refresh_controls_lost(graph: &MinuteGraph) -> Vec<&Control> {
  graph
    .controls
    .iter()
    .filter(|c| c.control_type == ControlType::Refresh)
    .filter(|c| {
      !graph
        .updatings
        .iter()
        .any(|u| u.controls.iter().any(|owned| owned.control_id == c.control_id))
    })
    .collect()
}

pub fn count_valid_controls(graph: &MinuteGraph) -> usize {
  graph.controls.len() - refresh_controls_lost(graph).len()
}

/// A dated visit where the notice reached nobody.
fn is_unanswered_visit(control: &Control) -> bool {
  control.date_control.is_some()
    && control.hour_control.is_some()
    && control.accepted == Some(Acceptance::None)
}

impl MinuteGraph {
  /// Folder-type controls a new folder may be built from, newest first.
  ///
  /// A control qualifies when it was an unanswered dated visit, or when the
  /// property was not fenced and no folder was built from it yet. Controls
  /// sharing a timestamp keep their stored order.
  pub fn controls_for_folder(&self) -> Vec<&Control> {
    let mut eligible: Vec<&Control> = self
      .controls
      .iter()
      .filter(|c| c.control_type == ControlType::Folder)
      .filter(|c| {
        is_unanswered_visit(c) || (!c.is_fenced && self.folder_of(c).is_none())
      })
      .collect();
    eligible.sort_by_key(|c| Reverse(c.created_at));
    eligible
  }

  pub fn is_folder_eligible(&self, control: &Control) -> bool {
    self
      .controls_for_folder()
      .iter()
      .any(|c| c.control_id == control.control_id)
  }
}

impl Updating {
  /// Owned controls a folder may be built from, in stored order.
  pub fn controls_for_folder(&self) -> Vec<&Control> {
    self
      .controls
      .iter()
      .filter(|c| is_unanswered_visit(c) || !c.is_fenced)
      .collect()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
  use proptest::prelude::*;
  use uuid::Uuid;

  use super::*;
  use crate::{
    control::NewControl,
    folder::Folder,
    minute::{Minute, MinuteStatus, Origin},
    plot::NewPlot,
  };

  pub(crate) fn empty_graph() -> MinuteGraph {
    let minute_id = Uuid::new_v4();
    MinuteGraph {
      minute:    Minute {
        minute_id,
        num: "24-001".into(),
        status: MinuteStatus::Open,
        origin: Origin::Agent,
        adherent_id: Uuid::new_v4(),
        agent_id: None,
        tribunal_id: None,
        tribunal_competent_id: None,
        department: None,
        date_opening: Utc::now(),
        date_last_update: None,
        date_complaint: None,
        name_complaint: None,
        is_closed: false,
        closure: None,
        reporting: None,
        created_at: Utc::now(),
      },
      plot:      NewPlot::in_town(Uuid::new_v4()).build(),
      humans:    Vec::new(),
      controls:  Vec::new(),
      updatings: Vec::new(),
      folders:   Vec::new(),
      decisions: Vec::new(),
      history:   Vec::new(),
    }
  }

  pub(crate) fn control_of(
    graph: &MinuteGraph,
    control_type: ControlType,
    minutes_ago: i64,
  ) -> Control {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() - Duration::minutes(minutes_ago);
    NewControl::new(Uuid::new_v4(), control_type, ControlState::Inside).build(
      graph.minute.minute_id,
      None,
      created,
    )
  }

  pub(crate) fn folder_on(graph: &MinuteGraph, control_id: Uuid) -> Folder {
    Folder {
      folder_id: Uuid::new_v4(),
      num: "1".into(),
      minute_id: graph.minute.minute_id,
      control_id,
      folder_type: ControlType::Folder,
      nature: None,
      reason_obstacle: None,
      ascertainment: None,
      details: None,
      violation: None,
      date_closure: None,
      is_reread: false,
      folder_signed: None,
      annexes: Vec::new(),
      tags_nature: Vec::new(),
      tags_town: Vec::new(),
      natinfs: Vec::new(),
      humans_by_minute: Vec::new(),
      humans_by_folder: Vec::new(),
      courier: None,
      created_at: Utc::now(),
    }
  }

  fn updating_with(graph: &MinuteGraph, controls: Vec<Control>) -> Updating {
    Updating {
      updating_id: Uuid::new_v4(),
      minute_id: graph.minute.minute_id,
      num: "1".into(),
      nature: None,
      description: None,
      controls,
      created_at: Utc::now(),
    }
  }

  fn reasons() -> impl Strategy<Value = Option<ControlReason>> {
    prop_oneof![
      Just(None),
      Just(Some(ControlReason::ErrorAddress)),
      Just(Some(ControlReason::UnknownAddress)),
      Just(Some(ControlReason::RefusedLetter)),
      Just(Some(ControlReason::UnclaimedLetter)),
      "[a-z ]{0,12}".prop_map(|s| Some(ControlReason::Other(s))),
    ]
  }

  fn acceptances() -> impl Strategy<Value = Option<Acceptance>> {
    prop_oneof![
      Just(None),
      Just(Some(Acceptance::Ok)),
      Just(Some(Acceptance::Nok)),
      Just(Some(Acceptance::None)),
    ]
  }

  proptest! {
    #[test]
    fn outside_visits_are_always_accepted(
      state in prop_oneof![
        Just(ControlState::InsideWithoutConvocation),
        Just(ControlState::Outside),
        Just(ControlState::Neighbour),
      ],
      reason in reasons(),
      accepted in acceptances(),
    ) {
      let graph = empty_graph();
      let mut c = control_of(&graph, ControlType::Folder, 0);
      c.state = state;
      c.reason = reason;
      c.accepted = accepted;
      define_accepted_automatically(&mut c);
      prop_assert_eq!(c.accepted, Some(Acceptance::Ok));
    }

    #[test]
    fn inside_visits_follow_the_letter(reason in reasons(), accepted in acceptances()) {
      let graph = empty_graph();
      let mut c = control_of(&graph, ControlType::Folder, 0);
      c.reason = reason.clone();
      c.accepted = accepted;
      define_accepted_automatically(&mut c);
      let expected = match reason {
        Some(ControlReason::RefusedLetter | ControlReason::UnclaimedLetter) => Some(Acceptance::Nok),
        Some(ControlReason::ErrorAddress | ControlReason::UnknownAddress) => Some(Acceptance::None),
        _ => accepted,
      };
      prop_assert_eq!(c.accepted, expected);
    }
  }

  #[test]
  fn lost_refresh_controls_are_not_valid() {
    let mut graph = empty_graph();
    let folder_a = control_of(&graph, ControlType::Folder, 5);
    let folder_b = control_of(&graph, ControlType::Folder, 4);
    let folder_c = control_of(&graph, ControlType::Folder, 3);
    let claimed = control_of(&graph, ControlType::Refresh, 2);
    let lost = control_of(&graph, ControlType::Refresh, 1);

    graph.updatings.push(updating_with(&graph, vec![claimed.clone()]));
    graph.controls = vec![folder_a, folder_b, folder_c, claimed, lost.clone()];

    let lost_ids: Vec<Uuid> = refresh_controls_lost(&graph).iter().map(|c| c.control_id).collect();
    assert_eq!(lost_ids, vec![lost.control_id]);
    assert_eq!(count_valid_controls(&graph), 4);
  }

  #[test]
  fn folder_candidates_are_newest_first() {
    let mut graph = empty_graph();
    let old = control_of(&graph, ControlType::Folder, 30);
    let new = control_of(&graph, ControlType::Folder, 10);
    let refresh = control_of(&graph, ControlType::Refresh, 0);
    graph.controls = vec![old.clone(), new.clone(), refresh];

    let ids: Vec<Uuid> = graph.controls_for_folder().iter().map(|c| c.control_id).collect();
    assert_eq!(ids, vec![new.control_id, old.control_id]);
  }

  #[test]
  fn equal_timestamps_keep_stored_order() {
    let mut graph = empty_graph();
    let a = control_of(&graph, ControlType::Folder, 0);
    let b = control_of(&graph, ControlType::Folder, 0);
    graph.controls = vec![a.clone(), b.clone()];

    let ids: Vec<Uuid> = graph.controls_for_folder().iter().map(|c| c.control_id).collect();
    assert_eq!(ids, vec![a.control_id, b.control_id]);
  }

  #[test]
  fn fenced_or_linked_controls_need_an_unanswered_visit() {
    let mut graph = empty_graph();
    let mut fenced = control_of(&graph, ControlType::Folder, 3);
    fenced.is_fenced = true;

    let mut unanswered = control_of(&graph, ControlType::Folder, 2);
    unanswered.is_fenced = true;
    unanswered.date_control = NaiveDate::from_ymd_opt(2024, 1, 1);
    unanswered.hour_control = NaiveTime::from_hms_opt(10, 0, 0);
    unanswered.accepted = Some(Acceptance::None);

    let mut undated = unanswered.clone();
    undated.control_id = Uuid::new_v4();
    undated.hour_control = None;

    graph.controls = vec![fenced, unanswered.clone(), undated];
    let ids: Vec<Uuid> = graph.controls_for_folder().iter().map(|c| c.control_id).collect();
    assert_eq!(ids, vec![unanswered.control_id]);
  }

  #[test]
  fn unfenced_controls_with_a_folder_are_excluded() {
    let mut graph = empty_graph();
    let linked = control_of(&graph, ControlType::Folder, 2);
    let free = control_of(&graph, ControlType::Folder, 1);
    graph.folders.push(folder_on(&graph, linked.control_id));
    graph.controls = vec![linked.clone(), free.clone()];

    let ids: Vec<Uuid> = graph.controls_for_folder().iter().map(|c| c.control_id).collect();
    assert_eq!(ids, vec![free.control_id]);
    assert!(!graph.is_folder_eligible(&linked));
  }

  #[test]
  fn unanswered_visit_qualifies_even_with_a_folder() {
    let mut graph = empty_graph();
    let mut visited = control_of(&graph, ControlType::Folder, 1);
    visited.date_control = NaiveDate::from_ymd_opt(2024, 1, 1);
    visited.hour_control = NaiveTime::from_hms_opt(10, 0, 0);
    visited.accepted = Some(Acceptance::None);
    graph.folders.push(folder_on(&graph, visited.control_id));

    let mut fenced_too = visited.clone();
    fenced_too.control_id = Uuid::new_v4();
    fenced_too.is_fenced = true;
    graph.folders.push(folder_on(&graph, fenced_too.control_id));

    graph.controls = vec![visited.clone(), fenced_too.clone()];
    assert!(graph.is_folder_eligible(&visited));
    assert!(graph.is_folder_eligible(&fenced_too));
  }

  #[test]
  fn updating_candidates_ignore_folder_links() {
    let graph = empty_graph();
    let mut fenced = control_of(&graph, ControlType::Refresh, 2);
    fenced.is_fenced = true;
    let mut open = control_of(&graph, ControlType::Refresh, 1);
    open.folder_id = Some(Uuid::new_v4());
    let first = control_of(&graph, ControlType::Refresh, 0);

    let updating = updating_with(&graph, vec![fenced, open.clone(), first.clone()]);
    let ids: Vec<Uuid> = updating.controls_for_folder().iter().map(|c| c.control_id).collect();
    assert_eq!(ids, vec![open.control_id, first.control_id]);
  }
}
