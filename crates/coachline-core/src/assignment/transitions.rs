//! Assigned-plan status graph.
//!
//! ```text
//! active   -> completed
//! active   -> inactive
//! inactive -> active
//! inactive -> completed
//! ```
//!
//! `completed` is terminal. Moving a plan to its current status is a no-op
//! and is handled before the graph is consulted.

use chrono::{DateTime, Utc};

use coachline_db::models::AssignmentStatus;

/// Whether `from -> to` is an edge in the graph.
pub fn is_valid_transition(from: AssignmentStatus, to: AssignmentStatus) -> bool {
    matches!(
        (from, to),
        (AssignmentStatus::Active, AssignmentStatus::Completed)
            | (AssignmentStatus::Active, AssignmentStatus::Inactive)
            | (AssignmentStatus::Inactive, AssignmentStatus::Active)
            | (AssignmentStatus::Inactive, AssignmentStatus::Completed)
    )
}

/// `completed_at` value a plan carries after entering `to`.
pub fn completed_at_for(to: AssignmentStatus, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match to {
        AssignmentStatus::Completed => Some(now),
        AssignmentStatus::Active | AssignmentStatus::Inactive => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use AssignmentStatus::{Active, Completed, Inactive};

    const ALL: [AssignmentStatus; 3] = [Active, Inactive, Completed];

    #[test]
    fn allowed_edges() {
        assert!(is_valid_transition(Active, Completed));
        assert!(is_valid_transition(Active, Inactive));
        assert!(is_valid_transition(Inactive, Active));
        assert!(is_valid_transition(Inactive, Completed));
    }

    #[test]
    fn completed_is_terminal() {
        for to in ALL {
            assert!(!is_valid_transition(Completed, to), "completed -> {to}");
        }
    }

    #[test]
    fn self_loops_are_not_edges() {
        for s in ALL {
            assert!(!is_valid_transition(s, s));
        }
    }

    #[test]
    fn only_completion_stamps_completed_at() {
        let now = Utc::now();
        assert_eq!(completed_at_for(Completed, now), Some(now));
        assert_eq!(completed_at_for(Active, now), None);
        assert_eq!(completed_at_for(Inactive, now), None);
    }
}
