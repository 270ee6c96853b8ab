//! Event lifecycle
//!
//! The status workflow of an event. [`transition`] is the single place the
//! transition table lives; callers never set `status` directly.

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Cancelled,
        EventStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "DRAFT",
            EventStatus::Published => "PUBLISHED",
            EventStatus::Cancelled => "CANCELLED",
            EventStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admin action on an event's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StatusAction {
    Publish,
    Unpublish,
    Complete,
    Cancel,
    Restore,
    /// Reopen a completed event as draft or published
    Revert { to: EventStatus },
}

impl std::fmt::Display for StatusAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusAction::Publish => f.write_str("publish"),
            StatusAction::Unpublish => f.write_str("unpublish"),
            StatusAction::Complete => f.write_str("complete"),
            StatusAction::Cancel => f.write_str("cancel"),
            StatusAction::Restore => f.write_str("restore"),
            StatusAction::Revert { to } => write!(f, "revert to {}", to),
        }
    }
}

/// Apply an action to a status.
///
/// Dates are not consulted: completing a future event is allowed.
pub fn transition(from: EventStatus, action: StatusAction) -> Result<EventStatus, DomainError> {
    use EventStatus::*;

    let to = match (from, action) {
        (Draft, StatusAction::Publish) => Published,
        (Published, StatusAction::Unpublish) => Draft,
        (Published, StatusAction::Complete) => Completed,
        (Published | Draft, StatusAction::Cancel) => Cancelled,
        (Cancelled, StatusAction::Restore) => Draft,
        (Completed, StatusAction::Revert { to: target @ (Draft | Published) }) => target,
        _ => return Err(DomainError::InvalidTransition { from, action }),
    };

    Ok(to)
}

/// Actions that are valid from a status
pub fn available_actions(from: EventStatus) -> Vec<StatusAction> {
    let candidates = [
        StatusAction::Publish,
        StatusAction::Unpublish,
        StatusAction::Complete,
        StatusAction::Cancel,
        StatusAction::Restore,
        StatusAction::Revert { to: EventStatus::Draft },
        StatusAction::Revert { to: EventStatus::Published },
    ];
    candidates
        .into_iter()
        .filter(|action| transition(from, *action).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use EventStatus::*;
        let cases = [
            (Draft, StatusAction::Publish, Published),
            (Published, StatusAction::Unpublish, Draft),
            (Published, StatusAction::Complete, Completed),
            (Published, StatusAction::Cancel, Cancelled),
            (Draft, StatusAction::Cancel, Cancelled),
            (Cancelled, StatusAction::Restore, Draft),
            (Completed, StatusAction::Revert { to: Draft }, Draft),
            (Completed, StatusAction::Revert { to: Published }, Published),
        ];

        for (from, action, expected) in cases {
            assert_eq!(transition(from, action).unwrap(), expected, "{} / {}", from, action);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        use EventStatus::*;
        assert!(transition(Draft, StatusAction::Complete).is_err());
        assert!(transition(Cancelled, StatusAction::Publish).is_err());
        assert!(transition(Completed, StatusAction::Cancel).is_err());
        assert!(transition(Completed, StatusAction::Revert { to: Cancelled }).is_err());
        assert!(transition(Published, StatusAction::Revert { to: Draft }).is_err());

        let err = transition(Draft, StatusAction::Restore).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition { from: Draft, action: StatusAction::Restore }
        );
    }

    #[test]
    fn test_repeated_transitions_stay_closed() {
        // Walk every action from every reachable status a few rounds
        let mut frontier = vec![EventStatus::Draft];
        for _ in 0..4 {
            let mut next = Vec::new();
            for status in &frontier {
                for action in available_actions(*status) {
                    let to = transition(*status, action).unwrap();
                    assert!(EventStatus::ALL.contains(&to));
                    next.push(to);
                }
            }
            frontier = next;
        }
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(
            available_actions(EventStatus::Completed),
            vec![
                StatusAction::Revert { to: EventStatus::Draft },
                StatusAction::Revert { to: EventStatus::Published }
            ]
        );
        assert_eq!(available_actions(EventStatus::Cancelled), vec![StatusAction::Restore]);
    }

    #[test]
    fn test_action_json() {
        let action: StatusAction = serde_json::from_str(r#"{"action":"revert","to":"PUBLISHED"}"#).unwrap();
        assert_eq!(action, StatusAction::Revert { to: EventStatus::Published });

        let action: StatusAction = serde_json::from_str(r#"{"action":"publish"}"#).unwrap();
        assert_eq!(action, StatusAction::Publish);
    }
}
