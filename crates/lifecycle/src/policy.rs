//! Reminder audience policy.
//!
//! Deployments have run reminders both ways: blast everyone, or only nudge
//! the people who haven't acted yet. The audience is a configuration knob per
//! reminder type rather than a hard-coded choice.

/// Who a reminder goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAudience {
    /// Every approved user (or artist, for voting reminders).
    AllApproved,
    /// Only approved users who have not yet acted: not RSVP'd for session
    /// reminders, not voted in any category for voting reminders.
    NotYetActed,
}

impl ReminderAudience {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(ReminderAudience::AllApproved),
            "not_yet_acted" => Some(ReminderAudience::NotYetActed),
            _ => None,
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub session_reminder_audience: ReminderAudience,
    pub voting_reminder_audience: ReminderAudience,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            session_reminder_audience: ReminderAudience::AllApproved,
            voting_reminder_audience: ReminderAudience::NotYetActed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_values() {
        assert_eq!(ReminderAudience::parse("all"), Some(ReminderAudience::AllApproved));
        assert_eq!(
            ReminderAudience::parse("not_yet_acted"),
            Some(ReminderAudience::NotYetActed)
        );
        assert_eq!(ReminderAudience::parse("everyone"), None);
    }
}
