//! Per-user push gating.

use database::{NotificationKind, User};

/// Decides whether a push should go out for a given user and kind.
///
/// A user opts out of a kind by storing an explicit `false` under that kind's
/// name. A missing entry, or anything other than `false`, means enabled.
pub struct PreferenceGate;

impl PreferenceGate {
    pub fn should_push(user: &User, kind: NotificationKind) -> bool {
        user.notification_preferences
            .get(kind.as_str())
            .copied()
            .unwrap_or(true)
    }
}
