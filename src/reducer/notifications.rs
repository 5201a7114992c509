use chrono::{DateTime, Utc};

use crate::models::{AppState, Notification, NotificationLevel};

/// Appends unless the id is already present; the oldest entries fall off
/// once the list exceeds `max_notifications`.
pub(super) fn add(
    state: &mut AppState,
    id: &str,
    level: NotificationLevel,
    message: &str,
    timestamp: DateTime<Utc>,
) {
    if state.notifications.iter().any(|n| n.id == id) {
        return;
    }
    state.notifications.push(Notification {
        id: id.to_string(),
        level,
        message: message.to_string(),
        timestamp,
        read: false,
    });
    let max = state.settings.max_notifications;
    if state.notifications.len() > max {
        let excess = state.notifications.len() - max;
        state.notifications.drain(..excess);
    }
}

pub(super) fn mark_read(state: &mut AppState, id: &str) {
    if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
        n.read = true;
    }
}

pub(super) fn dismiss(state: &mut AppState, id: &str) {
    state.notifications.retain(|n| n.id != id);
}

pub(super) fn clear(state: &mut AppState) {
    state.notifications.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, sec).unwrap()
    }

    #[test]
    fn duplicate_ids_are_ignored() {
        let mut state = AppState::default();
        add(&mut state, "n1", NotificationLevel::Info, "first", at(0));
        add(&mut state, "n1", NotificationLevel::Error, "second", at(1));
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.notifications[0].message, "first");
    }

    #[test]
    fn cap_drops_oldest() {
        let mut state = AppState::default();
        state.settings.max_notifications = 2;
        for i in 0..3 {
            add(&mut state, &format!("n{i}"), NotificationLevel::Info, "m", at(i));
        }
        let ids: Vec<&str> = state.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
    }

    #[test]
    fn mark_read_and_dismiss() {
        let mut state = AppState::default();
        add(&mut state, "n1", NotificationLevel::Success, "done", at(0));
        mark_read(&mut state, "n1");
        assert!(state.notifications[0].read);
        dismiss(&mut state, "n1");
        assert!(state.notifications.is_empty());
    }
}
