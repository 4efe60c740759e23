use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Event, User};

const CUSTOM_EVENT_TYPE: &str = "customEvent";

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueuedEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub custom_type: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Map<String, Value>>,
    pub client_date: u64,
}

impl QueuedEvent {
    pub(crate) fn from_event(user: &User, event: Event) -> Self {
        Self {
            event_type: CUSTOM_EVENT_TYPE,
            custom_type: event.event_type,
            user_id: user.user_id.clone(),
            target: event.target,
            value: event.value,
            meta_data: event.meta_data,
            client_date: event.date.unwrap_or_else(current_unix_timestamp_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserEventBatch {
    pub user: User,
    pub events: Vec<QueuedEvent>,
}

/// Groups queued events by user id, preserving first-seen user order.
pub(crate) fn batch_by_user(queued: Vec<(User, QueuedEvent)>) -> Vec<UserEventBatch> {
    let mut batches: Vec<UserEventBatch> = Vec::new();
    for (user, event) in queued {
        match batches
            .iter_mut()
            .find(|batch| batch.user.user_id == user.user_id)
        {
            Some(batch) => batch.events.push(event),
            None => batches.push(UserEventBatch {
                user,
                events: vec![event],
            }),
        }
    }
    batches
}
