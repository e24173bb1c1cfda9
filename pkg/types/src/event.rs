use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meta::{Keyed, ObjectKey};

/// Kind of change carried by a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Added => write!(f, "ADDED"),
            EventKind::Modified => write!(f, "MODIFIED"),
            EventKind::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Watch event as it travels over the wire. `payload` must be present for
/// ADDED and MODIFIED and is ignored for DELETED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent<T> {
    #[serde(default)]
    pub seq: u64,
    pub kind: EventKind,
    pub key: ObjectKey,
    #[serde(default = "Option::default")]
    pub payload: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{kind} event for {key} carries no payload")]
    MissingPayload { kind: EventKind, key: ObjectKey },
    #[error("{kind} event for {key} carries a payload keyed {payload_key}")]
    KeyMismatch {
        kind: EventKind,
        key: ObjectKey,
        payload_key: ObjectKey,
    },
}

/// A validated incremental change to one entity of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent<T> {
    Added { key: ObjectKey, payload: T },
    Modified { key: ObjectKey, payload: T },
    Deleted { key: ObjectKey },
}

impl<T> UpdateEvent<T> {
    pub fn key(&self) -> &ObjectKey {
        match self {
            UpdateEvent::Added { key, .. }
            | UpdateEvent::Modified { key, .. }
            | UpdateEvent::Deleted { key } => key,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            UpdateEvent::Added { .. } => EventKind::Added,
            UpdateEvent::Modified { .. } => EventKind::Modified,
            UpdateEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn deleted(key: ObjectKey) -> Self {
        UpdateEvent::Deleted { key }
    }
}

impl<T: Keyed> UpdateEvent<T> {
    pub fn added(payload: T) -> Self {
        UpdateEvent::Added {
            key: payload.key(),
            payload,
        }
    }

    pub fn modified(payload: T) -> Self {
        UpdateEvent::Modified {
            key: payload.key(),
            payload,
        }
    }
}

/// The event key must name the payload it carries; a mismatch would file
/// the payload under a key that later events for it never reach.
impl<T: Keyed> TryFrom<WatchEvent<T>> for UpdateEvent<T> {
    type Error = EventError;

    fn try_from(event: WatchEvent<T>) -> Result<Self, Self::Error> {
        let WatchEvent {
            kind, key, payload, ..
        } = event;
        let payload = match (kind, payload) {
            (EventKind::Deleted, _) => return Ok(UpdateEvent::Deleted { key }),
            (kind, None) => return Err(EventError::MissingPayload { kind, key }),
            (_, Some(payload)) => payload,
        };
        let payload_key = payload.key();
        if payload_key != key {
            return Err(EventError::KeyMismatch {
                kind,
                key,
                payload_key,
            });
        }
        Ok(match kind {
            EventKind::Added => UpdateEvent::Added { key, payload },
            _ => UpdateEvent::Modified { key, payload },
        })
    }
}

impl<T> UpdateEvent<T> {
    /// Wire form of this event, stamped with `seq`.
    pub fn into_watch_event(self, seq: u64) -> WatchEvent<T> {
        let kind = self.kind();
        let (key, payload) = match self {
            UpdateEvent::Added { key, payload } | UpdateEvent::Modified { key, payload } => {
                (key, Some(payload))
            }
            UpdateEvent::Deleted { key } => (key, None),
        };
        WatchEvent {
            seq,
            kind,
            key,
            payload,
        }
    }
}
