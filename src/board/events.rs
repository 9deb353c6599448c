use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use super::models::{Card, EntityRef, List, RemoteId};

/// Capacity of the store's event channel. Slow subscribers see `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Store event types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    ListCreated {
        list: List,
    },
    ListConfirmed {
        draft_id: EntityRef,
        list: List,
    },
    ListDiscarded {
        list_id: EntityRef,
        reason: String,
    },
    ListRemoved {
        list_id: EntityRef,
    },
    ListRestored {
        list: List,
        reason: String,
    },
    CardCreated {
        card: Card,
    },
    CardConfirmed {
        draft_id: EntityRef,
        card: Card,
    },
    CardDiscarded {
        card_id: EntityRef,
        reason: String,
    },
    CardRemoved {
        list_id: EntityRef,
        card_id: EntityRef,
    },
    CardRestored {
        card: Card,
        reason: String,
    },
    CardMoved {
        card_id: EntityRef,
        from_list: EntityRef,
        to_list: EntityRef,
        position: i32,
    },
    CardUpdated {
        card: Card,
    },
    /// Some position updates of a move failed; the gateway no longer
    /// matches local order for the listed cards.
    MoveDiverged {
        card_id: EntityRef,
        failed: Vec<RemoteId>,
    },
}

pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &StoreEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json); // no receivers is fine
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize store event");
        }
    }
}
