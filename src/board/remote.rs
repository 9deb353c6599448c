//! Raw shapes exchanged with the remote gateway.
//!
//! These structs mirror what the backing store sends and accepts: loose
//! field naming (`list_id` or `listId`), string timestamps, and optional
//! fields everywhere. Nothing outside `EntityFactory::*_from_remote`
//! should read them; the rest of the crate works with the normalized
//! entities in `models`.

use serde::{Deserialize, Serialize};

use super::models::RemoteId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCard {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(
        default,
        alias = "listId",
        alias = "listID",
        skip_serializing_if = "Option::is_none"
    )]
    pub list_id: Option<String>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawList {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default)]
    pub cards: Vec<RawCard>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBoard {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub lists: Vec<RawList>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ── Request payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateList {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCard {
    pub title: String,
    pub list_id: RemoteId,
}

/// Partial card update. Only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<RemoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CardPatch {
    /// Patch sent for every sibling touched by a move.
    pub fn placement(list_id: RemoteId, position: i32) -> Self {
        Self {
            list_id: Some(list_id),
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list_id.is_none()
            && self.position.is_none()
            && self.title.is_none()
            && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_card_accepts_camel_case_keys() {
        let raw: RawCard = serde_json::from_str(
            r#"{"id":"c1","title":"x","listId":"L1","createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(raw.list_id.as_deref(), Some("L1"));
        assert_eq!(raw.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(raw.updated_at.is_none());
    }

    #[test]
    fn test_raw_list_defaults_missing_cards() {
        let raw: RawList = serde_json::from_str(r#"{"id":"L1","title":"Todo"}"#).unwrap();
        assert!(raw.cards.is_empty());
        assert!(raw.position.is_none());
    }

    #[test]
    fn test_card_patch_omits_unset_fields() {
        let patch = CardPatch::placement(RemoteId::new("L2"), 3);
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"list_id":"L2","position":3}"#);
        assert!(!patch.is_empty());
        assert!(CardPatch::default().is_empty());
    }
}
