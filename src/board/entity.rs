//! Entity construction, cloning, validation and remote normalization.
//!
//! `EntityFactory` is the only place that builds boards, lists and cards.
//! Locally built entities are always drafts; entities normalized from raw
//! gateway records are always confirmed.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{Board, Card, EntityKind, EntityRef, List, LocalId};
use super::remote::{RawBoard, RawCard, RawList};
use crate::errors::RemoteRecordError;

const RADIX36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// ── Construction parameters ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewCard {
    pub title: String,
    pub list_id: EntityRef,
    pub description: Option<String>,
    pub position: Option<i32>,
}

impl NewCard {
    pub fn new(list_id: EntityRef, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            list_id,
            description: None,
            position: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewList {
    pub title: String,
    pub position: Option<i32>,
}

impl NewList {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            position: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct CardOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub list_id: Option<EntityRef>,
}

#[derive(Debug, Clone, Default)]
pub struct ListOverrides {
    pub title: Option<String>,
    pub position: Option<i32>,
}

// ── Validation ────────────────────────────────────────────────────────

/// A single broken constraint on a card or list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("card must belong to a list")]
    MissingListId,

    #[error("position must be non-negative, got {0}")]
    NegativePosition(i64),
}

/// Partially-populated card as seen by validation. Absent fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct CardFields {
    pub title: Option<String>,
    pub list_id: Option<String>,
    pub position: Option<i64>,
}

impl From<&Card> for CardFields {
    fn from(card: &Card) -> Self {
        Self {
            title: Some(card.title.clone()),
            list_id: Some(card.list_id.as_str().to_string()),
            position: Some(i64::from(card.position)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFields {
    pub title: Option<String>,
    pub position: Option<i64>,
}

impl From<&List> for ListFields {
    fn from(list: &List) -> Self {
        Self {
            title: Some(list.title.clone()),
            position: Some(i64::from(list.position)),
        }
    }
}

fn title_violation(title: Option<&str>) -> Option<Violation> {
    match title {
        Some(t) if !t.trim().is_empty() => None,
        _ => Some(Violation::EmptyTitle),
    }
}

fn position_violation(position: Option<i64>) -> Option<Violation> {
    match position {
        Some(p) if p < 0 => Some(Violation::NegativePosition(p)),
        _ => None,
    }
}

// ── Factory ───────────────────────────────────────────────────────────

pub struct EntityFactory;

impl EntityFactory {
    pub fn create_card(params: NewCard) -> Card {
        let now = Utc::now();
        Card {
            id: EntityRef::Draft(generate_id(EntityKind::Card, now)),
            title: params.title.trim().to_string(),
            description: params.description.unwrap_or_default(),
            position: params.position.unwrap_or(0),
            list_id: params.list_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn create_list(params: NewList) -> List {
        let now = Utc::now();
        List {
            id: EntityRef::Draft(generate_id(EntityKind::List, now)),
            title: params.title.trim().to_string(),
            position: params.position.unwrap_or(0),
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn create_board(params: NewBoard) -> Board {
        let now = Utc::now();
        Board {
            id: EntityRef::Draft(generate_id(EntityKind::Board, now)),
            title: params.title.trim().to_string(),
            lists: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy a card under a fresh draft id, applying any overrides.
    pub fn clone_card(source: &Card, overrides: CardOverrides) -> Card {
        let now = Utc::now();
        Card {
            id: EntityRef::Draft(generate_id(EntityKind::Card, now)),
            title: overrides
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| source.title.clone()),
            description: overrides
                .description
                .unwrap_or_else(|| source.description.clone()),
            position: overrides.position.unwrap_or(source.position),
            list_id: overrides.list_id.unwrap_or_else(|| source.list_id.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Deep-copy a list. Every card is cloned too and re-pointed at the new list.
    pub fn clone_list(source: &List, overrides: ListOverrides) -> List {
        let now = Utc::now();
        let id = EntityRef::Draft(generate_id(EntityKind::List, now));
        let cards = source
            .cards
            .iter()
            .map(|card| {
                Self::clone_card(
                    card,
                    CardOverrides {
                        list_id: Some(id.clone()),
                        ..CardOverrides::default()
                    },
                )
            })
            .collect();
        List {
            id,
            title: overrides
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| source.title.clone()),
            position: overrides.position.unwrap_or(source.position),
            cards,
            created_at: now,
            updated_at: now,
        }
    }

    /// Collect every violated card constraint, in a fixed order.
    pub fn validate_card(fields: &CardFields) -> Vec<Violation> {
        let mut violations = Vec::new();
        violations.extend(title_violation(fields.title.as_deref()));
        if fields
            .list_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
        {
            violations.push(Violation::MissingListId);
        }
        violations.extend(position_violation(fields.position));
        violations
    }

    pub fn validate_list(fields: &ListFields) -> Vec<Violation> {
        let mut violations = Vec::new();
        violations.extend(title_violation(fields.title.as_deref()));
        violations.extend(position_violation(fields.position));
        violations
    }

    // ── Remote normalization ─────────────────────────────────────────

    /// Normalize a raw card record. A card without a list reference is rejected.
    pub fn card_from_remote(raw: RawCard) -> Result<Card, RemoteRecordError> {
        Self::normalize_card(raw, None)
    }

    /// Normalize a raw list and all of its cards. Nested cards that omit
    /// their list reference inherit the parent's id.
    pub fn list_from_remote(raw: RawList) -> Result<List, RemoteRecordError> {
        let id = require_id(EntityKind::List, &raw.id)?;
        let (created_at, updated_at) =
            normalize_timestamps(raw.created_at.as_deref(), raw.updated_at.as_deref())?;
        let cards = raw
            .cards
            .into_iter()
            .map(|card| Self::normalize_card(card, Some(&id)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(List {
            title: normalize_title(raw.title),
            position: normalize_position(raw.position),
            id,
            cards,
            created_at,
            updated_at,
        })
    }

    pub fn board_from_remote(raw: RawBoard) -> Result<Board, RemoteRecordError> {
        let id = require_id(EntityKind::Board, &raw.id)?;
        let (created_at, updated_at) =
            normalize_timestamps(raw.created_at.as_deref(), raw.updated_at.as_deref())?;
        let lists = raw
            .lists
            .into_iter()
            .map(Self::list_from_remote)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Board {
            id,
            title: normalize_title(raw.title),
            lists,
            created_at,
            updated_at,
        })
    }

    fn normalize_card(raw: RawCard, parent: Option<&EntityRef>) -> Result<Card, RemoteRecordError> {
        let id = require_id(EntityKind::Card, &raw.id)?;
        let list_id = match raw.list_id.as_deref().map(str::trim) {
            Some(list) if !list.is_empty() => EntityRef::confirmed(list),
            _ => parent.cloned().ok_or(RemoteRecordError::MissingField {
                kind: EntityKind::Card,
                field: "list_id",
            })?,
        };
        let (created_at, updated_at) =
            normalize_timestamps(raw.created_at.as_deref(), raw.updated_at.as_deref())?;
        Ok(Card {
            id,
            title: normalize_title(raw.title),
            description: raw.description.unwrap_or_default(),
            position: normalize_position(raw.position),
            list_id,
            created_at,
            updated_at,
        })
    }
}

fn require_id(kind: EntityKind, raw: &str) -> Result<EntityRef, RemoteRecordError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(RemoteRecordError::MissingField { kind, field: "id" });
    }
    Ok(EntityRef::confirmed(id))
}

fn normalize_title(raw: Option<String>) -> String {
    raw.map(|t| t.trim().to_string()).unwrap_or_default()
}

fn normalize_position(raw: Option<i64>) -> i32 {
    raw.unwrap_or(0).clamp(0, i64::from(i32::MAX)) as i32
}

fn normalize_timestamps(
    created: Option<&str>,
    updated: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), RemoteRecordError> {
    let created_at = match created {
        Some(value) => parse_timestamp("created_at", value)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    let updated_at = match updated {
        Some(value) => parse_timestamp("updated_at", value)?,
        None => created_at,
    };
    Ok((created_at, updated_at))
}

/// Parse an RFC 3339 timestamp, or the `YYYY-MM-DD HH:MM:SS` form SQLite's
/// `datetime('now')` produces (interpreted as UTC).
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, RemoteRecordError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| RemoteRecordError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

// ── Id generation ─────────────────────────────────────────────────────

/// Build a draft id: `<kind>-<millis base36>-<random base36>`.
///
/// Unique enough for one interactive session. Draft ids are replaced by
/// gateway ids on confirmation and must never be stored as durable keys.
pub fn generate_id(kind: EntityKind, at: DateTime<Utc>) -> LocalId {
    let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
    let (hi, lo) = Uuid::new_v4().as_u64_pair();
    LocalId::new(format!(
        "{}-{}-{}",
        kind.as_str(),
        to_radix36(millis),
        to_radix36(hi ^ lo)
    ))
}

fn to_radix36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(RADIX36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
