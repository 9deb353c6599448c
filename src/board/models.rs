use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three kinds of entity a board is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Board,
    List,
    Card,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::List => "list",
            Self::Card => "card",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "board" => Ok(Self::Board),
            "list" => Ok(Self::List),
            "card" => Ok(Self::Card),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

/// Identifier synthesized locally for an entity the gateway has not seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the remote gateway. The only id a gateway call accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an entity: either a local draft or a gateway-confirmed record.
///
/// Keeping the two apart in the type means a draft id can never be handed
/// to the gateway as if it were durable; `as_remote` is the only way to get
/// a `RemoteId` out of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Draft(LocalId),
    Confirmed(RemoteId),
}

impl EntityRef {
    pub fn draft(id: impl Into<String>) -> Self {
        Self::Draft(LocalId::new(id))
    }

    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(RemoteId::new(id))
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }

    pub fn as_remote(&self) -> Option<&RemoteId> {
        match self {
            Self::Draft(_) => None,
            Self::Confirmed(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft(id) => id.as_str(),
            Self::Confirmed(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft(id) => write!(f, "{} (draft)", id),
            Self::Confirmed(id) => write!(f, "{}", id),
        }
    }
}

impl From<RemoteId> for EntityRef {
    fn from(id: RemoteId) -> Self {
        Self::Confirmed(id)
    }
}

/// Where an entity sits in the optimistic lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Draft,
    Confirmed,
    PendingDelete,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::PendingDelete => "pending_delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: EntityRef,
    pub title: String,
    pub description: String,
    pub position: i32,
    pub list_id: EntityRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: EntityRef,
    pub title: String,
    pub position: i32,
    pub cards: Vec<Card>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl List {
    pub fn card_index(&self, card_id: &EntityRef) -> Option<usize> {
        self.cards.iter().position(|c| &c.id == card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: EntityRef,
    pub title: String,
    pub lists: Vec<List>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn list_index(&self, list_id: &EntityRef) -> Option<usize> {
        self.lists.iter().position(|l| &l.id == list_id)
    }

    pub fn list(&self, list_id: &EntityRef) -> Option<&List> {
        self.lists.iter().find(|l| &l.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: &EntityRef) -> Option<&mut List> {
        self.lists.iter_mut().find(|l| &l.id == list_id)
    }

    /// Locate a card anywhere on the board as `(list_index, card_index)`.
    pub fn find_card(&self, card_id: &EntityRef) -> Option<(usize, usize)> {
        self.lists
            .iter()
            .enumerate()
            .find_map(|(li, list)| list.card_index(card_id).map(|ci| (li, ci)))
    }

    pub fn card(&self, card_id: &EntityRef) -> Option<&Card> {
        self.find_card(card_id)
            .map(|(li, ci)| &self.lists[li].cards[ci])
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|l| l.cards.len()).sum()
    }

    /// Describe every broken structural invariant. Empty when the board is sound.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (li, list) in self.lists.iter().enumerate() {
            if list.position != li as i32 {
                problems.push(format!(
                    "list {} has position {} but sits at index {}",
                    list.id, list.position, li
                ));
            }
            if list.title.trim() != list.title {
                problems.push(format!("list {} title is not trimmed", list.id));
            }
            for (ci, card) in list.cards.iter().enumerate() {
                if card.position != ci as i32 {
                    problems.push(format!(
                        "card {} has position {} but sits at index {} of list {}",
                        card.id, card.position, ci, list.id
                    ));
                }
                if card.list_id != list.id {
                    problems.push(format!(
                        "card {} points at list {} but lives in list {}",
                        card.id, card.list_id, list.id
                    ));
                }
                if card.title.trim() != card.title {
                    problems.push(format!("card {} title is not trimmed", card.id));
                }
            }
        }
        problems
    }
}
