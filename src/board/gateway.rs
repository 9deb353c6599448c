use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::models::{EntityKind, RemoteId};
use super::remote::{CardPatch, CreateCard, CreateList, RawBoard, RawCard, RawList};
use crate::errors::GatewayError;

/// Remote persistence boundary consumed by `OptimisticStore`.
/// Real implementation: `FileGateway`. Test double: `InMemoryGateway`.
///
/// Every method takes `RemoteId`s only and answers with raw records;
/// normalization is the caller's job.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn fetch_board(&self) -> Result<RawBoard, GatewayError>;

    async fn create_list(&self, request: CreateList) -> Result<RawList, GatewayError>;

    async fn create_card(&self, request: CreateCard) -> Result<RawCard, GatewayError>;

    async fn update_card(&self, id: &RemoteId, patch: CardPatch) -> Result<RawCard, GatewayError>;

    /// Removes the list and every card in it.
    async fn delete_list(&self, id: &RemoteId) -> Result<(), GatewayError>;

    async fn delete_card(&self, id: &RemoteId) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOp {
    FetchBoard,
    CreateList,
    CreateCard,
    UpdateCard,
    DeleteList,
    DeleteCard,
}

impl GatewayOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchBoard => "fetch_board",
            Self::CreateList => "create_list",
            Self::CreateCard => "create_card",
            Self::UpdateCard => "update_card",
            Self::DeleteList => "delete_list",
            Self::DeleteCard => "delete_card",
        }
    }
}

impl fmt::Display for GatewayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Shared record keeping ─────────────────────────────────────────────

/// The backing records a simple gateway serves. Ids are `srv-<n>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteState {
    pub board: RawBoard,
    pub next_id: u64,
}

impl RemoteState {
    pub fn new(board_title: &str) -> Self {
        let now = timestamp_now();
        Self {
            board: RawBoard {
                id: "board-1".to_string(),
                title: Some(board_title.to_string()),
                lists: Vec::new(),
                created_at: Some(now.clone()),
                updated_at: Some(now),
            },
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> String {
        let id = format!("srv-{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn list_mut(&mut self, id: &RemoteId) -> Result<&mut RawList, GatewayError> {
        self.board
            .lists
            .iter_mut()
            .find(|l| l.id == id.as_str())
            .ok_or_else(|| GatewayError::NotFound {
                kind: EntityKind::List,
                id: id.to_string(),
            })
    }

    fn card_location(&self, id: &RemoteId) -> Result<(usize, usize), GatewayError> {
        self.board
            .lists
            .iter()
            .enumerate()
            .find_map(|(li, list)| {
                list.cards
                    .iter()
                    .position(|c| c.id == id.as_str())
                    .map(|ci| (li, ci))
            })
            .ok_or_else(|| GatewayError::NotFound {
                kind: EntityKind::Card,
                id: id.to_string(),
            })
    }

    pub fn create_list(&mut self, request: CreateList) -> RawList {
        let now = timestamp_now();
        let list = RawList {
            id: self.allocate_id(),
            title: Some(request.title),
            position: Some(self.board.lists.len() as i64),
            cards: Vec::new(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        self.board.lists.push(list.clone());
        list
    }

    pub fn create_card(&mut self, request: CreateCard) -> Result<RawCard, GatewayError> {
        let id = self.allocate_id();
        let now = timestamp_now();
        let list = self.list_mut(&request.list_id)?;
        let card = RawCard {
            id,
            title: Some(request.title),
            description: Some(String::new()),
            position: Some(list.cards.len() as i64),
            list_id: Some(request.list_id.to_string()),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        list.cards.push(card.clone());
        Ok(card)
    }

    /// Apply a patch. A new `list_id` moves the record; cards in every touched
    /// list are kept sorted by their stored position.
    pub fn update_card(&mut self, id: &RemoteId, patch: CardPatch) -> Result<RawCard, GatewayError> {
        let (li, ci) = self.card_location(id)?;
        let target = match &patch.list_id {
            Some(list_id) if list_id.as_str() != self.board.lists[li].id => {
                let target = self
                    .board
                    .lists
                    .iter()
                    .position(|l| l.id == list_id.as_str())
                    .ok_or_else(|| GatewayError::NotFound {
                        kind: EntityKind::List,
                        id: list_id.to_string(),
                    })?;
                let card = self.board.lists[li].cards.remove(ci);
                self.board.lists[target].cards.push(card);
                target
            }
            _ => li,
        };

        let cards = &mut self.board.lists[target].cards;
        let card = cards
            .iter_mut()
            .find(|c| c.id == id.as_str())
            .ok_or_else(|| GatewayError::NotFound {
                kind: EntityKind::Card,
                id: id.to_string(),
            })?;
        if let Some(list_id) = patch.list_id {
            card.list_id = Some(list_id.to_string());
        }
        if let Some(position) = patch.position {
            card.position = Some(i64::from(position));
        }
        if let Some(title) = patch.title {
            card.title = Some(title);
        }
        if let Some(description) = patch.description {
            card.description = Some(description);
        }
        card.updated_at = Some(timestamp_now());
        let updated = card.clone();

        for index in [li, target] {
            self.board.lists[index]
                .cards
                .sort_by_key(|c| c.position.unwrap_or(i64::MAX));
        }
        Ok(updated)
    }

    pub fn delete_list(&mut self, id: &RemoteId) -> Result<(), GatewayError> {
        let before = self.board.lists.len();
        self.board.lists.retain(|l| l.id != id.as_str());
        if self.board.lists.len() == before {
            return Err(GatewayError::NotFound {
                kind: EntityKind::List,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_card(&mut self, id: &RemoteId) -> Result<(), GatewayError> {
        let (li, ci) = self.card_location(id)?;
        self.board.lists[li].cards.remove(ci);
        Ok(())
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ── In-memory gateway ─────────────────────────────────────────────────

#[derive(Default)]
struct FailurePlan {
    next: HashSet<GatewayOp>,
    card_updates: HashSet<RemoteId>,
}

/// Gateway that keeps its records in memory.
///
/// Used by tests and for embedding the store without a backing service.
/// Supports one-shot failure injection per operation, persistent failure
/// of updates to chosen cards, and an optional gate that holds every call
/// until released.
pub struct InMemoryGateway {
    state: Mutex<RemoteState>,
    failures: Mutex<FailurePlan>,
    updates: Mutex<Vec<(RemoteId, CardPatch)>>,
    gate: Option<Arc<Notify>>,
}

impl InMemoryGateway {
    pub fn new(board_title: &str) -> Self {
        Self::from_state(RemoteState::new(board_title))
    }

    pub fn from_state(state: RemoteState) -> Self {
        Self {
            state: Mutex::new(state),
            failures: Mutex::new(FailurePlan::default()),
            updates: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call waits for one `notify_one` on `gate` before running.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Fail the next call of `op` with `GatewayError::Unavailable`.
    pub fn fail_next(&self, op: GatewayOp) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.next.insert(op);
        }
    }

    /// Reject every update addressed to `id`.
    pub fn fail_card_update(&self, id: RemoteId) {
        if let Ok(mut plan) = self.failures.lock() {
            plan.card_updates.insert(id);
        }
    }

    /// Every update call received so far, in arrival order.
    pub fn recorded_updates(&self) -> Vec<(RemoteId, CardPatch)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Result<RawBoard, GatewayError> {
        self.with_state(|state| Ok(state.board.clone()))
    }

    async fn enter(&self, op: GatewayOp) -> Result<(), GatewayError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut plan = self
            .failures
            .lock()
            .map_err(|_| GatewayError::Unavailable("failure plan lock poisoned".into()))?;
        if plan.next.remove(&op) {
            return Err(GatewayError::Unavailable(format!("injected {} failure", op)));
        }
        Ok(())
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut RemoteState) -> Result<R, GatewayError>,
    ) -> Result<R, GatewayError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::Unavailable("gateway state lock poisoned".into()))?;
        f(&mut state)
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn fetch_board(&self) -> Result<RawBoard, GatewayError> {
        self.enter(GatewayOp::FetchBoard).await?;
        self.snapshot()
    }

    async fn create_list(&self, request: CreateList) -> Result<RawList, GatewayError> {
        self.enter(GatewayOp::CreateList).await?;
        self.with_state(|state| Ok(state.create_list(request)))
    }

    async fn create_card(&self, request: CreateCard) -> Result<RawCard, GatewayError> {
        self.enter(GatewayOp::CreateCard).await?;
        self.with_state(|state| state.create_card(request))
    }

    async fn update_card(&self, id: &RemoteId, patch: CardPatch) -> Result<RawCard, GatewayError> {
        self.enter(GatewayOp::UpdateCard).await?;
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((id.clone(), patch.clone()));
        }
        let rejected = self
            .failures
            .lock()
            .map(|plan| plan.card_updates.contains(id))
            .unwrap_or(false);
        if rejected {
            return Err(GatewayError::Rejected {
                op: GatewayOp::UpdateCard,
                message: format!("card {} is locked", id),
            });
        }
        self.with_state(|state| state.update_card(id, patch))
    }

    async fn delete_list(&self, id: &RemoteId) -> Result<(), GatewayError> {
        self.enter(GatewayOp::DeleteList).await?;
        self.with_state(|state| state.delete_list(id))
    }

    async fn delete_card(&self, id: &RemoteId) -> Result<(), GatewayError> {
        self.enter(GatewayOp::DeleteCard).await?;
        self.with_state(|state| state.delete_card(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_card(list: &RawList, title: &str) -> CreateCard {
        CreateCard {
            title: title.to_string(),
            list_id: RemoteId::new(list.id.clone()),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_server_ids_and_positions() {
        let gw = InMemoryGateway::new("Board");
        let list = gw
            .create_list(CreateList {
                title: "Todo".into(),
            })
            .await
            .unwrap();
        assert_eq!(list.id, "srv-1");
        assert_eq!(list.position, Some(0));

        let a = gw.create_card(request_card(&list, "a")).await.unwrap();
        let b = gw.create_card(request_card(&list, "b")).await.unwrap();
        assert_eq!(a.id, "srv-2");
        assert_eq!(b.position, Some(1));
        assert_eq!(b.list_id.as_deref(), Some("srv-1"));
        assert!(b.created_at.as_deref().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_create_card_in_unknown_list_is_not_found() {
        let gw = InMemoryGateway::new("Board");
        let err = gw
            .create_card(CreateCard {
                title: "x".into(),
                list_id: RemoteId::new("srv-404"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { kind: EntityKind::List, .. }));
    }

    #[tokio::test]
    async fn test_update_card_moves_between_lists() {
        let gw = InMemoryGateway::new("Board");
        let a = gw.create_list(CreateList { title: "A".into() }).await.unwrap();
        let b = gw.create_list(CreateList { title: "B".into() }).await.unwrap();
        let card = gw.create_card(request_card(&a, "card")).await.unwrap();

        let updated = gw
            .update_card(
                &RemoteId::new(card.id.clone()),
                CardPatch::placement(RemoteId::new(b.id.clone()), 0),
            )
            .await
            .unwrap();
        assert_eq!(updated.list_id.as_deref(), Some(b.id.as_str()));

        let board = gw.snapshot().unwrap();
        assert!(board.lists[0].cards.is_empty());
        assert_eq!(board.lists[1].cards.len(), 1);
        assert_eq!(gw.recorded_updates().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_list_cascades() {
        let gw = InMemoryGateway::new("Board");
        let list = gw.create_list(CreateList { title: "A".into() }).await.unwrap();
        gw.create_card(request_card(&list, "x")).await.unwrap();
        gw.delete_list(&RemoteId::new(list.id.clone())).await.unwrap();
        assert!(gw.snapshot().unwrap().lists.is_empty());

        let err = gw.delete_list(&RemoteId::new(list.id)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let gw = InMemoryGateway::new("Board");
        gw.fail_next(GatewayOp::CreateList);
        assert!(gw.create_list(CreateList { title: "A".into() }).await.is_err());
        assert!(gw.create_list(CreateList { title: "A".into() }).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_card_update_rejects_but_records() {
        let gw = InMemoryGateway::new("Board");
        let list = gw.create_list(CreateList { title: "A".into() }).await.unwrap();
        let card = gw.create_card(request_card(&list, "x")).await.unwrap();
        let id = RemoteId::new(card.id);
        gw.fail_card_update(id.clone());

        let err = gw
            .update_card(&id, CardPatch::placement(RemoteId::new(list.id), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { op: GatewayOp::UpdateCard, .. }));
        assert_eq!(gw.recorded_updates().len(), 1);
    }

    #[test]
    fn test_gateway_op_display() {
        assert_eq!(GatewayOp::DeleteCard.to_string(), "delete_card");
        assert_eq!(GatewayOp::FetchBoard.as_str(), "fetch_board");
    }
}
