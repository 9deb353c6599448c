//! Optimistic board store.
//!
//! Every mutation is applied to local state first, under the state mutex and
//! without suspending, so callers (and `snapshot()`) see it before the
//! gateway answers. The gateway call happens after the lock is released;
//! its outcome then either confirms the local change or undoes it.
//!
//! | Operation       | Local first              | On gateway failure            |
//! |-----------------|--------------------------|-------------------------------|
//! | `create_*`      | append draft             | discard draft                 |
//! | `remove_*`      | splice out               | restore at original index     |
//! | `move_card`     | splice, renumber         | keep local order, `PartialMove` |
//! | `update_card_*` | mutate field             | (no gateway call)             |
//!
//! A draft removed while its create call is in flight never comes back: once
//! the gateway answers, its new record is deleted again and the create
//! returns `StoreError::Withdrawn`. A draft dragged to another slot while in
//! flight has its placement sent right after confirmation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::entity::{CardFields, EntityFactory, ListFields, NewCard, NewList};
use super::events::{EVENT_CHANNEL_CAPACITY, StoreEvent, broadcast_event};
use super::gateway::Gateway;
use super::models::{Board, Card, EntityKind, EntityRef, Lifecycle, List, RemoteId};
use super::order;
use super::remote::{CardPatch, CreateCard, CreateList};
use crate::errors::{GatewayError, StoreError};

/// Result of a successful `move_card`.
#[derive(Debug, Clone)]
pub struct MoveReport {
    /// The moved card as it sits after the move.
    pub card: Card,
    /// Distinct lists that were renumbered, source first.
    pub affected_lists: Vec<EntityRef>,
    /// Number of position updates sent to the gateway.
    pub updates_sent: usize,
}

struct StoreState {
    board: Board,
    pending_delete: HashSet<EntityRef>,
}

impl StoreState {
    fn confirm_list(&mut self, draft_id: &EntityRef, mut confirmed: List) -> Option<List> {
        let index = self.board.list_index(draft_id)?;
        let slot = &mut self.board.lists[index];
        confirmed.cards = std::mem::take(&mut slot.cards);
        for card in &mut confirmed.cards {
            card.list_id = confirmed.id.clone();
        }
        *slot = confirmed;
        order::reconcile(&mut self.board.lists);
        Some(self.board.lists[index].clone())
    }

    /// Swap the confirmed card in for its draft. The patch is set when the
    /// draft was dragged while in flight and the gateway placed it elsewhere.
    fn confirm_card(
        &mut self,
        draft_id: &EntityRef,
        mut confirmed: Card,
    ) -> Option<(Card, Option<CardPatch>)> {
        let (li, ci) = self.board.find_card(draft_id)?;
        let list = &mut self.board.lists[li];
        let remote_list = std::mem::replace(&mut confirmed.list_id, list.id.clone());
        let remote_position = confirmed.position;
        list.cards[ci] = confirmed;
        order::reconcile(&mut list.cards);
        let card = list.cards[ci].clone();

        let patch = match list.id.as_remote() {
            Some(local_list) if remote_list != list.id || remote_position != card.position => {
                Some(CardPatch::placement(local_list.clone(), card.position))
            }
            _ => None,
        };
        Some((card, patch))
    }

    fn discard_list(&mut self, list_id: &EntityRef) -> bool {
        match self.board.list_index(list_id) {
            Some(index) => {
                self.board.lists.remove(index);
                order::reconcile(&mut self.board.lists);
                true
            }
            None => false,
        }
    }

    fn discard_card(&mut self, card_id: &EntityRef) -> bool {
        match self.board.find_card(card_id) {
            Some((li, ci)) => {
                let cards = &mut self.board.lists[li].cards;
                cards.remove(ci);
                order::reconcile(cards);
                true
            }
            None => false,
        }
    }
}

/// Owns a board and keeps it in step with a remote gateway.
///
/// Cloning is cheap; clones share the same state, gateway and event channel.
#[derive(Clone)]
pub struct OptimisticStore {
    state: Arc<Mutex<StoreState>>,
    gateway: Arc<dyn Gateway>,
    events: broadcast::Sender<String>,
}

impl OptimisticStore {
    /// Wrap an existing board. Positions are renumbered and stale card
    /// back-references are repaired before the store takes ownership.
    pub fn new(mut board: Board, gateway: Arc<dyn Gateway>) -> Self {
        order::reconcile(&mut board.lists);
        for list in &mut board.lists {
            for card in &mut list.cards {
                if card.list_id != list.id {
                    warn!(card = %card.id, list = %list.id, "repairing stale list reference");
                    card.list_id = list.id.clone();
                }
            }
            order::reconcile(&mut list.cards);
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(StoreState {
                board,
                pending_delete: HashSet::new(),
            })),
            gateway,
            events,
        }
    }

    /// Fetch the board from the gateway, ordered by stored positions.
    pub async fn load(gateway: Arc<dyn Gateway>) -> Result<Self, StoreError> {
        let raw = gateway.fetch_board().await?;
        let mut board = EntityFactory::board_from_remote(raw)?;
        board.lists.sort_by_key(|l| l.position);
        for list in &mut board.lists {
            list.cards.sort_by_key(|c| c.position);
        }
        info!(
            board = %board.id,
            lists = board.lists.len(),
            cards = board.card_count(),
            "board loaded"
        );
        Ok(Self::new(board, gateway))
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// JSON-encoded `StoreEvent`s for every local and confirmed change.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Result<Board, StoreError> {
        Ok(self.state()?.board.clone())
    }

    pub fn lifecycle(&self, id: &EntityRef) -> Result<Option<Lifecycle>, StoreError> {
        let state = self.state()?;
        if state.pending_delete.contains(id) {
            return Ok(Some(Lifecycle::PendingDelete));
        }
        let present = state.board.list_index(id).is_some() || state.board.find_card(id).is_some();
        Ok(present.then(|| {
            if id.is_draft() {
                Lifecycle::Draft
            } else {
                Lifecycle::Confirmed
            }
        }))
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Lists ────────────────────────────────────────────────────────

    pub async fn create_list(&self, title: &str) -> Result<List, StoreError> {
        let draft = {
            let mut guard = self.state()?;
            let board = &mut guard.board;
            let draft = EntityFactory::create_list(NewList {
                title: title.to_string(),
                position: Some(board.lists.len() as i32),
            });
            let violations = EntityFactory::validate_list(&ListFields::from(&draft));
            if !violations.is_empty() {
                return Err(StoreError::Invalid {
                    kind: EntityKind::List,
                    violations,
                });
            }
            board.lists.push(draft.clone());
            draft
        };
        debug!(list = %draft.id, "draft list appended");
        broadcast_event(&self.events, &StoreEvent::ListCreated { list: draft.clone() });

        let request = CreateList {
            title: draft.title.clone(),
        };
        let outcome = match self.gateway.create_list(request).await {
            Ok(raw) => EntityFactory::list_from_remote(raw).map_err(StoreError::from),
            Err(e) => Err(StoreError::from(e)),
        };

        let confirmed = match outcome {
            Ok(confirmed) => confirmed,
            Err(err) => {
                self.state()?.discard_list(&draft.id);
                warn!(draft = %draft.id, error = %err, "list creation failed, draft discarded");
                broadcast_event(
                    &self.events,
                    &StoreEvent::ListDiscarded {
                        list_id: draft.id,
                        reason: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        let placed = self.state()?.confirm_list(&draft.id, confirmed.clone());
        let Some(list) = placed else {
            warn!(draft = %draft.id, list = %confirmed.id, "draft list removed while in flight, deleting gateway record");
            return Err(self.withdraw(EntityKind::List, draft.id, &confirmed.id).await);
        };
        info!(draft = %draft.id, list = %list.id, "list confirmed");
        broadcast_event(
            &self.events,
            &StoreEvent::ListConfirmed {
                draft_id: draft.id,
                list: list.clone(),
            },
        );
        Ok(list)
    }

    /// Remove a list and all of its cards. Returns `false` when the list is
    /// not on the board.
    pub async fn remove_list(&self, list_id: &EntityRef) -> Result<bool, StoreError> {
        let (removed, index) = {
            let mut guard = self.state()?;
            let state = &mut *guard;
            let Some(index) = state.board.list_index(list_id) else {
                warn!(list = %list_id, "remove_list: list not found, ignoring");
                return Ok(false);
            };
            let removed = state.board.lists.remove(index);
            order::reconcile(&mut state.board.lists);
            if !removed.id.is_draft() {
                state.pending_delete.insert(removed.id.clone());
            }
            (removed, index)
        };

        let Some(remote) = removed.id.as_remote().cloned() else {
            debug!(list = %list_id, "draft list removed locally");
            broadcast_event(&self.events, &StoreEvent::ListRemoved { list_id: removed.id });
            return Ok(true);
        };

        let result = self.gateway.delete_list(&remote).await;

        let mut guard = self.state()?;
        let state = &mut *guard;
        state.pending_delete.remove(&removed.id);
        match result {
            Ok(()) => {
                drop(guard);
                info!(list = %list_id, cards = removed.cards.len(), "list removed");
                broadcast_event(&self.events, &StoreEvent::ListRemoved { list_id: removed.id });
                Ok(true)
            }
            Err(err) => {
                let at = index.min(state.board.lists.len());
                state.board.lists.insert(at, removed);
                order::reconcile(&mut state.board.lists);
                let restored = state.board.lists[at].clone();
                drop(guard);
                warn!(list = %list_id, error = %err, "list delete failed, restored");
                broadcast_event(
                    &self.events,
                    &StoreEvent::ListRestored {
                        list: restored,
                        reason: err.to_string(),
                    },
                );
                Err(err.into())
            }
        }
    }

    // ── Cards ────────────────────────────────────────────────────────

    /// Append a card to `list_id`. Returns `None` when the list is not on
    /// the board, and `StoreError::Withdrawn` when the draft was removed
    /// before the gateway answered.
    pub async fn create_card(
        &self,
        list_id: &EntityRef,
        title: &str,
    ) -> Result<Option<Card>, StoreError> {
        let (draft, remote_list) = {
            let mut guard = self.state()?;
            let Some(list) = guard.board.list_mut(list_id) else {
                warn!(list = %list_id, "create_card: list not found, ignoring");
                return Ok(None);
            };
            let Some(remote_list) = list.id.as_remote().cloned() else {
                return Err(StoreError::Unconfirmed {
                    kind: EntityKind::List,
                    id: list_id.clone(),
                });
            };
            let draft = EntityFactory::create_card(NewCard {
                position: Some(list.cards.len() as i32),
                ..NewCard::new(list.id.clone(), title)
            });
            let violations = EntityFactory::validate_card(&CardFields::from(&draft));
            if !violations.is_empty() {
                return Err(StoreError::Invalid {
                    kind: EntityKind::Card,
                    violations,
                });
            }
            list.cards.push(draft.clone());
            (draft, remote_list)
        };
        debug!(card = %draft.id, list = %list_id, "draft card appended");
        broadcast_event(&self.events, &StoreEvent::CardCreated { card: draft.clone() });

        let request = CreateCard {
            title: draft.title.clone(),
            list_id: remote_list,
        };
        let outcome = match self.gateway.create_card(request).await {
            Ok(raw) => EntityFactory::card_from_remote(raw).map_err(StoreError::from),
            Err(e) => Err(StoreError::from(e)),
        };

        let confirmed = match outcome {
            Ok(confirmed) => confirmed,
            Err(err) => {
                self.state()?.discard_card(&draft.id);
                warn!(draft = %draft.id, error = %err, "card creation failed, draft discarded");
                broadcast_event(
                    &self.events,
                    &StoreEvent::CardDiscarded {
                        card_id: draft.id,
                        reason: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        let placed = self.state()?.confirm_card(&draft.id, confirmed.clone());
        let Some((card, patch)) = placed else {
            warn!(draft = %draft.id, card = %confirmed.id, "draft card removed while in flight, deleting gateway record");
            return Err(self.withdraw(EntityKind::Card, draft.id, &confirmed.id).await);
        };
        info!(draft = %draft.id, card = %card.id, "card confirmed");
        broadcast_event(
            &self.events,
            &StoreEvent::CardConfirmed {
                draft_id: draft.id,
                card: card.clone(),
            },
        );
        if let Some(patch) = patch {
            self.sync_placement(&card, patch).await?;
        }
        Ok(Some(card))
    }

    /// Delete the gateway record of a draft that was removed locally while
    /// its create call was in flight. A record that is already gone counts
    /// as deleted.
    async fn withdraw(
        &self,
        kind: EntityKind,
        draft: EntityRef,
        created: &EntityRef,
    ) -> StoreError {
        let Some(remote) = created.as_remote().cloned() else {
            return StoreError::Withdrawn { kind, draft };
        };
        let result = match kind {
            EntityKind::List => self.gateway.delete_list(&remote).await,
            _ => self.gateway.delete_card(&remote).await,
        };
        match result {
            Ok(()) | Err(GatewayError::NotFound { .. }) => {
                info!(draft = %draft, remote = %remote, "gateway record of removed draft deleted");
                StoreError::Withdrawn { kind, draft }
            }
            Err(source) => {
                warn!(draft = %draft, remote = %remote, error = %source, "gateway kept a record of a removed draft");
                StoreError::Orphaned {
                    kind,
                    draft,
                    remote,
                    source,
                }
            }
        }
    }

    /// Send the local placement of a card whose draft was moved while its
    /// create call was in flight.
    async fn sync_placement(&self, card: &Card, patch: CardPatch) -> Result<(), StoreError> {
        let Some(remote) = card.id.as_remote().cloned() else {
            return Ok(());
        };
        debug!(
            card = %card.id,
            list = %card.list_id,
            position = card.position,
            "draft moved while in flight, updating placement"
        );
        match self.gateway.update_card(&remote, patch).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(card = %card.id, error = %err, "placement update failed; gateway diverges from local order");
                broadcast_event(
                    &self.events,
                    &StoreEvent::MoveDiverged {
                        card_id: card.id.clone(),
                        failed: vec![remote.clone()],
                    },
                );
                Err(StoreError::PartialMove {
                    card: card.id.clone(),
                    attempted: 1,
                    failures: vec![(remote, err)],
                })
            }
        }
    }

    /// Remove one card. Returns `false` when the list or card is not on the board.
    pub async fn remove_card(
        &self,
        list_id: &EntityRef,
        card_id: &EntityRef,
    ) -> Result<bool, StoreError> {
        let (removed, index) = {
            let mut guard = self.state()?;
            let state = &mut *guard;
            let Some(list) = state.board.list_mut(list_id) else {
                warn!(list = %list_id, "remove_card: list not found, ignoring");
                return Ok(false);
            };
            let Some(index) = list.card_index(card_id) else {
                warn!(list = %list_id, card = %card_id, "remove_card: card not found, ignoring");
                return Ok(false);
            };
            let removed = list.cards.remove(index);
            order::reconcile(&mut list.cards);
            if !removed.id.is_draft() {
                state.pending_delete.insert(removed.id.clone());
            }
            (removed, index)
        };

        let Some(remote) = removed.id.as_remote().cloned() else {
            debug!(card = %card_id, "draft card removed locally");
            broadcast_event(
                &self.events,
                &StoreEvent::CardRemoved {
                    list_id: list_id.clone(),
                    card_id: removed.id,
                },
            );
            return Ok(true);
        };

        let result = self.gateway.delete_card(&remote).await;

        let mut guard = self.state()?;
        let state = &mut *guard;
        state.pending_delete.remove(&removed.id);
        match result {
            Ok(()) => {
                drop(guard);
                info!(list = %list_id, card = %card_id, "card removed");
                broadcast_event(
                    &self.events,
                    &StoreEvent::CardRemoved {
                        list_id: list_id.clone(),
                        card_id: removed.id,
                    },
                );
                Ok(true)
            }
            Err(err) => {
                let restored = state.board.list_mut(list_id).map(|list| {
                    let at = index.min(list.cards.len());
                    list.cards.insert(at, removed);
                    order::reconcile(&mut list.cards);
                    list.cards[at].clone()
                });
                drop(guard);
                match restored {
                    Some(card) => {
                        warn!(card = %card_id, error = %err, "card delete failed, restored");
                        broadcast_event(
                            &self.events,
                            &StoreEvent::CardRestored {
                                card,
                                reason: err.to_string(),
                            },
                        );
                    }
                    None => {
                        warn!(card = %card_id, list = %list_id, error = %err, "card delete failed and its list is gone");
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Drag the card at `card_index` of `from` into `to` at `new_index`
    /// (appending when `None` or past the end).
    ///
    /// Both lists are renumbered locally, then one position update per card
    /// in every affected list is sent concurrently. Failed updates are not
    /// rolled back: the local order stands and the divergence is reported as
    /// `StoreError::PartialMove`. Unknown lists or an out-of-range
    /// `card_index` make the call a no-op returning `None`.
    pub async fn move_card(
        &self,
        from: &EntityRef,
        to: &EntityRef,
        card_index: usize,
        new_index: Option<usize>,
    ) -> Result<Option<MoveReport>, StoreError> {
        let (moved, affected, patches) = {
            let mut guard = self.state()?;
            let board = &mut guard.board;
            let (Some(from_idx), Some(to_idx)) = (board.list_index(from), board.list_index(to))
            else {
                warn!(from = %from, to = %to, "move_card: list not found, ignoring");
                return Ok(None);
            };
            if card_index >= board.lists[from_idx].cards.len() {
                warn!(from = %from, card_index, "move_card: card index out of range, ignoring");
                return Ok(None);
            }
            if to.is_draft() {
                return Err(StoreError::Unconfirmed {
                    kind: EntityKind::List,
                    id: to.clone(),
                });
            }

            let mut card = board.lists[from_idx].cards.remove(card_index);
            card.list_id = board.lists[to_idx].id.clone();
            card.updated_at = Utc::now();
            let dest = &mut board.lists[to_idx].cards;
            let at = new_index.map_or(dest.len(), |i| i.min(dest.len()));
            dest.insert(at, card);

            let affected = order::affected_lists(from, to);
            order::reconcile_lists(board, &affected);
            let moved = board.lists[to_idx].cards[at].clone();
            let patches = placement_patches(board, &affected);
            (moved, affected, patches)
        };
        debug!(
            card = %moved.id,
            from = %from,
            to = %to,
            position = moved.position,
            updates = patches.len(),
            "card moved locally"
        );
        broadcast_event(
            &self.events,
            &StoreEvent::CardMoved {
                card_id: moved.id.clone(),
                from_list: from.clone(),
                to_list: to.clone(),
                position: moved.position,
            },
        );

        let attempted = patches.len();
        let gateway = &self.gateway;
        let results = join_all(patches.into_iter().map(|(id, patch)| async move {
            let result = gateway.update_card(&id, patch).await;
            (id, result)
        }))
        .await;

        let failures: Vec<_> = results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|e| (id, e)))
            .collect();
        if !failures.is_empty() {
            warn!(
                card = %moved.id,
                failed = failures.len(),
                attempted,
                "move partially applied; gateway diverges from local order"
            );
            broadcast_event(
                &self.events,
                &StoreEvent::MoveDiverged {
                    card_id: moved.id.clone(),
                    failed: failures.iter().map(|(id, _)| id.clone()).collect(),
                },
            );
            return Err(StoreError::PartialMove {
                card: moved.id,
                attempted,
                failures,
            });
        }

        Ok(Some(MoveReport {
            card: moved,
            affected_lists: affected,
            updates_sent: attempted,
        }))
    }

    /// Rename a card locally. Persisting the change is up to the caller.
    pub fn update_card_title(
        &self,
        card_id: &EntityRef,
        title: &str,
    ) -> Result<Option<Card>, StoreError> {
        self.update_card_with(card_id, |card| {
            let title = title.trim();
            let violations = EntityFactory::validate_card(&CardFields {
                title: Some(title.to_string()),
                ..CardFields::from(&*card)
            });
            if !violations.is_empty() {
                return Err(StoreError::Invalid {
                    kind: EntityKind::Card,
                    violations,
                });
            }
            card.title = title.to_string();
            Ok(())
        })
    }

    /// Replace a card's description locally. Persisting the change is up to the caller.
    pub fn update_card_description(
        &self,
        card_id: &EntityRef,
        description: &str,
    ) -> Result<Option<Card>, StoreError> {
        self.update_card_with(card_id, |card| {
            card.description = description.to_string();
            Ok(())
        })
    }

    fn update_card_with(
        &self,
        card_id: &EntityRef,
        apply: impl FnOnce(&mut Card) -> Result<(), StoreError>,
    ) -> Result<Option<Card>, StoreError> {
        let card = {
            let mut guard = self.state()?;
            let board = &mut guard.board;
            let Some((li, ci)) = board.find_card(card_id) else {
                warn!(card = %card_id, "update: card not found, ignoring");
                return Ok(None);
            };
            let card = &mut board.lists[li].cards[ci];
            apply(card)?;
            card.updated_at = Utc::now();
            card.clone()
        };
        broadcast_event(&self.events, &StoreEvent::CardUpdated { card: card.clone() });
        Ok(Some(card))
    }
}

/// One placement patch per confirmed card in each affected list.
fn placement_patches(board: &Board, lists: &[EntityRef]) -> Vec<(RemoteId, CardPatch)> {
    let mut patches = Vec::new();
    for list_id in lists {
        let Some(list) = board.list(list_id) else {
            continue;
        };
        let Some(remote_list) = list.id.as_remote() else {
            continue;
        };
        for card in &list.cards {
            match card.id.as_remote() {
                Some(id) => patches.push((
                    id.clone(),
                    CardPatch::placement(remote_list.clone(), card.position),
                )),
                None => debug!(card = %card.id, "skipping position update for draft card"),
            }
        }
    }
    patches
}
