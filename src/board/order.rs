//! Position reconciliation.
//!
//! After any structural change the affected sequences are renumbered so
//! that `items[i].position == i`. Splicing always happens first and the
//! renumbering second: a same-list drag would otherwise count the moved
//! card's old slot twice.

use super::models::{Board, Card, EntityRef, List};

/// Anything that carries a rank inside an ordered sequence.
pub trait Positioned {
    fn position(&self) -> i32;
    fn set_position(&mut self, position: i32);
}

impl Positioned for Card {
    fn position(&self) -> i32 {
        self.position
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }
}

impl Positioned for List {
    fn position(&self) -> i32 {
        self.position
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }
}

/// Renumber `items` in place. Returns how many positions actually changed.
pub fn reconcile<T: Positioned>(items: &mut [T]) -> usize {
    let mut changed = 0;
    for (index, item) in items.iter_mut().enumerate() {
        let position = index as i32;
        if item.position() != position {
            item.set_position(position);
            changed += 1;
        }
    }
    changed
}

pub fn is_contiguous<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as i32)
}

/// The distinct lists touched by a move, source first.
pub fn affected_lists(from: &EntityRef, to: &EntityRef) -> Vec<EntityRef> {
    if from == to {
        vec![from.clone()]
    } else {
        vec![from.clone(), to.clone()]
    }
}

/// Renumber the cards of every listed list once. Duplicates and ids that
/// are not on the board are skipped.
pub fn reconcile_lists(board: &mut Board, lists: &[EntityRef]) -> usize {
    let mut seen: Vec<&EntityRef> = Vec::with_capacity(lists.len());
    let mut changed = 0;
    for list_id in lists {
        if seen.contains(&list_id) {
            continue;
        }
        seen.push(list_id);
        if let Some(list) = board.list_mut(list_id) {
            changed += reconcile(&mut list.cards);
        }
    }
    changed
}
