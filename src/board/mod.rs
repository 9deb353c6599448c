//! Board engine: lists of ordered cards kept in step with a remote gateway.
//!
//! ## Overview
//!
//! Local mutations are applied immediately and optimistically; the gateway
//! call that persists them runs afterwards and either confirms the change
//! (draft ids become server ids) or undoes it.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  ops   ┌──────────────────────────────────────────────────┐
//! │  Caller  │ ─────> │  store.rs  (OptimisticStore, MoveReport)         │
//! │  (CLI)   │ <───── │    ├─ entity.rs  (EntityFactory, Violation)      │
//! └──────────┘ events │    ├─ order.rs   (reconcile, affected_lists)     │
//!                     │    └─ events.rs  (StoreEvent, broadcast_event)   │
//!                     │         │                                        │
//!                     │         │ Gateway::{create,update,delete}_*      │
//!                     │         v                                        │
//!                     │  gateway.rs      (Gateway trait, InMemoryGateway)│
//!                     │  file_gateway.rs (FileGateway, JSON + flock)     │
//!                     └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                            |
//! |-----------|-----------------------------------------------------------|
//! | `models`  | `Board`, `List`, `Card`, `EntityRef` (draft vs confirmed) |
//! | `remote`  | Raw gateway records and request payloads                  |

pub mod entity;
pub mod events;
pub mod file_gateway;
pub mod gateway;
pub mod models;
pub mod order;
pub mod remote;
pub mod store;

pub use entity::{EntityFactory, NewBoard, NewCard, NewList, Violation};
pub use events::StoreEvent;
pub use file_gateway::FileGateway;
pub use gateway::{Gateway, GatewayOp, InMemoryGateway};
pub use models::{Board, Card, EntityKind, EntityRef, Lifecycle, List, LocalId, RemoteId};
pub use store::{MoveReport, OptimisticStore};
