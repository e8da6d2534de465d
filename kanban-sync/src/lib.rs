//! Drag-and-reorder synchronization for kanban boards
//!
//! A board is a sequence of ranked columns, each holding ranked cards. The
//! crate keeps a local snapshot of one board, applies drag gestures to it
//! immediately, persists the result to a remote store, and reloads from the
//! remote store whenever a write fails.
//!
//! ## Layers
//!
//! - [`store`]: pure move primitives on [`Board`] (`move_card`, `move_column`,
//!   `normalize`, `check_invariants`)
//! - [`engine`]: plans a [`Gesture`] into a new snapshot plus position writes,
//!   and issues those writes through a [`RemoteGateway`]
//! - [`controller`]: owns the snapshot and the generation counter, decodes
//!   drop events, and reconciles failed writes by reloading
//! - [`gateway`]: the remote store contract, with an HTTP client and an
//!   in-memory implementation
//!
//! ## Usage
//!
//! ```ignore
//! use kanban_sync::{BoardController, BoardId, DropEvent};
//!
//! let config = kanban_sync_config::load_configuration()?;
//! let mut controller = BoardController::connect(BoardId::new(1), &config)?;
//! controller.load().await?;
//!
//! controller.handle_drop(&event).await?;
//! for notice in controller.take_notices() {
//!     println!("{}", notice);
//! }
//! ```

pub mod activity;
pub mod controller;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod gesture;
pub mod logging;
pub mod notice;
pub mod store;
pub mod types;

pub use activity::{ActivityEntry, ActivityLog};
pub use controller::{
    BoardController, BoardView, CallOutcome, LoadTicket, LoadedBoard, PendingCall, PendingWrite,
    Phase, Settlement, Suggestion, WriteOutcome,
};
pub use engine::{plan_move, MovePlan, PositionWrite, ReorderEngine};
pub use error::{Result, SyncError};
pub use gateway::{GatewayCall, GatewayOp, HttpGateway, InMemoryGateway, RemoteGateway};
pub use gesture::{DragKind, DropEvent, DropLocation, Gesture};
pub use logging::Pretty;
pub use notice::{Notice, NoticeLevel};
pub use store::{CardSlot, InvariantViolation};
pub use types::{
    Agent, AgentId, Board, BoardId, Card, CardDraft, CardId, CardPatch, Column, ColumnId,
    ColumnPatch, DEFAULT_COLUMN_COLOR,
};
