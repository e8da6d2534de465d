//! The remote store the engine persists to
//!
//! Every call is fallible and may take arbitrarily long. Calls are not
//! transactional with each other: a column reorder issuing several position
//! writes can succeed partially.

mod http;
mod memory;
mod wire;

pub use http::HttpGateway;
pub use memory::{GatewayCall, GatewayOp, InMemoryGateway};

use crate::error::Result;
use crate::types::{
    Agent, AgentId, Board, BoardId, Card, CardDraft, CardId, CardPatch, Column, ColumnId,
    ColumnPatch,
};
use async_trait::async_trait;

/// Operations the remote store exposes
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch a full snapshot. Columns and cards carry their stored ranks but
    /// need not arrive sorted.
    async fn fetch_board(&self, board: BoardId) -> Result<Board>;

    /// Move a card to `index` within `column`. The store re-derives every
    /// sibling's rank from this one description.
    async fn set_card_position(&self, card: CardId, column: ColumnId, index: usize) -> Result<()>;

    /// Store a column's rank
    async fn set_column_position(&self, column: ColumnId, index: usize) -> Result<()>;

    /// Create a card at the end of `column`
    async fn create_card(&self, column: ColumnId, draft: &CardDraft) -> Result<Card>;

    async fn update_card(&self, card: CardId, patch: &CardPatch) -> Result<Card>;

    async fn delete_card(&self, card: CardId) -> Result<()>;

    /// Create a column at the end of `board`
    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column>;

    async fn update_column(&self, column: ColumnId, patch: &ColumnPatch) -> Result<Column>;

    /// Delete a column and every card in it
    async fn delete_column(&self, column: ColumnId) -> Result<()>;

    /// Suggestion agents available for [`RemoteGateway::refine`]
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Ask an agent to generate text for a card
    async fn refine(&self, card: CardId, agent: &AgentId) -> Result<String>;
}
