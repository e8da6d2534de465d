//! In-process remote store
//!
//! Implements the same contract as the HTTP backend, including server-side
//! rank derivation for card moves, plus hooks for tests: scripted failures,
//! a record of every call, and a gate that holds chosen calls in flight.

use super::RemoteGateway;
use crate::error::{Result, SyncError};
use crate::types::{
    Agent, AgentId, Board, BoardId, Card, CardDraft, CardId, CardPatch, Column, ColumnId,
    ColumnPatch,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace};

/// Kinds of gateway call, used to script failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOp {
    FetchBoard,
    SetCardPosition,
    SetColumnPosition,
    CreateCard,
    UpdateCard,
    DeleteCard,
    CreateColumn,
    UpdateColumn,
    DeleteColumn,
    ListAgents,
    Refine,
}

impl GatewayOp {
    /// Position writes, the calls held back by [`InMemoryGateway::hold_writes`]
    pub fn is_position_write(self) -> bool {
        matches!(self, Self::SetCardPosition | Self::SetColumnPosition)
    }
}

/// A call as received by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GatewayCall {
    FetchBoard { board: BoardId },
    SetCardPosition { card: CardId, column: ColumnId, index: usize },
    SetColumnPosition { column: ColumnId, index: usize },
    CreateCard { column: ColumnId },
    UpdateCard { card: CardId },
    DeleteCard { card: CardId },
    CreateColumn { board: BoardId, title: String },
    UpdateColumn { column: ColumnId },
    DeleteColumn { column: ColumnId },
    ListAgents,
    Refine { card: CardId, agent: AgentId },
}

impl GatewayCall {
    pub fn op(&self) -> GatewayOp {
        match self {
            Self::FetchBoard { .. } => GatewayOp::FetchBoard,
            Self::SetCardPosition { .. } => GatewayOp::SetCardPosition,
            Self::SetColumnPosition { .. } => GatewayOp::SetColumnPosition,
            Self::CreateCard { .. } => GatewayOp::CreateCard,
            Self::UpdateCard { .. } => GatewayOp::UpdateCard,
            Self::DeleteCard { .. } => GatewayOp::DeleteCard,
            Self::CreateColumn { .. } => GatewayOp::CreateColumn,
            Self::UpdateColumn { .. } => GatewayOp::UpdateColumn,
            Self::DeleteColumn { .. } => GatewayOp::DeleteColumn,
            Self::ListAgents => GatewayOp::ListAgents,
            Self::Refine { .. } => GatewayOp::Refine,
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    boards: BTreeMap<BoardId, Board>,
    agents: Vec<Agent>,
    next_id: u64,
    failures: HashMap<GatewayOp, usize>,
    calls: Vec<GatewayCall>,
}

impl ServerState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn board_with_card(&mut self, card: CardId) -> Result<&mut Board> {
        self.boards
            .values_mut()
            .find(|b| b.card(card).is_some())
            .ok_or_else(|| not_found("card", card))
    }

    fn board_with_column(&mut self, column: ColumnId) -> Result<&mut Board> {
        self.boards
            .values_mut()
            .find(|b| b.column(column).is_some())
            .ok_or_else(|| not_found("column", column))
    }

    fn card_mut(&mut self, card: CardId) -> Result<&mut Card> {
        self.boards
            .values_mut()
            .flat_map(|b| b.columns.iter_mut())
            .flat_map(|c| c.cards.iter_mut())
            .find(|c| c.id == card)
            .ok_or_else(|| not_found("card", card))
    }

    fn column_mut(&mut self, column: ColumnId) -> Result<&mut Column> {
        self.boards
            .values_mut()
            .flat_map(|b| b.columns.iter_mut())
            .find(|c| c.id == column)
            .ok_or_else(|| not_found("column", column))
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> SyncError {
    SyncError::rejected(404, format!("{} {} not found", what, id))
}

/// Remote store held in process memory
#[derive(Debug)]
pub struct InMemoryGateway {
    state: Mutex<ServerState>,
    held: watch::Sender<HashSet<GatewayOp>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (held, _) = watch::channel(HashSet::new());
        Self {
            state: Mutex::new(ServerState::default()),
            held,
        }
    }

    /// Seed a board. Identifiers handed out later start above every id seen.
    pub fn with_board(mut self, board: Board) -> Self {
        let state = self.state.get_mut();
        let highest = board
            .columns
            .iter()
            .map(|c| c.id.get())
            .chain(board.columns.iter().flat_map(|c| c.cards.iter().map(|k| k.id.get())))
            .chain(std::iter::once(board.id.get()))
            .max()
            .unwrap_or(0);
        state.next_id = state.next_id.max(highest);
        state.boards.insert(board.id, board);
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.state.get_mut().agents.push(agent);
        self
    }

    /// Make the next `times` calls of kind `op` fail with a transport error
    pub async fn fail_next(&self, op: GatewayOp, times: usize) {
        let mut state = self.state.lock().await;
        *state.failures.entry(op).or_default() += times;
    }

    /// Every call received so far, in arrival order
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls of one kind received so far
    pub async fn calls_of(&self, op: GatewayOp) -> Vec<GatewayCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| c.op() == op)
            .collect()
    }

    /// Hold calls of kind `op` after they are recorded, until released
    pub fn hold(&self, op: GatewayOp) {
        self.held.send_modify(|held| {
            held.insert(op);
        });
    }

    pub fn release(&self, op: GatewayOp) {
        self.held.send_modify(|held| {
            held.remove(&op);
        });
    }

    /// Hold both kinds of position write
    pub fn hold_writes(&self) {
        self.held.send_modify(|held| {
            held.extend([GatewayOp::SetCardPosition, GatewayOp::SetColumnPosition]);
        });
    }

    pub fn release_writes(&self) {
        self.held.send_modify(|held| held.retain(|op| !op.is_position_write()));
    }

    /// The stored board exactly as the store holds it
    pub async fn board(&self, id: BoardId) -> Option<Board> {
        self.state.lock().await.boards.get(&id).cloned()
    }

    /// Overwrite a stored board, as a concurrent editor would
    pub async fn replace_board(&self, board: Board) {
        self.state.lock().await.boards.insert(board.id, board);
    }

    /// Record the call, wait while its kind is held, then consume
    /// any scripted failure
    async fn begin(&self, call: GatewayCall) -> Result<()> {
        let op = call.op();
        trace!(?call, "gateway call");
        self.state.lock().await.calls.push(call);

        let mut held = self.held.subscribe();
        held.wait_for(|held| !held.contains(&op))
            .await
            .map_err(|e| SyncError::transport(e.to_string()))?;

        let mut state = self.state.lock().await;
        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(?op, "injected gateway failure");
                return Err(SyncError::transport(format!("injected failure for {:?}", op)));
            }
        }
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn fetch_board(&self, board: BoardId) -> Result<Board> {
        self.begin(GatewayCall::FetchBoard { board }).await?;
        let state = self.state.lock().await;
        state
            .boards
            .get(&board)
            .cloned()
            .map(Board::normalized)
            .ok_or_else(|| not_found("board", board))
    }

    async fn set_card_position(&self, card: CardId, column: ColumnId, index: usize) -> Result<()> {
        self.begin(GatewayCall::SetCardPosition {
            card,
            column,
            index,
        })
        .await?;
        let mut state = self.state.lock().await;
        let board = state.board_with_card(card)?;
        if board.column(column).is_none() {
            return Err(not_found("column", column));
        }
        board.normalize();
        board.move_card(card, column, index)?;
        Ok(())
    }

    async fn set_column_position(&self, column: ColumnId, index: usize) -> Result<()> {
        self.begin(GatewayCall::SetColumnPosition { column, index })
            .await?;
        let mut state = self.state.lock().await;
        state.column_mut(column)?.rank = index;
        Ok(())
    }

    async fn create_card(&self, column: ColumnId, draft: &CardDraft) -> Result<Card> {
        self.begin(GatewayCall::CreateCard { column }).await?;
        let mut state = self.state.lock().await;
        let id = CardId::new(state.allocate_id());
        let board = state.board_with_column(column)?;
        board.normalize();
        let target = board
            .columns
            .iter_mut()
            .find(|c| c.id == column)
            .ok_or_else(|| not_found("column", column))?;

        let mut card = Card::new(id, draft.body.clone()).in_column(column, target.cards.len());
        card.title = draft.title.clone();
        card.deadline = draft.deadline;
        target.cards.push(card.clone());
        Ok(card)
    }

    async fn update_card(&self, card: CardId, patch: &CardPatch) -> Result<Card> {
        self.begin(GatewayCall::UpdateCard { card }).await?;
        let mut state = self.state.lock().await;
        let stored = state.card_mut(card)?;
        patch.apply_to(stored);
        Ok(stored.clone())
    }

    async fn delete_card(&self, card: CardId) -> Result<()> {
        self.begin(GatewayCall::DeleteCard { card }).await?;
        let mut state = self.state.lock().await;
        let board = state.board_with_card(card)?;
        for column in &mut board.columns {
            column.cards.retain(|c| c.id != card);
        }
        Ok(())
    }

    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
        self.begin(GatewayCall::CreateColumn {
            board,
            title: title.to_string(),
        })
        .await?;
        let mut state = self.state.lock().await;
        let id = ColumnId::new(state.allocate_id());
        let stored = state
            .boards
            .get_mut(&board)
            .ok_or_else(|| not_found("board", board))?;
        stored.normalize();
        let column = Column::new(id, title).with_rank(stored.columns.len());
        stored.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column(&self, column: ColumnId, patch: &ColumnPatch) -> Result<Column> {
        self.begin(GatewayCall::UpdateColumn { column }).await?;
        let mut state = self.state.lock().await;
        let stored = state.column_mut(column)?;
        patch.apply_to(stored);
        Ok(stored.clone())
    }

    async fn delete_column(&self, column: ColumnId) -> Result<()> {
        self.begin(GatewayCall::DeleteColumn { column }).await?;
        let mut state = self.state.lock().await;
        let board = state.board_with_column(column)?;
        board.columns.retain(|c| c.id != column);
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.begin(GatewayCall::ListAgents).await?;
        Ok(self.state.lock().await.agents.clone())
    }

    async fn refine(&self, card: CardId, agent: &AgentId) -> Result<String> {
        self.begin(GatewayCall::Refine {
            card,
            agent: agent.clone(),
        })
        .await?;
        let mut state = self.state.lock().await;
        let name = state
            .agents
            .iter()
            .find(|a| &a.id == agent)
            .map(|a| a.name.clone())
            .ok_or_else(|| not_found("agent", agent))?;
        let stored = state.card_mut(card)?;
        let text = format!("[{}] {}", name, stored.body);
        stored.suggestion = Some(text.clone());
        Ok(text)
    }
}
