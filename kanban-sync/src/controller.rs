//! Board controller
//!
//! Owns the loaded snapshot and the generation counter, turns drop events into
//! engine calls, and drives reload-on-failure.
//!
//! Phases run `Empty -> Loading -> Ready`. A successful optimistic move stays
//! in `Ready`; a failed one goes back through `Loading`. Every load bumps the
//! generation, and any response tagged with an older generation is dropped.
//!
//! Long-running work is split into a synchronous half that needs `&mut self`
//! and a future that does not, so the UI can keep applying gestures while a
//! write is in flight:
//!
//! ```ignore
//! if let Some(pending) = controller.apply_drop(&event)? {
//!     let outcome = pending.send().await;
//!     controller.reconcile(outcome).await?;
//! }
//! ```
//!
//! Card content calls follow the same shape through [`PendingCall`], so a
//! slow suggestion does not block dragging:
//!
//! ```ignore
//! let pending = controller.begin_refine(card, &agent)?;
//! let outcome = pending.send().await;
//! controller.finish_refine(outcome)?;
//! ```

use crate::activity::ActivityEntry;
use crate::engine::{PositionWrite, ReorderEngine};
use crate::error::{Result, SyncError};
use crate::gateway::{HttpGateway, RemoteGateway};
use crate::gesture::{DropEvent, Gesture};
use crate::logging::Pretty;
use crate::notice::Notice;
use crate::types::{
    Agent, AgentId, Board, BoardId, Card, CardDraft, CardId, CardPatch, ColumnId, ColumnPatch,
};
use futures::future::BoxFuture;
use kanban_sync_config::SyncConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Where the controller is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Empty,
    Loading,
    Ready,
}

/// What the UI renders from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub generation: u64,
    pub phase: Phase,
    pub board: Option<Board>,
}

/// A snapshot fetch issued under one generation
pub struct LoadTicket<G: RemoteGateway + ?Sized> {
    gateway: Arc<G>,
    board_id: BoardId,
    generation: u64,
}

impl<G: RemoteGateway + ?Sized> LoadTicket<G> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn fetch(self) -> LoadedBoard {
        let result = self.gateway.fetch_board(self.board_id).await;
        LoadedBoard {
            generation: self.generation,
            result,
        }
    }
}

/// A finished fetch, still tagged with the generation that issued it
#[derive(Debug)]
pub struct LoadedBoard {
    pub generation: u64,
    pub result: Result<Board>,
}

/// Position writes for an applied gesture, not yet sent
pub struct PendingWrite<G: RemoteGateway + ?Sized> {
    engine: ReorderEngine<G>,
    gesture: Gesture,
    writes: Vec<PositionWrite>,
    generation: u64,
}

impl<G: RemoteGateway + ?Sized> PendingWrite<G> {
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn writes(&self) -> &[PositionWrite] {
        &self.writes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn send(self) -> WriteOutcome {
        let result = self.engine.persist(&self.writes, self.generation).await;
        WriteOutcome {
            generation: self.generation,
            gesture: self.gesture,
            result,
        }
    }
}

/// The result of a [`PendingWrite`], tagged with the generation it was issued under
#[derive(Debug)]
pub struct WriteOutcome {
    pub generation: u64,
    pub gesture: Gesture,
    pub result: Result<()>,
}

/// What [`BoardController::settle`] decided about a write outcome
pub enum Settlement<G: RemoteGateway + ?Sized> {
    /// The write landed; the optimistic snapshot stands
    Persisted,
    /// The outcome belongs to a superseded snapshot and was dropped
    Stale,
    /// The write failed; the snapshot was discarded and must be refetched
    Reload(LoadTicket<G>),
}

/// A card content call issued under one generation, not yet sent.
///
/// Holds no borrow of the controller.
pub struct PendingCall<T> {
    generation: u64,
    request: BoxFuture<'static, Result<T>>,
}

impl<T> PendingCall<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn send(self) -> CallOutcome<T> {
        CallOutcome {
            generation: self.generation,
            result: self.request.await,
        }
    }
}

/// The result of a [`PendingCall`]
#[derive(Debug)]
pub struct CallOutcome<T> {
    pub generation: u64,
    pub result: Result<T>,
}

/// Text an agent generated for a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub card: CardId,
    pub agent: AgentId,
    pub text: String,
}

pub struct BoardController<G: RemoteGateway + ?Sized> {
    board_id: BoardId,
    gateway: Arc<G>,
    engine: ReorderEngine<G>,
    phase: Phase,
    snapshot: Option<Board>,
    generation: u64,
    default_agent: Option<AgentId>,
    notices: Vec<Notice>,
    view: watch::Sender<BoardView>,
}

impl BoardController<HttpGateway> {
    /// Controller talking HTTP, built from loaded configuration
    pub fn connect(board_id: BoardId, config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
        let mut controller = Self::new(board_id, gateway);
        controller.default_agent = config.default_agent.clone().map(AgentId::from);
        Ok(controller)
    }
}

impl<G: RemoteGateway + ?Sized> BoardController<G> {
    pub fn new(board_id: BoardId, gateway: Arc<G>) -> Self {
        let (view, _) = watch::channel(BoardView {
            generation: 0,
            phase: Phase::Empty,
            board: None,
        });
        Self {
            board_id,
            engine: ReorderEngine::new(Arc::clone(&gateway)),
            gateway,
            phase: Phase::Empty,
            snapshot: None,
            generation: 0,
            default_agent: None,
            notices: Vec::new(),
            view,
        }
    }

    /// Agent used by [`BoardController::refine_with_default`]
    pub fn with_default_agent(mut self, agent: impl Into<AgentId>) -> Self {
        self.default_agent = Some(agent.into());
        self
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> Option<&Board> {
        self.snapshot.as_ref()
    }

    /// Receive every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<BoardView> {
        self.view.subscribe()
    }

    /// Drain the notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.engine.recent_activity(limit).await
    }

    /// Discard the snapshot and start a new generation
    pub fn begin_load(&mut self) -> LoadTicket<G> {
        self.generation += 1;
        self.snapshot = None;
        self.phase = Phase::Loading;
        debug!(board = %self.board_id, generation = self.generation, "loading board");
        self.publish();
        LoadTicket {
            gateway: Arc::clone(&self.gateway),
            board_id: self.board_id,
            generation: self.generation,
        }
    }

    /// Install a fetched snapshot.
    ///
    /// Returns `Ok(false)` if the fetch was superseded by a later load. A failed
    /// fetch, or a snapshot that still breaks the ordering invariants after
    /// normalizing, leaves the controller `Empty` and is returned as the error.
    pub fn finish_load(&mut self, loaded: LoadedBoard) -> Result<bool> {
        if loaded.generation != self.generation {
            debug!("discarding board load: {}", self.stale(loaded.generation));
            return Ok(false);
        }

        match loaded.result {
            Ok(board) => {
                let board = board.normalized();
                if let Err(violation) = board.check_invariants() {
                    error!(
                        board = %self.board_id,
                        %violation,
                        "loaded board breaks ordering invariants"
                    );
                    self.notices.push(Notice::error(format!(
                        "Could not load the board: {}",
                        violation
                    )));
                    self.snapshot = None;
                    self.phase = Phase::Empty;
                    self.publish();
                    return Err(violation.into());
                }
                info!(
                    board = %self.board_id,
                    generation = self.generation,
                    columns = board.columns.len(),
                    cards = board.card_count(),
                    "board loaded"
                );
                trace!("snapshot {}", Pretty(&board));
                self.snapshot = Some(board);
                self.phase = Phase::Ready;
                self.publish();
                Ok(true)
            }
            Err(e) => {
                error!(board = %self.board_id, "failed to load board: {}", e);
                self.notices
                    .push(Notice::error(format!("Could not load the board: {}", e)));
                self.snapshot = None;
                self.phase = Phase::Empty;
                self.publish();
                Err(e)
            }
        }
    }

    /// Fetch and install a fresh snapshot
    pub async fn load(&mut self) -> Result<()> {
        let loaded = self.begin_load().fetch().await;
        self.finish_load(loaded).map(|_| ())
    }

    /// Decode and apply a drop event. Drops outside any target are ignored.
    pub fn apply_drop(&mut self, event: &DropEvent) -> Result<Option<PendingWrite<G>>> {
        match event.to_gesture() {
            Some(gesture) => self.apply_gesture(gesture),
            None => {
                trace!(?event, "ignoring drop without a target");
                Ok(None)
            }
        }
    }

    /// Apply a gesture to the snapshot immediately and hand back the writes
    /// that persist it.
    ///
    /// Returns `Ok(None)` while no snapshot is ready and for gestures that
    /// change nothing. A gesture whose source does not match the snapshot is
    /// logged and returned as an error without touching anything.
    pub fn apply_gesture(&mut self, gesture: Gesture) -> Result<Option<PendingWrite<G>>> {
        if self.phase != Phase::Ready {
            debug!(phase = ?self.phase, ?gesture, "ignoring gesture until the board is ready");
            if self.phase == Phase::Loading {
                self.notices.push(Notice::info("The board is still loading"));
            }
            return Ok(None);
        }
        let board = self.snapshot.as_ref().ok_or(SyncError::NoSnapshot)?;

        let plan = match self.engine.plan(board, &gesture) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                trace!(?gesture, "gesture leaves the board unchanged");
                return Ok(None);
            }
            Err(e) => {
                error!(?gesture, "invalid move: {}", e);
                return Err(e);
            }
        };

        debug_assert!(plan.board.check_invariants().is_ok());
        debug!(?gesture, writes = plan.writes.len(), "applied gesture");
        self.snapshot = Some(plan.board);
        self.publish();

        Ok(Some(PendingWrite {
            engine: self.engine.clone(),
            gesture,
            writes: plan.writes,
            generation: self.generation,
        }))
    }

    /// Decide what a write outcome means for the current snapshot
    pub fn settle(&mut self, outcome: WriteOutcome) -> Settlement<G> {
        if outcome.generation != self.generation {
            debug!(
                gesture = ?outcome.gesture,
                "discarding write outcome: {}",
                self.stale(outcome.generation)
            );
            return Settlement::Stale;
        }

        match outcome.result {
            Ok(()) => Settlement::Persisted,
            Err(e) => {
                warn!(gesture = ?outcome.gesture, "move not saved, reloading: {}", e);
                self.notices
                    .push(Notice::error("Could not save the move. Reloading the board."));
                Settlement::Reload(self.begin_load())
            }
        }
    }

    /// Settle a write outcome, reloading if it failed.
    ///
    /// Only an error from the reload itself is returned; the failed write is
    /// reported through a notice.
    pub async fn reconcile(&mut self, outcome: WriteOutcome) -> Result<()> {
        match self.settle(outcome) {
            Settlement::Persisted | Settlement::Stale => Ok(()),
            Settlement::Reload(ticket) => {
                let loaded = ticket.fetch().await;
                self.finish_load(loaded).map(|_| ())
            }
        }
    }

    /// Apply a drop event, persist it and reconcile
    pub async fn handle_drop(&mut self, event: &DropEvent) -> Result<()> {
        match self.apply_drop(event)? {
            Some(pending) => {
                let outcome = pending.send().await;
                self.reconcile(outcome).await
            }
            None => Ok(()),
        }
    }

    /// Create a column at the end of the board, then reload so the remote
    /// store's rank is picked up
    pub async fn create_column(&mut self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SyncError::invalid_value("title", "must not be empty"));
        }
        self.ready_snapshot()?;

        let result = self.gateway.create_column(self.board_id, title).await;
        match result {
            Ok(column) => {
                info!(column = %column.id, title, "column created");
                self.notices.push(Notice::success("Column created"));
                self.load().await
            }
            Err(e) => Err(self.fail("Could not create the column", e)),
        }
    }

    /// Rename or recolor a column. Shown immediately; reloaded if the remote
    /// store refuses.
    pub async fn update_column(&mut self, column: ColumnId, patch: &ColumnPatch) -> Result<()> {
        let local = self
            .snapshot_mut()?
            .columns
            .iter_mut()
            .find(|c| c.id == column)
            .ok_or(SyncError::ColumnNotFound { id: column })?;
        patch.apply_to(local);
        self.publish();

        let result = self.gateway.update_column(column, patch).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = self.fail("Could not update the column", e);
                if let Err(reload) = self.load().await {
                    warn!("reload after failed column update also failed: {}", reload);
                }
                Err(err)
            }
        }
    }

    /// Delete a card, then reload whatever happened
    pub async fn delete_card(&mut self, card: CardId) -> Result<()> {
        self.require_card(card)?;
        let result = self.gateway.delete_card(card).await;
        self.after_delete("Card deleted", "Could not delete the card", result)
            .await
    }

    /// Delete a column with all its cards, then reload whatever happened
    pub async fn delete_column(&mut self, column: ColumnId) -> Result<()> {
        self.require_column(column)?;
        let result = self.gateway.delete_column(column).await;
        self.after_delete("Column deleted", "Could not delete the column", result)
            .await
    }

    pub async fn list_agents(&mut self) -> Result<Vec<Agent>> {
        let result = self.gateway.list_agents().await;
        match result {
            Ok(agents) => Ok(agents),
            Err(e) => Err(self.fail("Could not list agents", e)),
        }
    }

    async fn after_delete(
        &mut self,
        done: &str,
        failed: &str,
        result: Result<()>,
    ) -> Result<()> {
        let outcome = match result {
            Ok(()) => {
                self.notices.push(Notice::success(done));
                Ok(())
            }
            Err(e) => Err(self.fail(failed, e)),
        };
        let reloaded = self.load().await;
        outcome.and(reloaded)
    }

    /// Log a failed remote call and raise a notice for it
    fn fail(&mut self, what: &str, e: SyncError) -> SyncError {
        error!("{}: {}", what, e);
        self.notices.push(Notice::error(format!("{}: {}", what, e)));
        e
    }

    fn stale(&self, issued: u64) -> SyncError {
        SyncError::StaleGeneration {
            issued,
            current: self.generation,
        }
    }

    fn publish(&self) {
        self.view.send_replace(BoardView {
            generation: self.generation,
            phase: self.phase,
            board: self.snapshot.clone(),
        });
    }

    fn ready_snapshot(&self) -> Result<&Board> {
        match (&self.phase, &self.snapshot) {
            (Phase::Ready, Some(board)) => Ok(board),
            _ => Err(SyncError::NoSnapshot),
        }
    }

    fn snapshot_mut(&mut self) -> Result<&mut Board> {
        match (&self.phase, &mut self.snapshot) {
            (Phase::Ready, Some(board)) => Ok(board),
            _ => Err(SyncError::NoSnapshot),
        }
    }

    fn require_card(&self, card: CardId) -> Result<()> {
        self.ready_snapshot()?
            .card(card)
            .map(|_| ())
            .ok_or(SyncError::CardNotFound { id: card })
    }

    fn require_column(&self, column: ColumnId) -> Result<()> {
        self.ready_snapshot()?
            .column(column)
            .map(|_| ())
            .ok_or(SyncError::ColumnNotFound { id: column })
    }

    fn card_mut(&mut self, card: CardId) -> Result<&mut Card> {
        self.snapshot_mut()?
            .columns
            .iter_mut()
            .flat_map(|c| c.cards.iter_mut())
            .find(|c| c.id == card)
            .ok_or(SyncError::CardNotFound { id: card })
    }
}

impl<G: RemoteGateway + ?Sized + 'static> BoardController<G> {
    /// Check a new card against the snapshot and issue the create call
    pub fn begin_create_card(
        &mut self,
        column: ColumnId,
        draft: &CardDraft,
    ) -> Result<PendingCall<Card>> {
        if draft.body.trim().is_empty() {
            return Err(SyncError::invalid_value("body", "must not be empty"));
        }
        self.require_column(column)?;

        let gateway = Arc::clone(&self.gateway);
        let draft = draft.clone();
        Ok(self.issue(async move {
            let result = gateway.create_card(column, &draft).await;
            result.map(|created| {
                let rank = created.rank;
                created.in_column(column, rank)
            })
        }))
    }

    /// Append a created card to the end of its column
    pub fn finish_create_card(&mut self, outcome: CallOutcome<Card>) -> Result<Card> {
        let created = self.accept(outcome, "Could not create the card")?;
        let column = created.column_id;
        let target = self
            .snapshot_mut()?
            .columns
            .iter_mut()
            .find(|c| c.id == column)
            .ok_or(SyncError::ColumnNotFound { id: column });
        let target = match target {
            Ok(target) => target,
            Err(e) => {
                debug!(card = %created.id, "dropping created card: {}", e);
                return Err(e);
            }
        };
        let card = created.in_column(column, target.cards.len());
        target.cards.push(card.clone());

        info!(card = %card.id, column = %column, "card created");
        self.notices.push(Notice::success("Card created"));
        self.publish();
        Ok(card)
    }

    /// Create a card at the end of `column`
    pub async fn create_card(&mut self, column: ColumnId, draft: &CardDraft) -> Result<Card> {
        let outcome = self.begin_create_card(column, draft)?.send().await;
        self.finish_create_card(outcome)
    }

    pub fn begin_update_card(
        &mut self,
        card: CardId,
        patch: &CardPatch,
    ) -> Result<PendingCall<Card>> {
        self.require_card(card)?;
        let gateway = Arc::clone(&self.gateway);
        let patch = patch.clone();
        Ok(self.issue(async move { gateway.update_card(card, &patch).await }))
    }

    /// Merge updated content into the card; its position is left alone
    pub fn finish_update_card(&mut self, outcome: CallOutcome<Card>) -> Result<Card> {
        let updated = self.accept(outcome, "Could not update the card")?;
        let local = self.present_card(updated.id, "update")?;
        local.title = updated.title;
        local.body = updated.body;
        local.deadline = updated.deadline;
        local.suggestion = updated.suggestion;
        let result = local.clone();

        self.notices.push(Notice::success("Card updated"));
        self.publish();
        Ok(result)
    }

    /// Update a card's content; its position is left alone
    pub async fn update_card(&mut self, card: CardId, patch: &CardPatch) -> Result<Card> {
        let outcome = self.begin_update_card(card, patch)?.send().await;
        self.finish_update_card(outcome)
    }

    /// Ask an agent for a suggestion. Gestures may be applied while it runs.
    pub fn begin_refine(
        &mut self,
        card: CardId,
        agent: &AgentId,
    ) -> Result<PendingCall<Suggestion>> {
        self.require_card(card)?;
        let gateway = Arc::clone(&self.gateway);
        let agent = agent.clone();
        debug!(card = %card, agent = %agent, "requesting suggestion");
        self.notices.push(Notice::info("Generating a suggestion"));
        Ok(self.issue(async move {
            let result = gateway.refine(card, &agent).await;
            result.map(|text| Suggestion { card, agent, text })
        }))
    }

    /// Store a suggestion on its card, wherever the card sits now
    pub fn finish_refine(&mut self, outcome: CallOutcome<Suggestion>) -> Result<Suggestion> {
        let suggestion = self.accept(outcome, "Could not generate a suggestion")?;
        self.present_card(suggestion.card, "suggestion")?.suggestion =
            Some(suggestion.text.clone());

        info!(
            card = %suggestion.card,
            agent = %suggestion.agent,
            chars = suggestion.text.len(),
            "suggestion stored"
        );
        self.notices.push(Notice::success("Suggestion ready"));
        self.publish();
        Ok(suggestion)
    }

    /// Ask an agent for a suggestion and store it on the card
    pub async fn refine_card(&mut self, card: CardId, agent: &AgentId) -> Result<String> {
        let outcome = self.begin_refine(card, agent)?.send().await;
        self.finish_refine(outcome).map(|s| s.text)
    }

    /// [`BoardController::refine_card`] with the configured default agent
    pub async fn refine_with_default(&mut self, card: CardId) -> Result<String> {
        let agent = self
            .default_agent
            .clone()
            .ok_or_else(|| SyncError::invalid_value("default_agent", "no default agent configured"))?;
        self.refine_card(card, &agent).await
    }

    fn issue<T>(
        &self,
        request: impl std::future::Future<Output = Result<T>> + Send + 'static,
    ) -> PendingCall<T> {
        PendingCall {
            generation: self.generation,
            request: Box::pin(request),
        }
    }

    /// Unwrap a call outcome issued under the current generation. Stale
    /// outcomes are dropped without a notice.
    fn accept<T>(&mut self, outcome: CallOutcome<T>, failed: &str) -> Result<T> {
        if outcome.generation != self.generation {
            let stale = self.stale(outcome.generation);
            debug!("discarding call outcome: {}", stale);
            return Err(stale);
        }
        outcome.result.map_err(|e| self.fail(failed, e))
    }

    /// The card a call result applies to, if it is still on the board
    fn present_card(&mut self, card: CardId, what: &str) -> Result<&mut Card> {
        let found = self.card_mut(card);
        if let Err(e) = &found {
            debug!(card = %card, "dropping {} result: {}", what, e);
        }
        found
    }
}
