//! Reorder engine
//!
//! Turns a gesture into a new snapshot plus the position writes that persist
//! it. Planning is pure; [`ReorderEngine::persist`] is the only place that
//! talks to the gateway.
//!
//! Card moves persist as a single move-to-index write and the remote store
//! re-derives sibling ranks. A column move persists one write per column whose
//! rank changed, issued concurrently; the move fails if any of them fails.

use crate::activity::{ActivityEntry, ActivityLog};
use crate::error::{Result, SyncError};
use crate::gateway::RemoteGateway;
use crate::gesture::Gesture;
use crate::store::CardSlot;
use crate::types::{Board, CardId, ColumnId};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One persistence call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum PositionWrite {
    Card {
        card: CardId,
        column: ColumnId,
        index: usize,
    },
    Column {
        column: ColumnId,
        index: usize,
    },
}

impl PositionWrite {
    /// Canonical op string used in the activity log
    pub fn op(&self) -> &'static str {
        match self {
            Self::Card { .. } => "move card",
            Self::Column { .. } => "move column",
        }
    }
}

/// The outcome of planning a gesture: the snapshot to show and what to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub board: Board,
    pub writes: Vec<PositionWrite>,
}

/// Plan a gesture against a snapshot.
///
/// Fails when the gesture's source does not match where the item actually
/// sits, or names an unknown card or column; the snapshot is never touched.
/// Returns `Ok(None)` when the gesture would leave the snapshot unchanged.
pub fn plan_move(board: &Board, gesture: &Gesture) -> Result<Option<MovePlan>> {
    check_source(board, gesture)?;
    if gesture.is_in_place() {
        return Ok(None);
    }
    match *gesture {
        Gesture::MoveCard { card, to, .. } => plan_card_move(board, card, to),
        Gesture::MoveColumn { column, to, .. } => plan_column_move(board, column, to),
    }
}

fn check_source(board: &Board, gesture: &Gesture) -> Result<()> {
    match *gesture {
        Gesture::MoveCard { card, from, to } => {
            let actual = board
                .locate_card(card)
                .ok_or(SyncError::CardNotFound { id: card })?;
            if actual != from {
                return Err(SyncError::PositionMismatch {
                    item: format!("card {}", card),
                    expected: from.to_string(),
                });
            }
            if board.column(to.column).is_none() {
                return Err(SyncError::ColumnNotFound { id: to.column });
            }
        }
        Gesture::MoveColumn { column, from, .. } => {
            let actual = board
                .column_position(column)
                .ok_or(SyncError::ColumnNotFound { id: column })?;
            if actual != from {
                return Err(SyncError::PositionMismatch {
                    item: format!("column {}", column),
                    expected: format!("index {}", from),
                });
            }
        }
    }
    Ok(())
}

fn plan_card_move(board: &Board, card: CardId, to: CardSlot) -> Result<Option<MovePlan>> {
    let mut next = board.clone();
    if !next.move_card(card, to.column, to.index)? {
        return Ok(None);
    }
    let landed = next
        .locate_card(card)
        .ok_or(SyncError::CardNotFound { id: card })?;

    Ok(Some(MovePlan {
        board: next,
        writes: vec![PositionWrite::Card {
            card,
            column: landed.column,
            index: landed.index,
        }],
    }))
}

fn plan_column_move(board: &Board, column: ColumnId, to: usize) -> Result<Option<MovePlan>> {
    let mut next = board.clone();
    if !next.move_column(column, to)? {
        return Ok(None);
    }

    let writes = next
        .columns
        .iter()
        .filter(|moved| board.column(moved.id).map(|c| c.rank) != Some(moved.rank))
        .map(|moved| PositionWrite::Column {
            column: moved.id,
            index: moved.rank,
        })
        .collect();

    Ok(Some(MovePlan {
        board: next,
        writes,
    }))
}

/// Issues position writes and records them in the activity log
pub struct ReorderEngine<G: RemoteGateway + ?Sized> {
    gateway: Arc<G>,
    activity: Arc<Mutex<ActivityLog>>,
}

impl<G: RemoteGateway + ?Sized> Clone for ReorderEngine<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            activity: Arc::clone(&self.activity),
        }
    }
}

impl<G: RemoteGateway + ?Sized> ReorderEngine<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            activity: Arc::new(Mutex::new(ActivityLog::default())),
        }
    }

    /// See [`plan_move`]
    pub fn plan(&self, board: &Board, gesture: &Gesture) -> Result<Option<MovePlan>> {
        plan_move(board, gesture)
    }

    /// Issue every write concurrently and wait for all of them.
    ///
    /// Returns the first failure if any write failed; writes that succeeded
    /// are not undone.
    pub async fn persist(&self, writes: &[PositionWrite], generation: u64) -> Result<()> {
        let results = join_all(
            writes
                .iter()
                .map(|write| self.persist_one(*write, generation)),
        )
        .await;

        let total = results.len();
        let mut failures = results.into_iter().filter_map(|r| r.err()).collect::<Vec<_>>();
        if failures.is_empty() {
            debug!(generation, writes = total, "position writes persisted");
            return Ok(());
        }

        warn!(
            generation,
            failed = failures.len(),
            writes = total,
            "position writes failed"
        );
        Err(failures.swap_remove(0))
    }

    async fn persist_one(&self, write: PositionWrite, generation: u64) -> Result<()> {
        let started = Instant::now();
        let result = match write {
            PositionWrite::Card {
                card,
                column,
                index,
            } => self.gateway.set_card_position(card, column, index).await,
            PositionWrite::Column { column, index } => {
                self.gateway.set_column_position(column, index).await
            }
        };

        let output = match &result {
            Ok(()) => json!({ "ok": true }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        let input = serde_json::to_value(write).unwrap_or_else(|e| {
            warn!(?write, "activity input not recorded: {}", e);
            Value::Null
        });
        let entry = ActivityEntry::new(
            write.op(),
            input,
            output,
            generation,
            started.elapsed().as_millis() as u64,
        );
        self.activity.lock().await.record(entry);

        result
    }

    /// Up to `limit` activity entries, newest first
    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.activity.lock().await.recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayOp, InMemoryGateway};
    use crate::types::{BoardId, Card, Column};

    fn board() -> Board {
        Board::new(BoardId::new(1), "Launch")
            .with_column(
                Column::new(ColumnId::new(1), "X")
                    .with_card(Card::new(CardId::new(10), "a"))
                    .with_card(Card::new(CardId::new(11), "b")),
            )
            .with_column(Column::new(ColumnId::new(2), "Y"))
            .with_column(Column::new(ColumnId::new(3), "Z"))
    }

    fn slot(column: u64, index: usize) -> CardSlot {
        CardSlot::new(ColumnId::new(column), index)
    }

    #[test]
    fn test_card_plan_issues_single_write() {
        let gesture = Gesture::move_card(CardId::new(10), slot(1, 0), slot(2, 0));
        let plan = plan_move(&board(), &gesture).unwrap().unwrap();
        assert_eq!(
            plan.writes,
            vec![PositionWrite::Card {
                card: CardId::new(10),
                column: ColumnId::new(2),
                index: 0
            }]
        );
        plan.board.check_invariants().unwrap();
    }

    #[test]
    fn test_card_plan_reports_clamped_index() {
        let gesture = Gesture::move_card(CardId::new(10), slot(1, 0), slot(1, 40));
        let plan = plan_move(&board(), &gesture).unwrap().unwrap();
        assert_eq!(
            plan.writes,
            vec![PositionWrite::Card {
                card: CardId::new(10),
                column: ColumnId::new(1),
                index: 1
            }]
        );
    }

    #[test]
    fn test_column_plan_writes_only_changed_ranks() {
        // [X, Y, Z] -> [Y, X, Z]: Z keeps rank 2
        let gesture = Gesture::move_column(ColumnId::new(1), 0, 1);
        let plan = plan_move(&board(), &gesture).unwrap().unwrap();
        assert_eq!(
            plan.writes,
            vec![
                PositionWrite::Column {
                    column: ColumnId::new(2),
                    index: 0
                },
                PositionWrite::Column {
                    column: ColumnId::new(1),
                    index: 1
                },
            ]
        );
    }

    #[test]
    fn test_in_place_gesture_plans_nothing() {
        let gesture = Gesture::move_card(CardId::new(11), slot(1, 1), slot(1, 1));
        assert_eq!(plan_move(&board(), &gesture).unwrap(), None);
        let gesture = Gesture::move_column(ColumnId::new(3), 2, 2);
        assert_eq!(plan_move(&board(), &gesture).unwrap(), None);
    }

    #[test]
    fn test_wrong_source_is_rejected() {
        let gesture = Gesture::move_card(CardId::new(10), slot(1, 1), slot(2, 0));
        let err = plan_move(&board(), &gesture).unwrap_err();
        assert!(matches!(err, SyncError::PositionMismatch { .. }));
        assert!(err.is_invalid_move());

        let gesture = Gesture::move_card(CardId::new(10), slot(1, 0), slot(9, 0));
        assert!(matches!(
            plan_move(&board(), &gesture),
            Err(SyncError::ColumnNotFound { .. })
        ));

        let gesture = Gesture::move_column(ColumnId::new(2), 0, 2);
        assert!(plan_move(&board(), &gesture).is_err());
    }

    #[tokio::test]
    async fn test_persist_records_activity() {
        let gateway = Arc::new(InMemoryGateway::new().with_board(board()));
        let engine = ReorderEngine::new(gateway.clone());
        let writes = [
            PositionWrite::Column {
                column: ColumnId::new(3),
                index: 0,
            },
            PositionWrite::Column {
                column: ColumnId::new(1),
                index: 1,
            },
        ];

        gateway.fail_next(GatewayOp::SetColumnPosition, 1).await;
        let err = engine.persist(&writes, 4).await.unwrap_err();
        assert!(err.requires_reload());

        let activity = engine.recent_activity(10).await;
        assert_eq!(activity.len(), 2);
        assert!(activity.iter().all(|e| e.generation == 4 && e.op == "move column"));
        assert_eq!(activity.iter().filter(|e| !e.succeeded()).count(), 1);
        assert_eq!(gateway.calls_of(GatewayOp::SetColumnPosition).await.len(), 2);
    }
}
