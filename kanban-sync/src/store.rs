//! Ordering store: move primitives over a board snapshot
//!
//! Everything here is pure. A move mutates the snapshot in place and reports
//! whether anything changed; persisting the change is the engine's job.
//!
//! After every move the touched sibling groups carry dense, zero-based ranks
//! equal to their index, and every card's `column_id` names the column that
//! holds it.

use crate::error::{Result, SyncError};
use crate::types::{Board, CardId, Column, ColumnId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Where a card sits: its column and its index within that column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardSlot {
    pub column: ColumnId,
    pub index: usize,
}

impl CardSlot {
    pub fn new(column: ColumnId, index: usize) -> Self {
        Self { column, index }
    }
}

impl fmt::Display for CardSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {} index {}", self.column, self.index)
    }
}

/// A broken ordering invariant, as reported by [`Board::check_invariants`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("column {column} at index {index} has rank {rank}")]
    ColumnRank {
        column: ColumnId,
        index: usize,
        rank: usize,
    },

    #[error("card {card} at index {index} of column {column} has rank {rank}")]
    CardRank {
        card: CardId,
        column: ColumnId,
        index: usize,
        rank: usize,
    },

    #[error("card {card} is held by column {column} but names column {owner}")]
    CardOwner {
        card: CardId,
        column: ColumnId,
        owner: ColumnId,
    },

    #[error("card {card} appears more than once")]
    DuplicateCard { card: CardId },

    #[error("column {column} appears more than once")]
    DuplicateColumn { column: ColumnId },
}

impl Board {
    /// Find the column and index currently holding a card
    pub fn locate_card(&self, card: CardId) -> Option<CardSlot> {
        self.columns.iter().find_map(|column| {
            column
                .position_of(card)
                .map(|index| CardSlot::new(column.id, index))
        })
    }

    /// Index of a column within the board
    pub fn column_position(&self, column: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column)
    }

    /// Move a card to `index` within `destination` (which may be its current
    /// column).
    ///
    /// `index` is clamped to the destination's length after the card has been
    /// removed. Returns `Ok(false)` and leaves the board untouched when the
    /// card already sits at the clamped position.
    pub fn move_card(&mut self, card: CardId, destination: ColumnId, index: usize) -> Result<bool> {
        let from = self
            .locate_card(card)
            .ok_or(SyncError::CardNotFound { id: card })?;
        let dest_pos = self
            .column_position(destination)
            .ok_or(SyncError::ColumnNotFound { id: destination })?;
        let src_pos = self
            .column_position(from.column)
            .ok_or(SyncError::ColumnNotFound { id: from.column })?;

        let dest_len = self.columns[dest_pos].cards.len();
        let available = if src_pos == dest_pos {
            dest_len - 1
        } else {
            dest_len
        };
        let index = index.min(available);

        if src_pos == dest_pos && from.index == index {
            return Ok(false);
        }

        let mut moving = self.columns[src_pos].cards.remove(from.index);
        moving.column_id = destination;
        self.columns[dest_pos].cards.insert(index, moving);

        rerank_cards(&mut self.columns[src_pos]);
        if src_pos != dest_pos {
            rerank_cards(&mut self.columns[dest_pos]);
        }
        Ok(true)
    }

    /// Move a column to `index` among the board's columns.
    ///
    /// `index` is clamped to the last position. Returns `Ok(false)` and leaves
    /// the board untouched when the column already sits there.
    pub fn move_column(&mut self, column: ColumnId, index: usize) -> Result<bool> {
        let from = self
            .column_position(column)
            .ok_or(SyncError::ColumnNotFound { id: column })?;
        let index = index.min(self.columns.len() - 1);

        if from == index {
            return Ok(false);
        }

        let moving = self.columns.remove(from);
        self.columns.insert(index, moving);
        rerank_columns(&mut self.columns);
        Ok(true)
    }

    /// Bring a snapshot from the remote store into canonical form.
    ///
    /// Columns are sorted by `(rank, id)` and cards within each column likewise;
    /// ranks are then rewritten densely and every card is re-parented to the
    /// column holding it.
    pub fn normalize(&mut self) {
        self.columns.sort_by_key(|c| (c.rank, c.id));
        rerank_columns(&mut self.columns);
        for column in &mut self.columns {
            column.cards.sort_by_key(|c| (c.rank, c.id));
            rerank_cards(column);
        }
    }

    /// Consume and return the canonical form
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Report the first broken ordering invariant, if any
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
        let mut seen_columns = HashSet::new();
        let mut seen_cards = HashSet::new();

        for (index, column) in self.columns.iter().enumerate() {
            if !seen_columns.insert(column.id) {
                return Err(InvariantViolation::DuplicateColumn { column: column.id });
            }
            if column.rank != index {
                return Err(InvariantViolation::ColumnRank {
                    column: column.id,
                    index,
                    rank: column.rank,
                });
            }
            for (index, card) in column.cards.iter().enumerate() {
                if !seen_cards.insert(card.id) {
                    return Err(InvariantViolation::DuplicateCard { card: card.id });
                }
                if card.column_id != column.id {
                    return Err(InvariantViolation::CardOwner {
                        card: card.id,
                        column: column.id,
                        owner: card.column_id,
                    });
                }
                if card.rank != index {
                    return Err(InvariantViolation::CardRank {
                        card: card.id,
                        column: column.id,
                        index,
                        rank: card.rank,
                    });
                }
            }
        }
        Ok(())
    }
}

fn rerank_columns(columns: &mut [Column]) {
    for (rank, column) in columns.iter_mut().enumerate() {
        column.rank = rank;
    }
}

fn rerank_cards(column: &mut Column) {
    let owner = column.id;
    for (rank, card) in column.cards.iter_mut().enumerate() {
        card.rank = rank;
        card.column_id = owner;
    }
}
