//! Board, Column and Card types

use super::ids::{BoardId, CardId, ColumnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Color a column takes when none is given
pub const DEFAULT_COLUMN_COLOR: &str = "gray";

/// A project's full set of columns and cards.
///
/// `columns` is kept in display order; each column's `rank` equals its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Board {
    /// Create a board with no columns
    pub fn new(id: BoardId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column, assigning it the next dense rank
    pub fn with_column(mut self, mut column: Column) -> Self {
        column.rank = self.columns.len();
        self.columns.push(column);
        self
    }

    /// Look up a column
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Look up a card in any column
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.columns.iter().flat_map(|c| c.cards.iter()).find(|c| c.id == id)
    }

    /// Column ids in display order
    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id).collect()
    }

    /// Total number of cards across all columns
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }
}

/// A named, ordered bucket of cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub rank: usize,
    #[serde(default)]
    pub cards: Vec<Card>,
}

fn default_color() -> String {
    DEFAULT_COLUMN_COLOR.to_string()
}

impl Column {
    /// Create an empty column. Rank is fixed up when the column joins a board.
    pub fn new(id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            color: default_color(),
            rank: 0,
            cards: Vec::new(),
        }
    }

    /// Set the display color
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Set the rank explicitly (snapshots from the remote store)
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Append a card, re-parenting it and assigning the next dense rank
    pub fn with_card(mut self, mut card: Card) -> Self {
        card.column_id = self.id;
        card.rank = self.cards.len();
        self.cards.push(card);
        self
    }

    /// Card ids in display order
    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|c| c.id).collect()
    }

    /// Position of a card within this column
    pub fn position_of(&self, card: CardId) -> Option<usize> {
        self.cards.iter().position(|c| c.id == card)
    }
}

/// A single work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub column_id: ColumnId,
    pub rank: usize,
}

impl Card {
    /// Create a card with just a body. Owner and rank are fixed up when the
    /// card joins a column.
    pub fn new(id: CardId, body: impl Into<String>) -> Self {
        Self {
            id,
            title: None,
            body: body.into(),
            deadline: None,
            suggestion: None,
            column_id: ColumnId::new(0),
            rank: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set owner and rank explicitly (snapshots from the remote store)
    pub fn in_column(mut self, column: ColumnId, rank: usize) -> Self {
        self.column_id = column;
        self.rank = rank;
        self
    }

    /// Title if present, otherwise the body
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.body)
    }
}
