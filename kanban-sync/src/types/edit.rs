//! Field-level edits for cards and columns

use super::board::{Card, Column};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content of a card to be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: Option<String>,
    pub body: String,
    pub deadline: Option<DateTime<Utc>>,
}

impl CardDraft {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
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
}

/// Partial update of a card. `None` leaves a field untouched; `deadline:
/// Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl CardPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.deadline.is_none()
    }

    /// Apply to a card. Owner and rank are never touched.
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = Some(title.clone());
        }
        if let Some(body) = &self.body {
            card.body = body.clone();
        }
        if let Some(deadline) = self.deadline {
            card.deadline = deadline;
        }
    }
}

/// Partial update of a column's presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPatch {
    pub title: Option<String>,
    pub color: Option<String>,
}

impl ColumnPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.color.is_none()
    }

    /// Apply to a column. Rank and cards are never touched.
    pub fn apply_to(&self, column: &mut Column) {
        if let Some(title) = &self.title {
            column.title = title.clone();
        }
        if let Some(color) = &self.color {
            column.color = color.clone();
        }
    }
}
