//! Drag gestures and their decoding from raw drop events
//!
//! A drop event arrives from the UI as string container ids and indices.
//! Card containers are column ids; column drags happen inside a single board
//! container whose id is not interpreted.

use crate::store::CardSlot;
use crate::types::{CardId, ColumnId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A decoded drag outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Gesture {
    /// Reorder a column among the board's columns
    MoveColumn {
        column: ColumnId,
        from: usize,
        to: usize,
    },
    /// Reorder a card within its column or move it to another column
    MoveCard {
        card: CardId,
        from: CardSlot,
        to: CardSlot,
    },
}

impl Gesture {
    pub fn move_column(column: ColumnId, from: usize, to: usize) -> Self {
        Self::MoveColumn { column, from, to }
    }

    pub fn move_card(card: CardId, from: CardSlot, to: CardSlot) -> Self {
        Self::MoveCard { card, from, to }
    }

    /// Whether the drop lands exactly where the drag started
    pub fn is_in_place(&self) -> bool {
        match self {
            Self::MoveColumn { from, to, .. } => from == to,
            Self::MoveCard { from, to, .. } => from == to,
        }
    }
}

/// What was dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragKind {
    Column,
    Card,
}

/// A container id and an index within it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub container: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(container: impl Into<String>, index: usize) -> Self {
        Self {
            container: container.into(),
            index,
        }
    }
}

/// Raw drop event as reported by the UI's drag-and-drop layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEvent {
    pub kind: DragKind,
    pub draggable_id: String,
    pub source: DropLocation,
    /// `None` when the item was released outside any drop target
    pub destination: Option<DropLocation>,
}

impl DropEvent {
    /// A card dragged from `source` and dropped on `destination`
    pub fn card(card: CardId, source: CardSlot, destination: Option<CardSlot>) -> Self {
        Self {
            kind: DragKind::Card,
            draggable_id: card.to_string(),
            source: DropLocation::new(source.column.to_string(), source.index),
            destination: destination.map(|d| DropLocation::new(d.column.to_string(), d.index)),
        }
    }

    /// A column dragged from index `from` and dropped at `to`
    pub fn column(column: ColumnId, from: usize, to: Option<usize>) -> Self {
        Self {
            kind: DragKind::Column,
            draggable_id: column.to_string(),
            source: DropLocation::new("board", from),
            destination: to.map(|index| DropLocation::new("board", index)),
        }
    }

    /// Decode into a gesture.
    ///
    /// Returns `None` for drops outside any target and for ids that do not
    /// parse; both are ignored by the controller.
    pub fn to_gesture(&self) -> Option<Gesture> {
        let destination = self.destination.as_ref()?;

        match self.kind {
            DragKind::Column => {
                let column = parse_id::<ColumnId>("column", &self.draggable_id)?;
                Some(Gesture::move_column(
                    column,
                    self.source.index,
                    destination.index,
                ))
            }
            DragKind::Card => {
                let card = parse_id::<CardId>("card", &self.draggable_id)?;
                let from = parse_id::<ColumnId>("column", &self.source.container)?;
                let to = parse_id::<ColumnId>("column", &destination.container)?;
                Some(Gesture::move_card(
                    card,
                    CardSlot::new(from, self.source.index),
                    CardSlot::new(to, destination.index),
                ))
            }
        }
    }
}

fn parse_id<T: std::str::FromStr>(what: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(what, raw, "ignoring drop with an unrecognized id");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_card_drop() {
        let event = DropEvent {
            kind: DragKind::Card,
            draggable_id: "12".into(),
            source: DropLocation::new("3", 1),
            destination: Some(DropLocation::new("4", 0)),
        };
        assert_eq!(
            event.to_gesture(),
            Some(Gesture::move_card(
                CardId::new(12),
                CardSlot::new(ColumnId::new(3), 1),
                CardSlot::new(ColumnId::new(4), 0),
            ))
        );
    }

    #[test]
    fn test_decode_column_drop() {
        let event = DropEvent::column(ColumnId::new(7), 2, Some(0));
        assert_eq!(
            event.to_gesture(),
            Some(Gesture::move_column(ColumnId::new(7), 2, 0))
        );
    }

    #[test]
    fn test_drop_outside_target_is_ignored() {
        let event = DropEvent::card(CardId::new(1), CardSlot::new(ColumnId::new(1), 0), None);
        assert_eq!(event.to_gesture(), None);
    }

    #[test]
    fn test_unrecognized_container_is_ignored() {
        let mut event = DropEvent::card(
            CardId::new(1),
            CardSlot::new(ColumnId::new(1), 0),
            Some(CardSlot::new(ColumnId::new(2), 0)),
        );
        event.destination = Some(DropLocation::new("trash", 0));
        assert_eq!(event.to_gesture(), None);
    }

    #[test]
    fn test_in_place() {
        let slot = CardSlot::new(ColumnId::new(1), 2);
        assert!(Gesture::move_card(CardId::new(1), slot, slot).is_in_place());
        assert!(!Gesture::move_column(ColumnId::new(1), 0, 1).is_in_place());
    }
}
