//! Data model for boards, columns and cards

mod agent;
mod board;
mod edit;
mod ids;

pub use agent::Agent;
pub use board::{Board, Card, Column, DEFAULT_COLUMN_COLOR};
pub use edit::{CardDraft, CardPatch, ColumnPatch};
pub use ids::{AgentId, BoardId, CardId, ColumnId};
