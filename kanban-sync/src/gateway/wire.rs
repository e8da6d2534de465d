//! JSON shapes spoken by the HTTP backend

use crate::types::{Agent, AgentId, Board, BoardId, Card, CardId, Column, ColumnId, DEFAULT_COLUMN_COLOR};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(super) struct WireBoard {
    id: u64,
    titulo: String,
    #[serde(default)]
    colunas: Vec<WireColumn>,
}

impl WireBoard {
    /// Convert, sorting by stored order (ties by id) and assigning dense ranks
    pub(super) fn into_board(self) -> Board {
        let mut columns = self.colunas;
        columns.sort_by_key(|c| (c.ordem, c.id));

        let mut board = Board::new(BoardId::new(self.id), self.titulo);
        board.columns = columns
            .into_iter()
            .enumerate()
            .map(|(rank, column)| column.into_column(rank))
            .collect();
        board.normalized()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireColumn {
    id: u64,
    titulo: String,
    #[serde(default)]
    ordem: i64,
    #[serde(default)]
    cor: Option<String>,
    #[serde(default)]
    cards: Vec<WireCard>,
}

impl WireColumn {
    pub(super) fn into_column(self, rank: usize) -> Column {
        let mut cards = self.cards;
        cards.sort_by_key(|c| (c.ordem, c.id));

        let mut column = Column::new(ColumnId::new(self.id), self.titulo)
            .with_color(self.cor.unwrap_or_else(|| DEFAULT_COLUMN_COLOR.to_string()))
            .with_rank(rank);
        column.cards = cards
            .into_iter()
            .enumerate()
            .map(|(rank, card)| card.into_card_ranked(rank))
            .collect();
        column
    }

    /// A column returned alone, ranked by its stored order
    pub(super) fn into_column_as_stored(self) -> Column {
        let rank = usize::try_from(self.ordem).unwrap_or(0);
        self.into_column(rank)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireCard {
    id: u64,
    #[serde(default)]
    titulo: Option<String>,
    #[serde(default)]
    conteudo_original: Option<String>,
    #[serde(default)]
    prompt_refinado: Option<String>,
    #[serde(default)]
    ordem: i64,
    #[serde(default)]
    prazo: Option<String>,
    coluna: u64,
}

impl WireCard {
    fn into_card_ranked(self, rank: usize) -> Card {
        let column = ColumnId::new(self.coluna);
        let mut card = Card::new(CardId::new(self.id), self.conteudo_original.unwrap_or_default())
            .in_column(column, rank);
        card.title = self.titulo.filter(|t| !t.is_empty());
        card.suggestion = self.prompt_refinado.filter(|s| !s.is_empty());
        card.deadline = self.prazo.as_deref().and_then(parse_deadline);
        card
    }

    /// A card returned alone, ranked by its stored order
    pub(super) fn into_card(self) -> Card {
        let rank = usize::try_from(self.ordem).unwrap_or(0);
        self.into_card_ranked(rank)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireAgent {
    slug: String,
    name: String,
    #[serde(default)]
    description: String,
}

impl From<WireAgent> for Agent {
    fn from(agent: WireAgent) -> Self {
        Agent::new(AgentId::from(agent.slug), agent.name).with_description(agent.description)
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MoveCardBody {
    pub coluna_id: u64,
    pub nova_posicao: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct ColumnOrderBody {
    pub ordem: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct NewCardBody {
    pub coluna: u64,
    pub titulo: Option<String>,
    pub conteudo_original: String,
    pub prazo: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct CardPatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conteudo_original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prazo: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub(super) struct NewColumnBody<'a> {
    pub projeto: u64,
    pub titulo: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct ColumnPatchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunAgentBody<'a> {
    pub card_id: u64,
    pub template_slug: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunAgentReply {
    pub result: String,
}

/// Accepts RFC 3339 timestamps and bare dates (taken as midnight UTC)
pub(super) fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Some(midnight.and_utc());
    }
    warn!(raw, "ignoring unparseable card deadline");
    None
}

pub(super) fn format_deadline(deadline: &DateTime<Utc>) -> String {
    deadline.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_board_is_sorted_and_densified() {
        let wire: WireBoard = serde_json::from_value(json!({
            "id": 1,
            "titulo": "Launch",
            "colunas": [
                { "id": 8, "titulo": "Done", "ordem": 5, "cor": "green", "cards": [] },
                { "id": 7, "titulo": "Todo", "ordem": 2, "cards": [
                    { "id": 30, "titulo": null, "conteudo_original": "b", "ordem": 4, "coluna": 7 },
                    { "id": 31, "titulo": "", "conteudo_original": "a", "ordem": 1, "coluna": 7,
                      "prazo": "2026-03-01", "prompt_refinado": "better a" }
                ]}
            ]
        }))
        .unwrap();

        let board = wire.into_board();
        board.check_invariants().unwrap();
        assert_eq!(board.column_ids(), vec![ColumnId::new(7), ColumnId::new(8)]);
        assert_eq!(board.columns[0].color, DEFAULT_COLUMN_COLOR);
        assert_eq!(board.columns[1].color, "green");
        assert_eq!(board.columns[0].card_ids(), vec![CardId::new(31), CardId::new(30)]);

        let first = &board.columns[0].cards[0];
        assert_eq!(first.title, None);
        assert_eq!(first.suggestion.as_deref(), Some("better a"));
        assert_eq!(
            first.deadline,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_deadline_formats() {
        assert!(parse_deadline("2026-03-01T09:30:00Z").is_some());
        assert!(parse_deadline("2026-03-01T09:30:00-03:00").is_some());
        assert!(parse_deadline("next week").is_none());
    }

    #[test]
    fn test_patch_body_skips_untouched_fields() {
        let body = CardPatchBody {
            titulo: Some("New".into()),
            prazo: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "titulo": "New", "prazo": null })
        );
    }
}
