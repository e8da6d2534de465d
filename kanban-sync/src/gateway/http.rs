//! HTTP client for the board backend
//!
//! Paths are resolved against the configured base URL (which always ends in
//! `/`). The bearer token, when configured, is attached to every request.

use super::wire::{
    format_deadline, CardPatchBody, ColumnOrderBody, ColumnPatchBody, MoveCardBody, NewCardBody,
    NewColumnBody, RunAgentBody, RunAgentReply, WireAgent, WireBoard, WireCard, WireColumn,
};
use super::RemoteGateway;
use crate::error::{Result, SyncError};
use crate::types::{
    Agent, AgentId, Board, BoardId, Card, CardDraft, CardId, CardPatch, Column, ColumnId,
    ColumnPatch,
};
use async_trait::async_trait;
use kanban_sync_config::GatewayConfig;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Remote store reached over HTTP
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpGateway {
    /// Build a client from validated configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.normalized_base_url())
            .map_err(|e| SyncError::invalid_value("base_url", e.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("kanban-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| SyncError::invalid_value("path", format!("{}: {}", path, e)))?;
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send and map failures: no response at all is a transport error, a
    /// non-success status is a rejection carrying the response body
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!("request failed: {}", e);
            SyncError::transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %body, "request rejected");
        Err(SyncError::rejected(status.as_u16(), body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(format!("unreadable response body: {}", e)))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn fetch_board(&self, board: BoardId) -> Result<Board> {
        let request = self.request(Method::GET, &format!("workspaces/{}/", board))?;
        let wire: WireBoard = self.send_json(request).await?;
        let board = wire.into_board();
        debug!(columns = board.columns.len(), cards = board.card_count(), "fetched board");
        Ok(board)
    }

    #[instrument(skip(self))]
    async fn set_card_position(&self, card: CardId, column: ColumnId, index: usize) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("cards/{}/mover/", card))?
            .json(&MoveCardBody {
                coluna_id: column.get(),
                nova_posicao: index,
            });
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_column_position(&self, column: ColumnId, index: usize) -> Result<()> {
        let request = self
            .request(Method::PATCH, &format!("colunas/{}/", column))?
            .json(&ColumnOrderBody { ordem: index });
        self.send(request).await?;
        Ok(())
    }

    async fn create_card(&self, column: ColumnId, draft: &CardDraft) -> Result<Card> {
        let request = self.request(Method::POST, "cards/")?.json(&NewCardBody {
            coluna: column.get(),
            titulo: draft.title.clone(),
            conteudo_original: draft.body.clone(),
            prazo: draft.deadline.as_ref().map(format_deadline),
        });
        let wire: WireCard = self.send_json(request).await?;
        Ok(wire.into_card())
    }

    async fn update_card(&self, card: CardId, patch: &CardPatch) -> Result<Card> {
        let request = self
            .request(Method::PATCH, &format!("cards/{}/", card))?
            .json(&CardPatchBody {
                titulo: patch.title.clone(),
                conteudo_original: patch.body.clone(),
                prazo: patch.deadline.map(|d| d.as_ref().map(format_deadline)),
            });
        let wire: WireCard = self.send_json(request).await?;
        Ok(wire.into_card())
    }

    async fn delete_card(&self, card: CardId) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("cards/{}/", card))?;
        self.send(request).await?;
        Ok(())
    }

    async fn create_column(&self, board: BoardId, title: &str) -> Result<Column> {
        let request = self.request(Method::POST, "colunas/")?.json(&NewColumnBody {
            projeto: board.get(),
            titulo: title,
        });
        let wire: WireColumn = self.send_json(request).await?;
        Ok(wire.into_column_as_stored())
    }

    async fn update_column(&self, column: ColumnId, patch: &ColumnPatch) -> Result<Column> {
        let request = self
            .request(Method::PATCH, &format!("colunas/{}/", column))?
            .json(&ColumnPatchBody {
                titulo: patch.title.clone(),
                cor: patch.color.clone(),
            });
        let wire: WireColumn = self.send_json(request).await?;
        Ok(wire.into_column_as_stored())
    }

    async fn delete_column(&self, column: ColumnId) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("colunas/{}/", column))?;
        self.send(request).await?;
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let request = self.request(Method::GET, "ai/agentes/")?;
        let wire: Vec<WireAgent> = self.send_json(request).await?;
        Ok(wire.into_iter().map(Agent::from).collect())
    }

    #[instrument(skip(self))]
    async fn refine(&self, card: CardId, agent: &AgentId) -> Result<String> {
        let request = self.request(Method::POST, "ai/run/")?.json(&RunAgentBody {
            card_id: card.get(),
            template_slug: agent.as_str(),
        });
        let reply: RunAgentReply = self.send_json(request).await?;
        Ok(reply.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_COLUMN_COLOR;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, HttpGateway) {
        let server = MockServer::start().await;
        let config = GatewayConfig::new(format!("{}/api", server.uri())).with_token("s3cret");
        let gateway = HttpGateway::new(&config).unwrap();
        (server, gateway)
    }

    #[tokio::test]
    async fn test_fetch_board_sends_token_and_sorts() {
        let (server, gateway) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/workspaces/3/"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "titulo": "Roadmap",
                "colunas": [
                    { "id": 2, "titulo": "Later", "ordem": 1, "cor": "blue", "cards": [] },
                    { "id": 1, "titulo": "Now", "ordem": 0, "cor": "gray", "cards": [
                        { "id": 9, "titulo": "Ship", "conteudo_original": "ship it", "ordem": 0, "coluna": 1 }
                    ]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let board = gateway.fetch_board(BoardId::new(3)).await.unwrap();
        assert_eq!(board.title, "Roadmap");
        assert_eq!(board.column_ids(), vec![ColumnId::new(1), ColumnId::new(2)]);
        assert_eq!(board.card(CardId::new(9)).unwrap().display_title(), "Ship");
    }

    #[tokio::test]
    async fn test_move_card_body() {
        let (server, gateway) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/5/mover/"))
            .and(body_json(json!({ "coluna_id": 2, "nova_posicao": 0 })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": "Card movido com sucesso" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        gateway
            .set_card_position(CardId::new(5), ColumnId::new(2), 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_column_position_body() {
        let (server, gateway) = setup().await;
        Mock::given(method("PATCH"))
            .and(path("/api/colunas/4/"))
            .and(body_json(json!({ "ordem": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4, "titulo": "QA", "ordem": 2, "cor": "gray", "cards": [], "projeto": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        gateway
            .set_column_position(ColumnId::new(4), 2)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let (server, gateway) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/5/mover/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "Posição inválida" })),
            )
            .mount(&server)
            .await;

        let err = gateway
            .set_card_position(CardId::new(5), ColumnId::new(2), 0)
            .await
            .unwrap_err();
        match err {
            SyncError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Posição inválida"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_transport() {
        let config = GatewayConfig::new("http://127.0.0.1:1/api/").with_timeout_secs(2);
        let gateway = HttpGateway::new(&config).unwrap();
        let err = gateway.fetch_board(BoardId::new(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
        assert!(err.requires_reload());
    }

    #[tokio::test]
    async fn test_refine_and_agents() {
        let (server, gateway) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/ai/agentes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "Bug Hunter", "slug": "bug-hunter", "description": "Finds bugs",
                  "system_instruction": "...", "active": true }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/ai/run/"))
            .and(body_json(json!({ "card_id": 9, "template_slug": "bug-hunter" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "Check the null case" })))
            .mount(&server)
            .await;

        let agents = gateway.list_agents().await.unwrap();
        assert_eq!(agents[0].id, AgentId::from("bug-hunter"));
        assert_eq!(agents[0].description, "Finds bugs");

        let text = gateway
            .refine(CardId::new(9), &AgentId::from("bug-hunter"))
            .await
            .unwrap();
        assert_eq!(text, "Check the null case");
    }

    #[tokio::test]
    async fn test_create_card_body() {
        let (server, gateway) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/cards/"))
            .and(body_json(json!({
                "coluna": 2, "titulo": null, "conteudo_original": "write docs", "prazo": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 40, "titulo": null, "conteudo_original": "write docs",
                "prompt_refinado": null, "ordem": 3, "prazo": null, "coluna": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let card = gateway
            .create_card(ColumnId::new(2), &CardDraft::new("write docs"))
            .await
            .unwrap();
        assert_eq!(card.id, CardId::new(40));
        assert_eq!(card.rank, 3);
        assert_eq!(card.column_id, ColumnId::new(2));
    }

    #[tokio::test]
    async fn test_update_card_clears_deadline() {
        let (server, gateway) = setup().await;
        Mock::given(method("PATCH"))
            .and(path("/api/cards/5/"))
            .and(body_json(json!({ "titulo": "Rename", "prazo": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5, "titulo": "Rename", "conteudo_original": "body",
                "prompt_refinado": "", "ordem": 1, "prazo": null, "coluna": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let patch = CardPatch::new().with_title("Rename").with_deadline(None);
        let card = gateway.update_card(CardId::new(5), &patch).await.unwrap();
        assert_eq!(card.title.as_deref(), Some("Rename"));
        assert!(card.deadline.is_none());
        assert!(card.suggestion.is_none());
    }

    #[tokio::test]
    async fn test_delete_card() {
        let (server, gateway) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/api/cards/5/"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        gateway.delete_card(CardId::new(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_column_body() {
        let (server, gateway) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/colunas/"))
            .and(body_json(json!({ "projeto": 1, "titulo": "QA" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 4, "titulo": "QA", "ordem": 3, "cards": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let column = gateway.create_column(BoardId::new(1), "QA").await.unwrap();
        assert_eq!(column.id, ColumnId::new(4));
        assert_eq!(column.rank, 3);
        assert_eq!(column.color, DEFAULT_COLUMN_COLOR);
    }

    #[tokio::test]
    async fn test_update_column_sends_only_changed_fields() {
        let (server, gateway) = setup().await;
        Mock::given(method("PATCH"))
            .and(path("/api/colunas/4/"))
            .and(body_json(json!({ "cor": "rose" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4, "titulo": "QA", "ordem": 3, "cor": "rose", "cards": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let patch = ColumnPatch::new().with_color("rose");
        let column = gateway.update_column(ColumnId::new(4), &patch).await.unwrap();
        assert_eq!(column.color, "rose");
        assert_eq!(column.title, "QA");
    }

    #[tokio::test]
    async fn test_delete_column() {
        let (server, gateway) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/api/colunas/4/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        gateway.delete_column(ColumnId::new(4)).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let (server, gateway) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/ai/agentes/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = gateway.list_agents().await.unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
        assert!(!err.requires_reload());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let config = GatewayConfig::new("ftp://example.com");
        assert!(matches!(
            HttpGateway::new(&config),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let gateway = HttpGateway::new(&GatewayConfig::default().with_token("s3cret")).unwrap();
        assert!(!format!("{:?}", gateway).contains("s3cret"));
    }
}
