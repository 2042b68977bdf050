use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use zeroize::Zeroize;

use super::{build_http_client, BoardApiError};
use crate::config::TrelloConfig;
use crate::traits::BoardClient;
use crate::types::{BoardInfo, BoardMember, CardObservation, ListMeta};

/// Trello REST client. Key and token travel as query parameters.
pub struct TrelloClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
    timeout_secs: u64,
}

impl Drop for TrelloClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
        self.token.zeroize();
    }
}

/// HTTPS is required except for a local mock server.
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", base_url, e))?;
    let host = parsed.host_str().unwrap_or("");

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1") => {
            warn!(base_url, "Using unencrypted HTTP for the board API");
            Ok(())
        }
        "http" => Err(format!(
            "HTTP is not allowed for remote URLs (base_url: '{}'). Use HTTPS.",
            base_url
        )),
        scheme => Err(format!(
            "Unsupported URL scheme '{}' in base_url '{}'",
            scheme, base_url
        )),
    }
}

impl TrelloClient {
    pub fn new(config: &TrelloConfig) -> anyhow::Result<Self> {
        validate_base_url(&config.base_url).map_err(|e| anyhow::anyhow!(e))?;
        let client = build_http_client(Duration::from_secs(config.request_timeout_secs))
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: config.token.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, BoardApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "Calling board API");

        let resp = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    return BoardApiError::timeout(endpoint, self.timeout_secs);
                }
                // The URL carries the key and token.
                let e = e.without_url();
                error!(endpoint, "Board API request failed: {}", e);
                BoardApiError::network(&e)
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| BoardApiError::network(&e))?;

        if !status.is_success() {
            let err = BoardApiError::from_status(status.as_u16(), &text);
            if err.is_auth() {
                error!(endpoint, status = %status, "Board API rejected credentials");
            } else {
                warn!(endpoint, status = %status, "Board API error: {}", err.message);
            }
            return Err(err);
        }

        serde_json::from_str(&text)
            .map_err(|e| BoardApiError::data(format!("invalid JSON from {}: {}", endpoint, e)))
    }
}

#[async_trait]
impl BoardClient for TrelloClient {
    async fn authenticated_username(&self) -> Result<String, BoardApiError> {
        let me = self.get("members/me", &[]).await?;
        let username = me["username"].as_str().unwrap_or("unknown").to_string();
        debug!(username = %username, "Board API credentials accepted");
        Ok(username)
    }

    async fn board_info(&self, board_id: &str) -> Result<BoardInfo, BoardApiError> {
        let value = self
            .get(&format!("boards/{}", board_id), &[("fields", "name")])
            .await?;
        parse_board_info(board_id, &value)
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<ListMeta>, BoardApiError> {
        let value = self
            .get(&format!("boards/{}/lists", board_id), &[("filter", "all")])
            .await?;
        parse_lists(&value)
    }

    async fn cards(
        &self,
        board_id: &str,
        include_archived: bool,
    ) -> Result<Vec<CardObservation>, BoardApiError> {
        let mut params = vec![("members", "true")];
        if include_archived {
            params.push(("filter", "all"));
        }
        let value = self
            .get(&format!("boards/{}/cards", board_id), &params)
            .await?;
        parse_cards(board_id, &value)
    }
}

// ---------------------------------------------------------------------------
// Payload validation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawMember {
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    id: Option<String>,
    name: Option<String>,
    id_list: Option<String>,
    #[serde(default)]
    short_url: Option<String>,
    #[serde(default)]
    members: Vec<RawMember>,
    #[serde(default)]
    due: Option<Value>,
    #[serde(default)]
    start: Option<Value>,
    #[serde(default)]
    date_last_activity: Option<Value>,
}

fn parse_board_info(board_id: &str, value: &Value) -> Result<BoardInfo, BoardApiError> {
    let name = value["name"]
        .as_str()
        .ok_or_else(|| BoardApiError::data(format!("board {} has no name", board_id)))?;
    Ok(BoardInfo {
        id: value["id"].as_str().unwrap_or(board_id).to_string(),
        name: name.to_string(),
    })
}

fn parse_lists(value: &Value) -> Result<Vec<ListMeta>, BoardApiError> {
    let items = value
        .as_array()
        .ok_or_else(|| BoardApiError::data("lists response is not an array"))?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item["id"].as_str()?;
            Some(ListMeta {
                id: id.to_string(),
                name: item["name"].as_str().unwrap_or("").to_string(),
            })
        })
        .collect())
}

/// Cards that fail validation are skipped; the rest of the board still counts.
fn parse_cards(board_id: &str, value: &Value) -> Result<Vec<CardObservation>, BoardApiError> {
    let items = value
        .as_array()
        .ok_or_else(|| BoardApiError::data("cards response is not an array"))?;

    let mut cards = Vec::with_capacity(items.len());
    for item in items {
        match parse_card(board_id, item) {
            Some(card) => cards.push(card),
            None => warn!(
                board_id,
                card = %crate::utils::truncate_str(&item.to_string(), 200),
                "Skipping malformed card"
            ),
        }
    }
    Ok(cards)
}

fn parse_card(board_id: &str, item: &Value) -> Option<CardObservation> {
    let raw: RawCard = serde_json::from_value(item.clone()).ok()?;
    let card_id = raw.id.filter(|s| !s.is_empty())?;
    let list_id = raw.id_list.filter(|s| !s.is_empty())?;
    let name = raw.name?;

    Some(CardObservation {
        url: raw
            .short_url
            .unwrap_or_else(|| format!("https://trello.com/c/{}", card_id)),
        members: raw
            .members
            .into_iter()
            .map(|m| BoardMember {
                id: m.id,
                username: m.username,
            })
            .collect(),
        due: parse_date(raw.due.as_ref()),
        start: parse_date(raw.start.as_ref()),
        last_activity: parse_date(raw.date_last_activity.as_ref()),
        card_id,
        board_id: board_id.to_string(),
        list_id,
        name,
    })
}

/// Absent, null or malformed dates all come back as `None`.
fn parse_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = value?.as_str()?;
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!(value = s, "Ignoring malformed date: {}", e);
            None
        }
    }
}
