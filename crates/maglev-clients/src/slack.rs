//! Slack `chat.postMessage` notification sink.

use async_trait::async_trait;
use maglev_core::config::SlackSettings;
use maglev_core::{
    Block, Delivery, FetchError, FetchErrorKind, FetchResult, NotificationMessage,
    NotificationSink, Secret,
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::send_json;

pub const SLACK_API: &str = "https://slack.com/api";

/// Slack answers 200 even for failures; `ok` carries the verdict.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    channel: Option<String>,
    ts: Option<String>,
    error: Option<String>,
}

impl PostMessageResponse {
    fn into_delivery(self, requested_channel: &str) -> FetchResult<Delivery> {
        if !self.ok {
            let reason = self.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(FetchError::new(FetchErrorKind::Api, reason));
        }
        Ok(Delivery {
            channel: self.channel.unwrap_or_else(|| requested_channel.to_string()),
            message_id: self.ts.unwrap_or_default(),
        })
    }
}

fn mrkdwn(text: &str) -> Value {
    json!({ "type": "mrkdwn", "text": text })
}

/// Slack Block Kit rendering of one message block.
fn block_kit(block: &Block) -> Value {
    match block {
        Block::Section(text) => json!({ "type": "section", "text": mrkdwn(text) }),
        Block::Divider => json!({ "type": "divider" }),
        Block::Context(text) => json!({ "type": "context", "elements": [mrkdwn(text)] }),
    }
}

pub struct SlackClient {
    http: Client,
    base_url: String,
    token: Secret,
    channel: String,
}

impl SlackClient {
    pub fn new(http: Client, settings: &SlackSettings) -> Self {
        Self {
            http,
            base_url: SLACK_API.to_string(),
            token: settings.token.clone(),
            channel: settings.channel.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn post_message_request(&self, message: &NotificationMessage) -> RequestBuilder {
        let blocks: Vec<Value> = message.blocks.iter().map(block_kit).collect();
        self.http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(self.token.expose())
            .json(&json!({
                "channel": self.channel,
                "text": message.text,
                "as_user": false,
                "blocks": blocks,
            }))
    }
}

#[async_trait]
impl NotificationSink for SlackClient {
    async fn post(&self, message: &NotificationMessage) -> FetchResult<Delivery> {
        let url = format!("{}/chat.postMessage", self.base_url);
        let response: PostMessageResponse =
            send_json(&self.http, self.post_message_request(message)).await?;
        response
            .into_delivery(&self.channel)
            .map_err(|e| e.with_request("POST", url))
    }
}
