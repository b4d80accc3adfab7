//! Discord notification module
//! Delivers alert messages to one channel over the bot REST API

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::types::Notifier;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    #[serde(default)]
    name: Option<String>,
}

/// Discord REST client bound to a single destination channel
pub struct DiscordNotifier {
    client: reqwest::Client,
    token: String,
    channel_id: u64,
}

impl DiscordNotifier {
    /// Resolve the destination channel once at startup.
    ///
    /// An invalid token or unknown channel fails here, before the alert
    /// loop ever starts.
    pub async fn connect(token: &str, channel_id: u64) -> Result<Self> {
        let client = reqwest::Client::new();
        let url = format!("{DISCORD_API_BASE}/channels/{channel_id}");
        let response = client
            .get(&url)
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await
            .context("channel lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("channel {channel_id} could not be resolved (HTTP {status}): {body}");
        }
        let channel: ChannelResponse = response
            .json()
            .await
            .context("channel lookup response was not valid JSON")?;
        println!(
            "✅ Connected to channel: {}",
            channel.name.as_deref().unwrap_or("(unnamed)")
        );

        Ok(Self {
            client,
            token: token.to_string(),
            channel_id,
        })
    }
}

impl Notifier for DiscordNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{DISCORD_API_BASE}/channels/{}/messages", self.channel_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .context("message dispatch failed")?;
        if !response.status().is_success() {
            bail!("message dispatch returned HTTP {}", response.status());
        }
        Ok(())
    }
}
