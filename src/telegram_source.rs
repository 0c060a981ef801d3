//! # Telegram Live Source Module
//!
//! Reads channel history directly over MTProto with a user account, the
//! same way a Telegram app does. The first run asks for the login code on
//! stdin and saves the session file; later runs reuse it.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use grammers_client::types::Chat;
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_mtsender::InvocationError;
use grammers_session::{PackedChat, PackedType, Session};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::errors::SourceError;
use crate::message_source::{MessageSource, ScrapedMessage};

/// Map a Telegram RPC error name to the source error it stands for
pub fn source_error_from_rpc(channel: &str, rpc_name: &str) -> SourceError {
    match rpc_name {
        "USERNAME_NOT_OCCUPIED" | "USERNAME_INVALID" => {
            SourceError::UsernameNotFound(channel.to_string())
        }
        "CHANNEL_PRIVATE" | "CHANNEL_INVALID" | "CHAT_FORBIDDEN" | "CHANNEL_PUBLIC_GROUP_NA" => {
            SourceError::ChannelPrivate(channel.to_string())
        }
        other => SourceError::Unavailable(format!("{channel}: {other}")),
    }
}

fn source_error(channel: &str, err: InvocationError) -> SourceError {
    match err {
        InvocationError::Rpc(rpc) => source_error_from_rpc(channel, &rpc.name),
        other => SourceError::Unavailable(format!("{channel}: {other}")),
    }
}

/// Bot-API style id (`-100…` for channels and supergroups)
pub fn packed_chat_id(chat: &PackedChat) -> i64 {
    match chat.ty {
        PackedType::Chat => -chat.id,
        PackedType::Megagroup | PackedType::Broadcast | PackedType::Gigagroup => {
            -(1_000_000_000_000 + chat.id)
        }
        _ => chat.id,
    }
}

async fn prompt(message: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn save_session(client: &Client, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    client
        .session()
        .save_to_file(path)
        .with_context(|| format!("Failed to save Telegram session {}", path.display()))
}

/// Channel history read live with a logged-in user account
#[derive(Clone)]
pub struct TelegramLiveSource {
    client: Client,
}

impl TelegramLiveSource {
    /// Connect and make sure the session is logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, or if the session is not
    /// authorized and the interactive login does not succeed.
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let session = Session::load_file_or_create(&config.session_path).with_context(|| {
            format!(
                "Failed to open Telegram session {}",
                config.session_path.display()
            )
        })?;

        info!(session = %config.session_path.display(), "Connecting to Telegram");
        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .context("Failed to connect to Telegram")?;

        if !client
            .is_authorized()
            .await
            .context("Failed to check Telegram authorization")?
        {
            Self::login(&client, config).await?;
            save_session(&client, &config.session_path)?;
        }

        info!("Telegram session authorized");
        Ok(Self { client })
    }

    async fn login(client: &Client, config: &TelegramConfig) -> Result<()> {
        let phone = config
            .phone
            .as_deref()
            .ok_or_else(|| anyhow!("TELEGRAM_PHONE must be set for the first login"))?;

        info!("Requesting Telegram login code");
        let token = client
            .request_login_code(phone)
            .await
            .context("Failed to request login code")?;
        let code = prompt("Enter the code Telegram sent you: ").await?;

        match client.sign_in(&token, &code).await {
            Ok(_) => Ok(()),
            Err(SignInError::PasswordRequired(password_token)) => {
                let password = match &config.password {
                    Some(password) => password.clone(),
                    None => prompt("Enter the two-step verification password: ").await?,
                };
                client
                    .check_password(password_token, password.trim())
                    .await
                    .context("Two-step verification failed")?;
                Ok(())
            }
            Err(e) => Err(anyhow!("Telegram sign-in failed: {e}")),
        }
    }

    async fn resolve(&self, channel: &str) -> Result<Chat, SourceError> {
        self.client
            .resolve_username(channel)
            .await
            .map_err(|e| source_error(channel, e))?
            .ok_or_else(|| SourceError::UsernameNotFound(channel.to_string()))
    }
}

#[async_trait]
impl MessageSource for TelegramLiveSource {
    async fn check_access(&self, channel: &str) -> Result<(), SourceError> {
        let chat = self.resolve(channel).await?;
        // Resolving works for private channels too; reading is what fails
        let mut messages = self.client.iter_messages(chat.pack()).limit(1);
        messages
            .next()
            .await
            .map_err(|e| source_error(channel, e))?;
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMessage>, SourceError> {
        let chat = self.resolve(channel).await?.pack();
        let chat_id = packed_chat_id(&chat);

        let mut iter = self.client.iter_messages(chat).limit(limit);
        let mut messages = Vec::new();
        while let Some(message) = iter.next().await.map_err(|e| source_error(channel, e))? {
            let text = Some(message.text().to_string()).filter(|t| !t.trim().is_empty());
            messages.push(ScrapedMessage {
                id: i64::from(message.id()),
                chat_id,
                text,
            });
        }
        // History arrives newest first
        messages.reverse();

        debug!(channel, count = messages.len(), "Fetched channel history");
        Ok(messages)
    }
}
