//! Meme tools.
//!
//! Each chat command maps to one source (and category for listing sources).
//! The reply carries the caption and filename as JSON text plus the image
//! itself as base64 image content.

use base64::{Engine, prelude::BASE64_STANDARD};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use memebot_client::MemeResult;

use crate::state::ServerState;

/// A chat command bound to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: &'static str,
    pub source: &'static str,
    pub category: Option<&'static str>,
}

pub const PLANETANEPERIANO: Command =
    Command { name: "planetaneperiano", source: "planetaneperiano", category: Some("general") };
pub const GAMER: Command = Command { name: "gamer", source: "planetaneperiano", category: Some("gamer") };
pub const OTAKU: Command = Command { name: "otaku", source: "planetaneperiano", category: Some("otaku") };
pub const CUANTARAZON: Command = Command { name: "cuantarazon", source: "cuantarazon", category: None };
pub const CUANTOCABRON: Command = Command { name: "cuantocabron", source: "cuantocabron", category: None };

/// Commands exposed as dedicated tools.
pub const COMMANDS: &[Command] = &[PLANETANEPERIANO, GAMER, OTAKU, CUANTARAZON, CUANTOCABRON];

/// Input parameters for the generic meme tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemeParams {
    /// Source name: "planetaneperiano", "cuantarazon" or "cuantocabron".
    pub source: String,

    /// Listing category ("general", "gamer", "otaku"); only used by planetaneperiano.
    #[serde(default)]
    pub category: Option<String>,
}

/// JSON part of a meme reply.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemeOutput {
    /// Caption, optionally followed by the image URL.
    pub text: String,
    /// Attachment filename.
    pub filename: String,
    /// Attachment MIME type.
    pub mime_type: String,
    /// Attachment size in bytes.
    pub size_bytes: usize,
    /// Where the image was downloaded from.
    pub image_url: String,
}

impl MemeOutput {
    pub fn new(meme: &MemeResult, include_source_url: bool) -> Self {
        let mime = mime_guess::from_ext(meme.extension.trim_start_matches('.')).first_or_octet_stream();
        Self {
            text: meme.reply_text(include_source_url),
            filename: meme.filename(),
            mime_type: mime.essence_str().to_string(),
            size_bytes: meme.payload.len(),
            image_url: meme.image_url.to_string(),
        }
    }
}

/// Implementation of the generic meme tool.
pub async fn meme_impl(state: &ServerState, params: MemeParams) -> Result<CallToolResult, McpError> {
    let rule = state.rule(&params.source)?;
    let meme = state
        .fetcher
        .fetch_meme(rule, params.category.as_deref(), state.config.max_meme_size)
        .await?;

    tracing::info!(source = rule.name, filename = %meme.filename(), size = meme.payload.len(), "meme fetched");

    Ok(reply(&meme, state.config.include_source_url))
}

/// Implementation of the per-command tools.
pub async fn command_impl(state: &ServerState, command: &Command) -> Result<CallToolResult, McpError> {
    let params = MemeParams { source: command.source.to_string(), category: command.category.map(str::to_string) };
    meme_impl(state, params).await
}

fn reply(meme: &MemeResult, include_source_url: bool) -> CallToolResult {
    let output = MemeOutput::new(meme, include_source_url);
    let image = BASE64_STANDARD.encode(&meme.payload);

    CallToolResult::success(vec![
        Content::text(serde_json::to_string_pretty(&output).unwrap_or_default()),
        Content::image(image, output.mime_type),
    ])
}
