//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::ServerState;
use crate::tools::cache_purge::{CachePurgeParams, purge_impl};
use crate::tools::meme::{self, MemeParams, command_impl, meme_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for memebot.
#[derive(Clone)]
pub struct MemeServer {
    tool_router: ToolRouter<Self>,
    state: Arc<ServerState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// One tool per chat command, plus the generic `meme` tool and cache maintenance.
#[tool_router]
impl MemeServer {
    /// Create a new server handler.
    pub fn new(state: ServerState) -> Self {
        Self { tool_router: Self::tool_router(), state: Arc::new(state) }
    }

    #[tool(description = "Random meme from planetaneperiano (general category). Returns the caption and the image.")]
    async fn planetaneperiano(&self) -> Result<CallToolResult, McpError> {
        command_impl(&self.state, &meme::PLANETANEPERIANO).await
    }

    #[tool(description = "Random gamer meme from planetaneperiano. Returns the caption and the image.")]
    async fn gamer(&self) -> Result<CallToolResult, McpError> {
        command_impl(&self.state, &meme::GAMER).await
    }

    #[tool(description = "Random otaku meme from planetaneperiano. Returns the caption and the image.")]
    async fn otaku(&self) -> Result<CallToolResult, McpError> {
        command_impl(&self.state, &meme::OTAKU).await
    }

    #[tool(description = "Random meme from cuantarazon. Returns the caption and the image.")]
    async fn cuantarazon(&self) -> Result<CallToolResult, McpError> {
        command_impl(&self.state, &meme::CUANTARAZON).await
    }

    #[tool(description = "Random meme from cuantocabron. Returns the caption and the image.")]
    async fn cuantocabron(&self) -> Result<CallToolResult, McpError> {
        command_impl(&self.state, &meme::CUANTOCABRON).await
    }

    /// Fetch a meme from any configured source.
    ///
    /// Up to 10 candidates are tried; the first one under the size limit wins,
    /// otherwise the smallest oversized one is returned.
    #[tool(description = "Fetch a random meme from a named source, optionally restricted to a category.")]
    async fn meme(&self, params: Parameters<MemeParams>) -> Result<CallToolResult, McpError> {
        meme_impl(&self.state, params.0).await
    }

    #[tool(description = "Purge cached images. Can purge expired entries and/or keep only the newest N entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.state.cache.as_ref(), params.0).await
    }
}

impl ServerHandler for MemeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "memebot".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Each tool returns a meme caption as text and the meme image as an attachment.".into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
