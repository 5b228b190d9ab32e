use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::application::ChatPrompt;
use crate::domain::{Message, Metadata, SearchResult};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    pub max_context_docs: Option<usize>,
}

fn default_use_rag() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceResponse>>,
    pub rag_used: bool,
}

#[derive(Debug, Serialize)]
pub struct SourceResponse {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl From<SearchResult> for SourceResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.document.id,
            score: result.score,
            metadata: result.document.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageDto {
    pub role: String,
    pub content: String,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            role: message.role.as_str().to_lowercase(),
            content: message.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub messages: Vec<MessageDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionHistoryResponse {
    pub history: Vec<MessageDto>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let outcome = state
        .chat
        .chat(ChatPrompt {
            message: request.message,
            conversation_id: request.conversation_id,
            use_rag: request.use_rag,
            max_context_docs: request.max_context_docs,
        })
        .await?;

    let sources = if outcome.sources.is_empty() {
        None
    } else {
        Some(outcome.sources.into_iter().map(Into::into).collect())
    };

    Ok(Json(ChatResponse {
        response: outcome.response,
        conversation_id: outcome.conversation_id,
        sources,
        rag_used: outcome.rag_used,
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation = state.chat.conversation(&id).await?;
    Ok(Json(ConversationResponse {
        conversation_id: conversation.id,
        messages: conversation.messages.into_iter().map(Into::into).collect(),
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    }))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    state.chat.delete_conversation(&id).await?;
    Ok(Json(SessionResponse {
        message: "Conversation deleted successfully".to_string(),
        conversation_id: Some(id),
    }))
}

pub async fn start_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let conversation_id = state.chat.start_session().await;
    Json(SessionResponse {
        message: "Chat session started successfully".to_string(),
        conversation_id: Some(conversation_id),
    })
}

pub async fn reset_session(State(state): State<AppState>) -> Json<SessionResponse> {
    state.chat.reset_session().await;
    Json(SessionResponse {
        message: "Chat session reset successfully".to_string(),
        conversation_id: None,
    })
}

pub async fn session_history(State(state): State<AppState>) -> Json<SessionHistoryResponse> {
    let history = state.chat.session_history().await;
    Json(SessionHistoryResponse {
        history: history.into_iter().map(Into::into).collect(),
    })
}
