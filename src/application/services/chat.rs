use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::application::services::DocumentService;
use crate::domain::{
    ports::{ConversationStore, LlmService},
    Conversation, DomainError, Message, MessageRole, RagContext, SearchResult,
};
use crate::infrastructure::config::RagConfig;

#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub message: String,
    pub conversation_id: Option<String>,
    pub use_rag: bool,
    pub max_context_docs: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub conversation_id: String,
    pub sources: Vec<SearchResult>,
    pub rag_used: bool,
}

pub struct ChatService {
    documents: Arc<DocumentService>,
    llm: Arc<dyn LlmService>,
    conversations: Arc<dyn ConversationStore>,
    session: RwLock<Option<Conversation>>,
    system_prompt: String,
    max_context_docs: usize,
}

impl ChatService {
    pub fn new(
        documents: Arc<DocumentService>,
        llm: Arc<dyn LlmService>,
        conversations: Arc<dyn ConversationStore>,
        config: &RagConfig,
    ) -> Self {
        Self {
            documents,
            llm,
            conversations,
            session: RwLock::new(None),
            system_prompt: config.system_prompt.clone(),
            max_context_docs: config.max_context_docs,
        }
    }

    #[instrument(skip(self, prompt), fields(use_rag = prompt.use_rag))]
    pub async fn chat(&self, prompt: ChatPrompt) -> Result<ChatOutcome, DomainError> {
        if prompt.message.trim().is_empty() {
            return Err(DomainError::validation("Message cannot be empty"));
        }

        // An unknown or expired conversation id simply starts a fresh
        // conversation under that id.
        let mut conversation = match &prompt.conversation_id {
            Some(id) => match self.conversations.get(id).await? {
                Some(existing) => existing,
                None => Conversation::with_id(id.clone()),
            },
            None => Conversation::new(),
        };

        let rag = if prompt.use_rag {
            let max_docs = prompt.max_context_docs.unwrap_or(self.max_context_docs);
            let ctx = self.documents.rag_context(&prompt.message, max_docs).await;
            info!(
                included = ctx.included_docs,
                total = ctx.total_found,
                context_chars = ctx.context.len(),
                "RAG retrieval completed"
            );
            if ctx.is_empty() {
                warn!("no documents cleared the similarity threshold, answering without context");
            }
            ctx
        } else {
            RagContext::empty()
        };

        let llm_prompt = build_prompt(&rag, &conversation.messages, &prompt.message);
        let answer = self
            .llm
            .generate_with_system(&self.system_prompt, &llm_prompt)
            .await?;

        conversation.add_message(MessageRole::User, &prompt.message);
        conversation.add_message(MessageRole::Assistant, &answer);
        self.conversations.save(&conversation).await?;

        let rag_used = !rag.is_empty();
        Ok(ChatOutcome {
            response: answer,
            conversation_id: conversation.id,
            sources: rag.sources,
            rag_used,
        })
    }

    pub async fn conversation(&self, id: &str) -> Result<Conversation, DomainError> {
        self.conversations
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Conversation '{id}' not found")))
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), DomainError> {
        if !self.conversations.delete(id).await? {
            return Err(DomainError::not_found(format!(
                "Conversation '{id}' not found"
            )));
        }
        Ok(())
    }

    pub async fn start_session(&self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        *self.session.write().await = Some(conversation);
        id
    }

    pub async fn reset_session(&self) {
        *self.session.write().await = None;
    }

    pub async fn session_history(&self) -> Vec<Message> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }
}

// Prompt order: retrieved context first, then prior turns, then the
// current question.
fn build_prompt(rag: &RagContext, history: &[Message], message: &str) -> String {
    let mut parts = Vec::new();

    if !rag.is_empty() {
        parts.push(format!("Context: {}", rag.context));
    }

    if !history.is_empty() {
        let transcript = history
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("Previous conversation:\n{transcript}"));
    }

    parts.push(format!("Question: {message}"));
    parts.join("\n\n")
}
