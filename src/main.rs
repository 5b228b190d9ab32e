use std::net::SocketAddr;
use std::sync::Arc;

use rag_gateway::api::{create_router, AppState};
use rag_gateway::application::{ChatService, DocumentService};
use rag_gateway::infrastructure::{
    create_pool, AppConfig, ChromaVectorStore, GeminiLlm, RedisConversationStore,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::from_env());

    let vector_store = Arc::new(ChromaVectorStore::connect(&config.chroma).await?);
    info!(collection = %config.chroma.collection, "Chroma collection ready");

    let llm = Arc::new(GeminiLlm::new(&config.gemini)?);

    let redis_pool = create_pool(&config.redis_url)?;
    info!("Redis pool initialized");
    let conversations = Arc::new(RedisConversationStore::new(
        redis_pool.clone(),
        config.conversation_ttl_seconds,
    ));

    let documents = Arc::new(DocumentService::new(
        vector_store.clone(),
        config.rag.similarity_threshold,
    ));
    let chat = Arc::new(ChatService::new(
        documents.clone(),
        llm,
        conversations,
        &config.rag,
    ));

    let state = AppState::new(documents, chat, vector_store, config.clone())
        .with_redis_pool(redis_pool);
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
