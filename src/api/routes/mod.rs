pub mod chat;
pub mod documents;
pub mod health;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::middleware;
use axum::{routing::delete, routing::get, routing::post, routing::put, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::middleware::{rate_limit, request_logger, security_headers, RateLimiter};
use crate::api::state::AppState;
use crate::infrastructure::extract::MAX_DOCUMENT_BYTES;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.cors_allowed_origins);
    let limiter = Arc::new(RateLimiter::new(&state.config.rate_limit));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_v1_routes())
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Multipart uploads may carry up to the document ceiling plus
        // encoding overhead.
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES + 1024 * 1024))
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(documents::add_documents))
        .route("/documents", get(documents::list_documents))
        .route("/documents/search", post(documents::search_documents))
        .route("/documents/stats", get(documents::collection_stats))
        .route("/documents/reset", post(documents::reset_collection))
        .route("/documents/upload", post(documents::upload_file))
        .route(
            "/documents/upload-multiple",
            post(documents::upload_multiple_files),
        )
        .route("/documents/supported-types", get(documents::supported_types))
        .route("/documents/{id}", get(documents::get_document))
        .route("/documents/{id}", put(documents::update_document))
        .route("/documents/{id}", delete(documents::delete_document))
        .route("/chat", post(chat::chat))
        .route("/chat/conversation/{id}", get(chat::get_conversation))
        .route("/chat/conversation/{id}", delete(chat::delete_conversation))
        .route("/chat/session/start", post(chat::start_session))
        .route("/chat/session/reset", post(chat::reset_session))
        .route("/chat/session/history", get(chat::session_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ChatService, DocumentService};
    use crate::domain::ports::LlmService;
    use crate::domain::DomainError;
    use crate::infrastructure::config::{
        AppConfig, ChromaConfig, GeminiConfig, RagConfig, RateLimitConfig, ServerConfig,
    };
    use crate::infrastructure::memory::{InMemoryConversationStore, InMemoryVectorStore};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct ScriptedLlm;

    #[async_trait]
    impl LlmService for ScriptedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, DomainError> {
            Ok("scripted answer".to_string())
        }

        async fn generate_with_system(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<String, DomainError> {
            Ok("scripted answer".to_string())
        }
    }

    fn test_config(max_requests: usize) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            gemini: GeminiConfig {
                api_key: "test".into(),
                model: "test-model".into(),
                base_url: "http://localhost:0".into(),
                timeout_seconds: 1,
            },
            chroma: ChromaConfig {
                url: "http://localhost:0".into(),
                collection: "documents".into(),
                timeout_seconds: 1,
            },
            rag: RagConfig {
                similarity_threshold: 0.2,
                max_context_docs: 3,
                system_prompt: "You are a test assistant.".into(),
            },
            redis_url: "redis://localhost:6379".into(),
            conversation_ttl_seconds: 60,
            rate_limit: RateLimitConfig {
                max_requests,
                window_seconds: 60,
            },
            cors_allowed_origins: vec!["*".into()],
        }
    }

    fn test_app(max_requests: usize) -> Router {
        let store = Arc::new(InMemoryVectorStore::new());
        let documents = Arc::new(DocumentService::new(store.clone(), 0.2));
        let config = Arc::new(test_config(max_requests));
        let chat = Arc::new(ChatService::new(
            documents.clone(),
            Arc::new(ScriptedLlm),
            Arc::new(InMemoryConversationStore::new()),
            &config.rag,
        ));
        create_router(AppState::new(documents, chat, store, config))
    }

    fn app() -> Router {
        test_app(1000)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_req(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
        multipart_multi_req(uri, &[(filename, content)])
    }

    fn multipart_multi_req(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (filename, content) in files {
            body.extend_from_slice(
                format!(
                    "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"files\"; \
                     filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"--XBOUNDARY--\r\n");

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app();
        let (status, body) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_root_banner() {
        let app = app();
        let (status, body) = send(&app, get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("RAG"));
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let app = app();
        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().contains_key("x-process-time"));
    }

    #[tokio::test]
    async fn test_document_crud_flow() {
        let app = app();

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/api/v1/documents",
                json!({
                    "documents": ["Python is a programming language"],
                    "metadatas": [{"category": "programming"}],
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["auto_generated_ids"], true);
        let id = body["document_ids"][0].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            json_req(
                "POST",
                "/api/v1/documents/search",
                json!({"query": "What is Python?", "n_results": 3}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["id"] == id.as_str()));

        let (status, body) = send(&app, get_req(&format!("/api/v1/documents/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"], "Python is a programming language");

        let (status, _) = send(
            &app,
            json_req(
                "PUT",
                &format!("/api/v1/documents/{id}"),
                json!({"document": "Python is versatile"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/documents/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_req(&format!("/api/v1/documents/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
        assert!(body["error"]["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let app = app();
        send(
            &app,
            json_req("POST", "/api/v1/documents", json!({"documents": ["a", "b"]})),
        )
        .await;

        let (status, body) = send(&app, get_req("/api/v1/documents/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_documents"], 2);

        let (status, _) = send(
            &app,
            json_req("POST", "/api/v1/documents/reset", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get_req("/api/v1/documents/stats")).await;
        assert_eq!(body["total_documents"], 0);
    }

    #[tokio::test]
    async fn test_upload_unsupported_type_is_400() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart_req("/api/v1/documents/upload", "file.exe", b"MZ"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validation_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported file type"));
    }

    #[tokio::test]
    async fn test_upload_text_file() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart_req(
                "/api/v1/documents/upload",
                "notes.txt",
                b"Rust is a systems language",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "notes.txt");
        assert!(body["document_id"].is_string());
        assert_eq!(body["metadata"]["extraction_method"], "text");
    }

    #[tokio::test]
    async fn test_multi_upload_keeps_going_past_bad_file() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart_multi_req(
                "/api/v1/documents/upload-multiple",
                &[
                    ("notes.txt", b"Rust is a systems language".as_slice()),
                    ("payload.exe", b"MZ".as_slice()),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["successful_uploads"], 1);
        assert_eq!(body["failed_uploads"], 1);
        assert_eq!(body["document_ids"].as_array().unwrap().len(), 1);
        assert_eq!(body["failed_files"][0]["filename"], "payload.exe");
        assert!(body["failed_files"][0]["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported file type"));

        // The good file made it into the collection.
        let (_, stats) = send(&app, get_req("/api/v1/documents/stats")).await;
        assert_eq!(stats["total_documents"], 1);
    }

    #[tokio::test]
    async fn test_list_documents_previews_content() {
        let app = app();
        let long = "a".repeat(150);
        send(
            &app,
            json_req("POST", "/api/v1/documents", json!({"documents": [long]})),
        )
        .await;

        let (status, body) = send(&app, get_req("/api/v1/documents")).await;
        assert_eq!(status, StatusCode::OK);
        let listed = &body.as_array().unwrap()[0];
        assert_eq!(listed["content_length"], 150);
        let preview = listed["content_preview"].as_str().unwrap();
        assert_eq!(preview.len(), 103);
        assert!(preview.ends_with("..."));
    }

    #[tokio::test]
    async fn test_supported_types_listing() {
        let app = app();
        let (status, body) = send(&app, get_req("/api/v1/documents/supported-types")).await;
        assert_eq!(status, StatusCode::OK);
        let extensions: Vec<&str> = body["supported_extensions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(extensions.contains(&".pdf"));
        assert!(extensions.contains(&".txt"));
        assert_eq!(body["max_file_size_mb"], 50.0);
        assert_eq!(body["max_image_size_mb"], 10.0);
    }

    #[tokio::test]
    async fn test_chat_without_documents_reports_no_sources() {
        let app = app();
        let (status, body) = send(
            &app,
            json_req("POST", "/api/v1/chat", json!({"message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "scripted answer");
        assert_eq!(body["rag_used"], false);
        assert!(body.get("sources").is_none());
    }

    #[tokio::test]
    async fn test_chat_with_documents_cites_sources() {
        let app = app();
        send(
            &app,
            json_req(
                "POST",
                "/api/v1/documents",
                json!({"documents": ["Python is a programming language"]}),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            json_req("POST", "/api/v1/chat", json!({"message": "What is Python?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rag_used"], true);
        assert_eq!(body["sources"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conversation_round_trip() {
        let app = app();
        let (_, body) = send(
            &app,
            json_req(
                "POST",
                "/api/v1/chat",
                json!({"message": "hello", "use_rag": false}),
            ),
        )
        .await;
        let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            get_req(&format!("/api/v1/chat/conversation/{conversation_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");

        let (status, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/chat/conversation/{conversation_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            get_req(&format!("/api/v1/chat/conversation/{conversation_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_endpoints() {
        let app = app();
        let (status, body) = send(
            &app,
            json_req("POST", "/api/v1/chat/session/start", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["conversation_id"].is_string());

        let (status, body) = send(&app, get_req("/api/v1/chat/session/history")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["history"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            json_req("POST", "/api/v1/chat/session/reset", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_chat_message_is_400() {
        let app = app();
        let (status, body) = send(
            &app,
            json_req("POST", "/api/v1/chat", json!({"message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess_requests() {
        let app = test_app(2);
        let (status, _) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);

        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");
    }
}
