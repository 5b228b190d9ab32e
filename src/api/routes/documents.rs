use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::domain::{CollectionStats, Document, Metadata, SearchResult};
use crate::infrastructure::extract::{MAX_DOCUMENT_BYTES, MAX_IMAGE_BYTES};

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<String>,
    pub metadatas: Option<Vec<Metadata>>,
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AddDocumentsResponse {
    pub message: String,
    pub document_ids: Vec<String>,
    pub auto_generated_ids: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    pub min_score: Option<f32>,
    #[serde(rename = "where")]
    pub filter: Option<Metadata>,
}

fn default_n_results() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct SearchResultResponse {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub score: f32,
    pub rank: usize,
}

impl From<SearchResult> for SearchResultResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.document.id,
            document: result.document.content,
            metadata: result.document.metadata,
            score: result.score,
            rank: result.rank,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            document: doc.content,
            metadata: doc.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListedDocumentResponse {
    pub id: String,
    pub metadata: Metadata,
    pub content_preview: String,
    pub content_length: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub document: String,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_documents: usize,
    pub collection_name: String,
}

impl From<CollectionStats> for StatsResponse {
    fn from(stats: CollectionStats) -> Self {
        Self {
            total_documents: stats.total_documents,
            collection_name: stats.collection_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SupportedTypesResponse {
    pub supported_extensions: Vec<&'static str>,
    pub supported_mime_types: Vec<&'static str>,
    pub available_extensions: Vec<&'static str>,
    pub max_file_size_mb: f64,
    pub max_image_size_mb: f64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub document_id: String,
    pub filename: String,
    pub text_length: usize,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct MultiUploadResponse {
    pub message: String,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub document_ids: Vec<String>,
    pub failed_files: Vec<FailedFile>,
}

#[derive(Debug, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

pub async fn add_documents(
    State(state): State<AppState>,
    Json(request): Json<AddDocumentsRequest>,
) -> Result<Json<AddDocumentsResponse>, ApiError> {
    let (document_ids, auto_generated_ids) = state
        .documents
        .add_documents(request.documents, request.metadatas, request.ids)
        .await?;

    Ok(Json(AddDocumentsResponse {
        message: format!("Successfully added {} documents", document_ids.len()),
        document_ids,
        auto_generated_ids,
    }))
}

pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListedDocumentResponse>>, ApiError> {
    let documents = state.documents.list().await?;
    Ok(Json(
        documents
            .into_iter()
            .map(|doc| ListedDocumentResponse {
                content_preview: doc.preview(100),
                content_length: doc.content.len(),
                id: doc.id,
                metadata: doc.metadata,
            })
            .collect(),
    ))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResultResponse>>, ApiError> {
    let results = state
        .documents
        .search(
            &request.query,
            request.n_results,
            request.min_score,
            request.filter.as_ref(),
        )
        .await?;

    Ok(Json(results.into_iter().map(Into::into).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.documents.get(&id).await?;
    Ok(Json(document.into()))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .documents
        .update(&id, &request.document, request.metadata)
        .await?;
    Ok(Json(MessageResponse {
        message: "Document updated successfully".to_string(),
        document_id: Some(id),
    }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.documents.delete(&id).await?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".to_string(),
        document_id: Some(id),
    }))
}

pub async fn collection_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.documents.stats().await?;
    Ok(Json(stats.into()))
}

pub async fn reset_collection(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.documents.reset().await?;
    Ok(Json(MessageResponse {
        message: "Collection reset successfully".to_string(),
        document_id: None,
    }))
}

pub async fn supported_types(State(state): State<AppState>) -> Json<SupportedTypesResponse> {
    let processor = state.documents.processor();
    Json(SupportedTypesResponse {
        supported_extensions: processor.supported_extensions(),
        supported_mime_types: processor.supported_mime_types(),
        available_extensions: processor.available_extensions(),
        max_file_size_mb: MAX_DOCUMENT_BYTES as f64 / (1024.0 * 1024.0),
        max_image_size_mb: MAX_IMAGE_BYTES as f64 / (1024.0 * 1024.0),
    })
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

// `metadata` may be a JSON object or a plain string, which becomes
// `{"source": value}`.
async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<(Vec<UploadedFile>, Option<Metadata>), ApiError> {
    let mut files = Vec::new();
    let mut metadata = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") | Some("files") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| ApiError::validation("File part is missing a filename"))?
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read file: {e}")))?;
                files.push(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("metadata") | Some("metadatas") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read metadata: {e}")))?;
                metadata = Some(parse_metadata_field(&raw));
            }
            _ => {}
        }
    }

    Ok((files, metadata))
}

fn parse_metadata_field(raw: &str) -> Metadata {
    match serde_json::from_str::<Metadata>(raw) {
        Ok(parsed) => parsed,
        Err(_) => {
            let mut fallback = Metadata::new();
            fallback.insert("source".into(), raw.into());
            fallback
        }
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (files, metadata) = read_multipart(&mut multipart).await?;
    let file = files
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::validation("No file provided"))?;

    let ingested = state
        .documents
        .ingest_file(&file.filename, &file.bytes, metadata)
        .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded and processed successfully".to_string(),
        document_id: ingested.document_id,
        filename: ingested.filename,
        text_length: ingested.text_length,
        metadata: ingested.metadata,
    }))
}

pub async fn upload_multiple_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MultiUploadResponse>, ApiError> {
    let (files, metadata) = read_multipart(&mut multipart).await?;
    if files.is_empty() {
        return Err(ApiError::validation("No files provided"));
    }

    let total = files.len();
    let mut document_ids = Vec::new();
    let mut failed_files = Vec::new();

    // Files are processed independently; one bad file does not abort the
    // batch.
    for file in files {
        match state
            .documents
            .ingest_file(&file.filename, &file.bytes, metadata.clone())
            .await
        {
            Ok(ingested) => document_ids.push(ingested.document_id),
            Err(e) => failed_files.push(FailedFile {
                filename: file.filename,
                error: e.to_string(),
            }),
        }
    }

    Ok(Json(MultiUploadResponse {
        message: format!("Processed {total} files"),
        successful_uploads: document_ids.len(),
        failed_uploads: failed_files.len(),
        document_ids,
        failed_files,
    }))
}
