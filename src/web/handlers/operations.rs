use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{AppResult, WebError};
use crate::ingestor::ImportRequest;
use crate::models::ImportJobResult;
use crate::roster;
use crate::web::{
    auth::authenticate,
    responses::{handle_error, ok, ImportResponse},
    AppState,
};

/// Form fields that name the target team
const TEAM_ID_FIELDS: &[&str] = &["teamId", "team_id"];

/// Import a spreadsheet of operations
///
/// The bearer token is verified before any of the body is read; the import
/// quota is charged once a file has been received.
pub async fn import_operations(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match run_import(&state, &headers, multipart).await {
        Ok(result) => ImportResponse::completed(result).into_response(),
        Err(error) => handle_error(error),
    }
}

async fn run_import(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ImportJobResult> {
    let caller_id = authenticate(state.verifier.as_ref(), headers).await?;

    let multipart = multipart.map_err(|rejection| WebError::invalid_request(rejection.body_text()))?;
    let upload = read_upload(multipart, state.max_request_size).await?;

    let file_name = upload.file_name.unwrap_or_default();
    let bytes = upload
        .bytes
        .ok_or_else(|| WebError::invalid_request("No file was uploaded"))?;

    // Only well-formed uploads count against the quota
    state.rate_limiter.check_and_record(&caller_id).await?;

    info!(
        "Import of '{}' ({} bytes) requested by {}",
        file_name,
        bytes.len(),
        caller_id
    );

    let result = state
        .pipeline
        .run(ImportRequest {
            file_name,
            bytes,
            caller_id,
            team_id: upload.team_id,
        })
        .await?;

    Ok(result)
}

#[derive(Default)]
struct Upload {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    team_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart, max_request_size: usize) -> Result<Upload, WebError> {
    let mut upload = Upload::default();

    let field_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            WebError::PayloadTooLarge {
                max_size: max_request_size,
            }
        } else {
            WebError::invalid_request(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(field_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            upload.file_name = field.file_name().map(str::to_string);
            upload.bytes = Some(field.bytes().await.map_err(field_error)?.to_vec());
        } else if TEAM_ID_FIELDS.contains(&name.as_str()) {
            let value = field.text().await.map_err(field_error)?;
            let value = value.trim();
            if !value.is_empty() {
                upload.team_id = Some(value.to_string());
            }
        } else {
            debug!("Ignoring multipart field '{}'", name);
        }
    }

    Ok(upload)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOperationsQuery {
    #[serde(rename = "teamId", alias = "team_id")]
    pub team_id: Option<String>,
}

/// List the operations stored for the caller's team
pub async fn list_operations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListOperationsQuery>,
) -> Response {
    let result: AppResult<_> = async {
        let caller_id = authenticate(state.verifier.as_ref(), &headers).await?;
        let team_id = roster::resolve_effective_team_id(
            state.roster_store.as_ref(),
            &caller_id,
            query.team_id.as_deref(),
        )
        .await;
        Ok(state.operation_store.list_team_operations(&team_id).await?)
    }
    .await;

    match result {
        Ok(operations) => ok(operations).into_response(),
        Err(error) => handle_error(error),
    }
}
