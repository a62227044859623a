//! HTTP handlers

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use civic_core::{CATEGORIES, Issue, IssueFilter, LocationInput, NewIssue, StatusUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{Admin, Authenticated};
use crate::error::{ApiError, ApiResult};
use crate::geocode::{GeocodeRequest, GeocodeResult};
use crate::media::Upload;
use crate::state::AppState;

/// Issue fields as submitted, before the caller and image are resolved
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: Option<LocationInput>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// Already-hosted image URL (JSON submissions only)
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of `POST /issues`: multipart form (with optional `image` file part)
/// or JSON
pub struct CreateIssueForm {
    pub fields: CreateIssueFields,
    pub image: Option<Upload>,
}

impl FromRequest<Arc<AppState>> for CreateIssueForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            read_multipart(multipart).await
        } else {
            let Json(fields) = Json::<CreateIssueFields>::from_request(req, state).await?;
            Ok(Self {
                fields,
                image: None,
            })
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> ApiResult<CreateIssueForm> {
    let mut fields = CreateIssueFields::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    image = Some(Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "title" => fields.title = field.text().await?,
            "description" => fields.description = field.text().await?,
            "category" => fields.category = field.text().await?,
            "location" => fields.location = Some(LocationInput::Text(field.text().await?)),
            "createdBy" => fields.created_by = Some(field.text().await?),
            _ => {
                tracing::debug!(field = %name, "ignoring unknown form field");
            }
        }
    }

    Ok(CreateIssueForm { fields, image })
}

#[derive(Debug, Deserialize)]
pub struct UpvoteRequest {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
    pub issue: Issue,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Well-known categories for the submission form and feed filter
pub async fn categories() -> impl IntoResponse {
    Json(CATEGORIES)
}

/// List issues, newest first
pub async fn list_issues(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<IssueFilter>,
) -> ApiResult<Json<Vec<Issue>>> {
    let issues = state.issues.list(&filter)?;
    Ok(Json(issues))
}

/// Get a single issue by ID
pub async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Issue>> {
    Ok(Json(state.issues.get(&id)?))
}

/// Create a new issue
pub async fn create_issue(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    form: CreateIssueForm,
) -> ApiResult<(StatusCode, Json<Issue>)> {
    let CreateIssueForm { fields, image } = form;

    let created_by = fields
        .created_by
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| caller.user_id.clone());
    if !caller.can_act_as(&created_by) {
        return Err(ApiError::Forbidden(format!(
            "{} may not report issues as {}",
            caller.user_id, created_by
        )));
    }

    let location = fields
        .location
        .ok_or_else(|| civic_core::Error::Validation("location is required".into()))?;

    let mut input = NewIssue {
        title: fields.title,
        description: fields.description,
        category: fields.category,
        location,
        created_by,
        image: fields.image,
    };
    // Reject bad input before anything is uploaded
    input.validate()?;

    if let Some(upload) = image {
        input.image = Some(state.media.store(&state.media_config, upload).await?);
    }

    let issue = state.issues.create(input)?;
    tracing::info!(
        id = %issue.id,
        category = %issue.category,
        created_by = %issue.created_by,
        has_image = issue.image.is_some(),
        "issue created"
    );
    Ok((StatusCode::CREATED, Json(issue)))
}

/// Toggle the caller's upvote
pub async fn toggle_upvote(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    body: Result<Json<UpvoteRequest>, JsonRejection>,
) -> ApiResult<Json<Issue>> {
    let Json(req) = body?;
    let user_id = req.user_id.unwrap_or_default();
    let user_id = user_id.trim();

    if !user_id.is_empty() && !caller.can_act_as(user_id) {
        return Err(ApiError::Forbidden(format!(
            "{} may not upvote as {}",
            caller.user_id, user_id
        )));
    }

    let issue = state.issues.toggle_upvote(&id, user_id)?;
    tracing::info!(
        id = %issue.id,
        user_id = %user_id,
        upvoted = issue.upvotes.contains(user_id),
        count = issue.upvote_count(),
        "upvote toggled"
    );
    Ok(Json(issue))
}

/// Change an issue's status (admin only)
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    admin: Admin,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(update) = body?;
    let issue = state
        .issues
        .update_status(&admin.capability, &id, &update)?;
    tracing::info!(
        id = %issue.id,
        status = %issue.status,
        admin = %admin.capability.admin_id(),
        "status updated"
    );
    Ok(Json(StatusResponse {
        message: "Issue status updated".to_string(),
        issue,
    }))
}

/// Resolve an address to coordinates
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GeocodeRequest>, JsonRejection>,
) -> ApiResult<Json<GeocodeResult>> {
    let Json(req) = body?;
    let geocoder = state
        .geocoder
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("geocoder is not configured".into()))?;
    let full_address = req.full_address.unwrap_or_default();
    Ok(Json(geocoder.lookup(&full_address).await?))
}
