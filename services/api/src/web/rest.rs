//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use acrostic_core::constraint::required_count;
use acrostic_core::contribution::{self, NewBranchRequest};
use acrostic_core::domain::{
    Branch, BranchFilter, BranchStatus, Identity, Level, UnknownLevel, UnknownStatus, VoteValue,
};
use acrostic_core::export::compile_from_store;
use acrostic_core::reference::Reference;
use acrostic_core::selection::{Competition, RankedBranch};
use acrostic_core::validation::{parse_letter_constraint, validate};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        export_handler,
        constraints_handler,
        validate_handler,
        list_branches_handler,
        create_branch_handler,
        vote_handler,
        canonical_handler,
        status_handler,
    ),
    components(
        schemas(
            ErrorBody,
            ConstraintsResponse,
            ValidateRequest,
            ValidateResponse,
            BranchResponse,
            RankedBranchResponse,
            CompetitionResponse,
            CreateBranchRequest,
            VoteRequest,
            CanonicalRequest,
            StatusRequest,
        )
    ),
    tags(
        (name = "Acrostic API", description = "Contribute, vote on and export acrostic Scripture mnemonics.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A branch as returned by the API.
#[derive(Serialize, ToSchema)]
pub struct BranchResponse {
    id: Uuid,
    level: String,
    reference: String,
    parent_branch_id: Option<Uuid>,
    content: String,
    letter_constraint: Option<String>,
    is_canonical: bool,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            level: branch.level.to_string(),
            reference: branch.reference,
            parent_branch_id: branch.parent_branch_id,
            content: branch.content,
            letter_constraint: branch.letter_constraint.map(|c| c.to_string()),
            is_canonical: branch.is_canonical,
            status: branch.status.as_str().to_string(),
            created_by: branch.created_by,
            created_at: branch.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RankedBranchResponse {
    #[serde(flatten)]
    branch: BranchResponse,
    score: i64,
}

impl From<RankedBranch> for RankedBranchResponse {
    fn from(ranked: RankedBranch) -> Self {
        Self {
            branch: ranked.branch.into(),
            score: ranked.score,
        }
    }
}

/// All branches competing for one reference, best first.
#[derive(Serialize, ToSchema)]
pub struct CompetitionResponse {
    reference: String,
    winner: Option<RankedBranchResponse>,
    alternatives_count: usize,
    branches: Vec<RankedBranchResponse>,
}

impl From<Competition> for CompetitionResponse {
    fn from(competition: Competition) -> Self {
        let mut branches: Vec<RankedBranchResponse> =
            competition.ranked.into_iter().map(Into::into).collect();
        let winner = if branches.is_empty() {
            None
        } else {
            Some(branches.remove(0))
        };
        Self {
            reference: competition.reference,
            winner,
            alternatives_count: competition.alternatives_count,
            branches,
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConstraintsQuery {
    /// One of `testament`, `book`, `chapter`, `verse`.
    level: String,
    reference: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConstraintsResponse {
    level: String,
    reference: String,
    /// Full book name, e.g. `Genesis`; absent for testaments and unknown books.
    #[serde(skip_serializing_if = "Option::is_none")]
    book_name: Option<String>,
    required_count: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateRequest {
    content: String,
    level: String,
    reference: String,
    letter_constraint: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BranchesQuery {
    level: Option<String>,
    reference: Option<String>,
    /// Comma-separated references, e.g. `GEN,EXO`.
    references: Option<String>,
    parent_id: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateBranchRequest {
    level: String,
    reference: String,
    parent_branch_id: Option<Uuid>,
    content: String,
    letter_constraint: Option<String>,
}

/// `1` up-votes, `-1` down-votes, `0` retracts the caller's vote.
#[derive(Deserialize, ToSchema)]
pub struct VoteRequest {
    value: i16,
}

#[derive(Deserialize, ToSchema)]
pub struct CanonicalRequest {
    is_canonical: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusRequest {
    /// One of `active`, `archived`, `flagged`.
    status: String,
}

fn parse_level(raw: &str) -> Result<Level, ApiError> {
    raw.parse()
        .map_err(|e: UnknownLevel| ApiError::BadRequest(e.to_string()))
}

//=========================================================================================
// Read Handlers
//=========================================================================================

/// Compile the canonical export.
///
/// Built fresh on every request from the branches currently marked canonical.
#[utoipa::path(
    get,
    path = "/export",
    responses(
        (status = 200, description = "The nested export document (meta, testaments, books)"),
        (status = 500, description = "The store could not be read", body = ErrorBody)
    )
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let document = compile_from_store(
        app_state.branches.as_ref(),
        app_state.structure.as_ref(),
        &app_state.export_version,
    )
    .await?;
    Ok(Json(document))
}

/// How many letters an acrostic at this level and reference must have.
#[utoipa::path(
    get,
    path = "/constraints",
    params(ConstraintsQuery),
    responses(
        (status = 200, description = "The required letter count; 0 when unconstrained", body = ConstraintsResponse),
        (status = 400, description = "Unknown level", body = ErrorBody)
    )
)]
pub async fn constraints_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ConstraintsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let level = parse_level(&query.level)?;
    let required_count = required_count(app_state.structure.as_ref(), level, &query.reference);
    let book_name = query
        .reference
        .parse::<Reference>()
        .ok()
        .and_then(|r| {
            r.book_code()
                .and_then(|code| app_state.structure.book(code))
                .map(|book| book.name.clone())
        });
    Ok(Json(ConstraintsResponse {
        level: level.to_string(),
        reference: query.reference,
        book_name,
        required_count,
    }))
}

/// Check a draft without saving it.
#[utoipa::path(
    post,
    path = "/validate",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ValidateResponse),
        (status = 400, description = "Unknown level", body = ErrorBody)
    )
)]
pub async fn validate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let level = parse_level(&payload.level)?;

    let outcome = payload
        .letter_constraint
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_letter_constraint)
        .transpose()
        .and_then(|letter| {
            validate(
                app_state.structure.as_ref(),
                &payload.content,
                level,
                &payload.reference,
                letter,
            )
        });

    Ok(Json(match outcome {
        Ok(()) => ValidateResponse {
            valid: true,
            error: None,
        },
        Err(e) => ValidateResponse {
            valid: false,
            error: Some(e.to_string()),
        },
    }))
}

/// Browse branches, grouped and ranked per reference.
#[utoipa::path(
    get,
    path = "/branches",
    params(BranchesQuery),
    responses(
        (status = 200, description = "One competition per reference", body = [CompetitionResponse]),
        (status = 400, description = "Unknown level", body = ErrorBody)
    )
)]
pub async fn list_branches_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<BranchesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = BranchFilter {
        level: query.level.as_deref().map(parse_level).transpose()?,
        reference: query.reference,
        reference_in: query.references.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        }),
        parent_id: query.parent_id,
        ..Default::default()
    };
    let competitions = contribution::competitions(app_state.branches.as_ref(), filter).await?;
    Ok(Json(
        competitions
            .into_iter()
            .map(CompetitionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

//=========================================================================================
// Write Handlers (session cookie required)
//=========================================================================================

/// Contribute a new branch.
///
/// When `parent_branch_id` is given and `letter_constraint` is not, the
/// constraint is taken from the parent acrostic.
#[utoipa::path(
    post,
    path = "/branches",
    request_body = CreateBranchRequest,
    responses(
        (status = 201, description = "Branch created", body = BranchResponse),
        (status = 400, description = "Invalid reference or content", body = ErrorBody),
        (status = 401, description = "Missing or invalid session", body = ErrorBody),
        (status = 404, description = "Parent branch not found", body = ErrorBody)
    )
)]
pub async fn create_branch_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateBranchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = NewBranchRequest {
        level: parse_level(&payload.level)?,
        reference: payload.reference,
        parent_branch_id: payload.parent_branch_id,
        content: payload.content,
        letter_constraint: payload.letter_constraint,
    };
    let branch = contribution::create_branch(
        app_state.branches.as_ref(),
        app_state.structure.as_ref(),
        &identity,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(BranchResponse::from(branch))))
}

/// Set the caller's vote on a branch.
#[utoipa::path(
    put,
    path = "/branches/{id}/vote",
    request_body = VoteRequest,
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 204, description = "Vote recorded"),
        (status = 400, description = "Value is not -1, 0 or 1", body = ErrorBody),
        (status = 401, description = "Missing or invalid session", body = ErrorBody),
        (status = 404, description = "Branch not found", body = ErrorBody)
    )
)]
pub async fn vote_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(branch_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let value = match payload.value {
        0 => None,
        v => Some(VoteValue::from_i16(v).ok_or_else(|| {
            ApiError::BadRequest(format!("Vote value must be -1, 0 or 1 (got {})", v))
        })?),
    };
    contribution::cast_vote(
        app_state.branches.as_ref(),
        app_state.votes.as_ref(),
        &identity,
        branch_id,
        value,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark or unmark a branch as canonical. Administrators only.
#[utoipa::path(
    put,
    path = "/branches/{id}/canonical",
    request_body = CanonicalRequest,
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Updated branch", body = BranchResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorBody),
        (status = 403, description = "Caller is not an administrator", body = ErrorBody),
        (status = 404, description = "Branch not found", body = ErrorBody)
    )
)]
pub async fn canonical_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(branch_id): Path<Uuid>,
    Json(payload): Json<CanonicalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let branch = contribution::set_canonical(
        app_state.branches.as_ref(),
        &identity,
        branch_id,
        payload.is_canonical,
    )
    .await?;
    Ok(Json(BranchResponse::from(branch)))
}

/// Change a branch's moderation status. Administrators only.
#[utoipa::path(
    put,
    path = "/branches/{id}/status",
    request_body = StatusRequest,
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Updated branch", body = BranchResponse),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 401, description = "Missing or invalid session", body = ErrorBody),
        (status = 403, description = "Caller is not an administrator", body = ErrorBody),
        (status = 404, description = "Branch not found", body = ErrorBody)
    )
)]
pub async fn status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(branch_id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status: BranchStatus = payload
        .status
        .parse()
        .map_err(|e: UnknownStatus| ApiError::BadRequest(e.to_string()))?;
    let branch =
        contribution::set_status(app_state.branches.as_ref(), &identity, branch_id, status).await?;
    Ok(Json(BranchResponse::from(branch)))
}
