//! HTTP request handlers for the Compliance Server API
//!
//! Provides handlers for:
//! - Health checks
//! - Content generation and document review
//! - Rule administration
//! - Approval workflow and audit trail

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use compliance_core::pipeline::GenerateRequest;
use compliance_core::{ComplianceError, DocumentReviewOutcome, DuplicateReport};
use compliance_types::{
    ApprovalDecision, ApprovalStatus, AuditLogEntry, ContentSubmission, Rule, RuleCategory,
    RuleSeverity,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateContentRequest {
    pub prompt: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub enhance_prompt: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentResponse {
    pub submission: ContentSubmission,
    pub risk_level: String,
    pub recommendations: Vec<String>,
    pub enhanced_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub submission_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub rule_text: String,
    pub category: String,
    pub severity: String,
    pub created_by: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub updated_by: Uuid,
    pub rule_text: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CheckDuplicateRequest {
    pub rule_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved_by: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

type ApiError = (StatusCode, String);

fn api_error(err: ComplianceError) -> ApiError {
    let status = match &err {
        ComplianceError::UnsupportedFormat { .. } => StatusCode::BAD_REQUEST,
        ComplianceError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ComplianceError::RuleNotFound { .. } | ComplianceError::SubmissionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("Request failed: {}", err);
    (status, err.to_string())
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

fn parse_category(label: &str) -> Result<RuleCategory, ApiError> {
    RuleCategory::parse(label).ok_or_else(|| bad_request(format!("Unknown category: {label}")))
}

fn parse_severity(label: &str) -> Result<RuleSeverity, ApiError> {
    RuleSeverity::parse(label).ok_or_else(|| bad_request(format!("Unknown severity: {label}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Generate content from a prompt and review it
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateContentRequest>,
) -> Result<Json<GenerateContentResponse>, ApiError> {
    info!(user = %request.user_id, "Generating content");

    let outcome = state
        .pipeline
        .generate_content(GenerateRequest {
            prompt: request.prompt,
            user_id: request.user_id,
            enhance_prompt: request.enhance_prompt,
        })
        .await
        .map_err(api_error)?;

    Ok(Json(GenerateContentResponse {
        submission: outcome.submission,
        risk_level: outcome.ai_review.risk_level,
        recommendations: outcome.ai_review.recommendations,
        enhanced_prompt: outcome.enhanced_prompt,
    }))
}

/// Review an uploaded document (multipart: `file`, plus a `user_id` field)
///
/// Returns the persisted submission together with the per-chunk violation
/// detail behind the verdict.
pub async fn check_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<DocumentReviewOutcome>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut user_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| bad_request("File field has no filename"))?
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("user_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read user_id: {e}")))?;
                user_id = Some(
                    value
                        .parse()
                        .map_err(|_| bad_request("user_id is not a valid UUID"))?,
                );
            }
            _ => {}
        }
    }

    let (filename, content) = file.ok_or_else(|| bad_request("Missing file field"))?;
    let user_id = user_id.ok_or_else(|| bad_request("Missing user_id field"))?;

    info!(filename, user = %user_id, "Checking document");
    let outcome = state
        .pipeline
        .check_document(&content, &filename, user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(outcome))
}

/// Rewrite a flagged submission into compliant form
pub async fn rewrite(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RewriteRequest>,
) -> Result<Json<RewriteResponse>, ApiError> {
    let submission = state
        .pipeline
        .get_submission(request.submission_id)
        .await
        .map_err(api_error)?
        .ok_or_else(|| {
            api_error(ComplianceError::SubmissionNotFound {
                submission_id: request.submission_id,
            })
        })?;

    let content = state
        .pipeline
        .rewrite_compliant(&submission.final_content, &submission.rules_triggered)
        .await
        .map_err(api_error)?;
    Ok(Json(RewriteResponse { content }))
}

/// List all submissions, newest first
pub async fn list_content(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContentSubmission>>, ApiError> {
    let submissions = state.pipeline.list_submissions().await.map_err(api_error)?;
    Ok(Json(submissions))
}

/// Fetch one submission
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentSubmission>, ApiError> {
    state
        .pipeline
        .get_submission(id)
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(ComplianceError::SubmissionNotFound { submission_id: id }))
}

pub async fn approve_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ContentSubmission>, ApiError> {
    decide(state, id, request, ApprovalStatus::Approved).await
}

pub async fn reject_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ContentSubmission>, ApiError> {
    decide(state, id, request, ApprovalStatus::Rejected).await
}

async fn decide(
    state: Arc<AppState>,
    id: Uuid,
    request: ApprovalRequest,
    status: ApprovalStatus,
) -> Result<Json<ContentSubmission>, ApiError> {
    let submission = state
        .pipeline
        .apply_approval(
            id,
            ApprovalDecision {
                approved_by: request.approved_by,
                status,
                notes: request.notes,
            },
        )
        .await
        .map_err(api_error)?;
    Ok(Json(submission))
}

/// List rules; active versions only unless `include_inactive=true`
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRulesQuery>,
) -> Result<Json<Vec<Rule>>, ApiError> {
    let rules = if query.include_inactive {
        state.rule_service.get_all_rules().await
    } else {
        state.rule_service.get_active_rules().await
    }
    .map_err(api_error)?;
    Ok(Json(rules))
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Json<Rule>, ApiError> {
    let rule = state
        .rule_service
        .create_rule(
            request.rule_text,
            parse_category(&request.category)?,
            parse_severity(&request.severity)?,
            request.created_by,
        )
        .await
        .map_err(api_error)?;
    Ok(Json(rule))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<Rule>, ApiError> {
    let category = request
        .category
        .as_deref()
        .map(parse_category)
        .transpose()?;
    let severity = request
        .severity
        .as_deref()
        .map(parse_severity)
        .transpose()?;

    let rule = state
        .rule_service
        .update_rule(id, request.updated_by, request.rule_text, category, severity)
        .await
        .map_err(api_error)?;
    Ok(Json(rule))
}

pub async fn activate_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<Rule>, ApiError> {
    let rule = state
        .rule_service
        .activate_rule(id, request.actor_id)
        .await
        .map_err(api_error)?;
    Ok(Json(rule))
}

pub async fn deactivate_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<Rule>, ApiError> {
    let rule = state
        .rule_service
        .deactivate_rule(id, request.actor_id)
        .await
        .map_err(api_error)?;
    Ok(Json(rule))
}

/// Check a candidate rule text for duplicates before creating it
pub async fn check_duplicate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckDuplicateRequest>,
) -> Result<Json<DuplicateReport>, ApiError> {
    let report = state
        .duplicates
        .check_duplicates(&request.rule_text)
        .await
        .map_err(api_error)?;
    Ok(Json(report))
}

/// Extract rules from an uploaded regulatory PDF (multipart: `file`,
/// `created_by`)
pub async fn extract_rules(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Rule>>, ApiError> {
    let mut content: Option<Vec<u8>> = None;
    let mut created_by: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
                content = Some(bytes.to_vec());
            }
            Some("created_by") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read created_by: {e}")))?;
                created_by = Some(
                    value
                        .parse()
                        .map_err(|_| bad_request("created_by is not a valid UUID"))?,
                );
            }
            _ => {}
        }
    }

    let content = content.ok_or_else(|| bad_request("Missing file field"))?;
    let created_by = created_by.ok_or_else(|| bad_request("Missing created_by field"))?;

    let rules = state
        .rule_service
        .extract_rules_from_pdf(&content, created_by)
        .await
        .map_err(api_error)?;
    info!(count = rules.len(), "Extracted rules from PDF");
    Ok(Json(rules))
}

/// Re-embed every stored rule into the vector index
pub async fn sync_embeddings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncResponse>, ApiError> {
    let synced = state
        .rule_service
        .sync_embeddings()
        .await
        .map_err(api_error)?;
    Ok(Json(SyncResponse { synced }))
}

/// Full audit trail, oldest first
pub async fn list_audit(State(state): State<Arc<AppState>>) -> Json<Vec<AuditLogEntry>> {
    Json(state.audit.entries().await)
}
