use crate::db::{self, NewSurvey};
use crate::domain::batch::{self, BatchFilter, BatchSummary, QUESTION_COUNT};
use crate::domain::models::{RoleKind, SurveyRow};
use crate::services::mailer::{InviteRecipient, SendOutcome, SendStatus};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::CurrentUser;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const INVITE_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct RecipientInput {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSurveyRequest {
    pub title: String,
    pub questions: Vec<String>,
    pub recipients: Vec<RecipientInput>,
}

#[derive(Serialize)]
pub struct CreateSurveyResponse {
    pub batch_id: Uuid,
    pub survey_ids: Vec<Uuid>,
    pub email_results: Vec<SendOutcome>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub title: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResults {
    pub batch_id: Uuid,
    pub title: String,
    pub questions: Vec<String>,
    pub total: usize,
    pub responded: usize,
    pub response_rate_pct: f64,
    pub averages: [String; QUESTION_COUNT],
}

#[derive(Serialize)]
pub struct CreatedView {
    pub survey: SurveyRow,
    pub invite_link: String,
}

#[derive(Deserialize)]
pub struct MemberSearch {
    pub search: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/survey", get(list_surveys))
        .route("/surveys/create", post(create_survey))
        .route("/surveys/members", get(search_members))
        .route("/survey/:id/created", get(created_view))
        .route("/results/:batch_id", get(batch_results))
        .with_state(state)
}

async fn create_survey(
    user: CurrentUser,
    State(state): State<SharedState>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<Json<CreateSurveyResponse>, ApiError> {
    if user.role != RoleKind::Manager {
        return Err(ApiError::Forbidden(
            "Only managers can create surveys".to_string(),
        ));
    }

    let recipients = validate(&payload).map_err(ApiError::Validation)?;

    let batch_id = Uuid::new_v4();
    let questions: Vec<String> = payload
        .questions
        .iter()
        .map(|q| q.trim().to_string())
        .collect();

    let rows: Vec<NewSurvey> = recipients
        .iter()
        .map(|recipient| NewSurvey {
            id: Uuid::new_v4(),
            batch_id,
            title: payload.title.trim().to_string(),
            questions: questions.clone(),
            manager_id: user.user_id,
            team_member_email: recipient.email.clone(),
            invite_token: generate_invite_token(),
        })
        .collect();

    db::insert_survey_batch(&state.pool, &rows).await?;
    tracing::info!(
        "Created survey batch {} with {} recipients for manager {}",
        batch_id,
        rows.len(),
        user.user_id
    );

    // Delivery happens after the rows are committed; a failed email never
    // rolls the batch back, it only shows up in the per-recipient results.
    let invites: Vec<InviteRecipient> = rows
        .iter()
        .zip(recipients.iter())
        .map(|(row, recipient)| InviteRecipient {
            team_member_email: row.team_member_email.clone(),
            team_member_name: recipient
                .full_name
                .clone()
                .unwrap_or_else(|| row.team_member_email.clone()),
            invite_token: row.invite_token.clone(),
        })
        .collect();
    let email_results = state.mailer.send_invites(invites).await;

    let failures = email_results
        .iter()
        .filter(|r| r.status == SendStatus::Error)
        .count();
    if failures > 0 {
        tracing::warn!("{failures} of {} invite emails failed", email_results.len());
    }

    Ok(Json(CreateSurveyResponse {
        batch_id,
        survey_ids: rows.iter().map(|r| r.id).collect(),
        email_results,
    }))
}

/// Validation order: title, then questions, then recipients. Recipients
/// without an email are dropped with a warning rather than failing the
/// whole submission.
fn validate(payload: &CreateSurveyRequest) -> Result<Vec<RecipientInput>, String> {
    if payload.title.trim().is_empty() {
        return Err("Please provide a survey title.".to_string());
    }
    if payload.questions.len() != QUESTION_COUNT
        || payload.questions.iter().any(|q| q.trim().is_empty())
    {
        return Err("Please fill in all 3 questions.".to_string());
    }
    if payload.recipients.is_empty() {
        return Err("Please select at least one team member.".to_string());
    }

    let mut valid = Vec::new();
    for recipient in &payload.recipients {
        if recipient.email.trim().is_empty() {
            tracing::warn!("Dropping recipient {} without an email address", recipient.id);
            continue;
        }
        let mut cleaned = recipient.clone();
        cleaned.email = recipient.email.trim().to_lowercase();
        valid.push(cleaned);
    }
    if valid.is_empty() {
        return Err("None of the selected team members has an email address.".to_string());
    }
    Ok(valid)
}

fn generate_invite_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

async fn list_surveys(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BatchSummary>>, ApiError> {
    if user.role != RoleKind::Manager {
        return Err(ApiError::Forbidden(
            "Only managers can list surveys".to_string(),
        ));
    }

    let filter = BatchFilter {
        title: params.title,
        start_date: parse_date(params.start_date.as_deref())?,
        end_date: parse_date(params.end_date.as_deref())?,
    };

    let rows = db::surveys_for_manager(&state.pool, user.user_id).await?;
    let summaries = batch::group_by_batch(rows)
        .into_iter()
        .filter(|group| group.matches(&filter))
        .map(|group| group.summary())
        .collect();
    Ok(Json(summaries))
}

async fn batch_results(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchResults>, ApiError> {
    if user.role != RoleKind::Manager {
        return Err(ApiError::Forbidden(
            "Only managers can view results".to_string(),
        ));
    }

    let rows = db::surveys_in_batch(&state.pool, user.user_id, batch_id).await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("Batch not found".to_string()));
    }

    let title = rows[0].title.clone();
    let questions = rows[0].questions.0.clone();
    let stats = batch::group_by_batch(rows).remove(0).stats();

    Ok(Json(BatchResults {
        batch_id,
        title,
        questions,
        total: stats.total,
        responded: stats.responded,
        response_rate_pct: stats.response_rate_pct,
        averages: stats.averages.map(batch::format_average),
    }))
}

async fn created_view(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CreatedView>, ApiError> {
    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .filter(|s| s.manager_id == user.user_id)
        .ok_or_else(|| ApiError::NotFound("Survey not found".to_string()))?;

    let invite_link = state.mailer.invite_link(&survey.invite_token);
    Ok(Json(CreatedView {
        survey,
        invite_link,
    }))
}

async fn search_members(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(params): Query<MemberSearch>,
) -> Result<Json<Vec<db::MemberSummary>>, ApiError> {
    if user.role != RoleKind::Manager {
        return Err(ApiError::Forbidden(
            "Only managers can browse team members".to_string(),
        ));
    }
    let members =
        db::list_team_members(&state.pool, params.search.as_deref().unwrap_or("")).await?;
    Ok(Json(members))
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("Invalid date: {s}"))),
    }
}
