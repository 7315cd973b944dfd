use crate::db;
use crate::domain::batch::QUESTION_COUNT;
use crate::domain::models::{RoleKind, SurveyRow};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::CurrentUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: [i16; QUESTION_COUNT],
}

/// What a respondent sees before answering; answers and the manager id stay
/// server-side.
#[derive(Serialize)]
pub struct RespondView {
    pub id: Uuid,
    pub title: String,
    pub questions: Vec<String>,
    pub team_member_email: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/pending/:id", get(get_pending).post(submit_by_id))
        .route(
            "/survey/respond/:invite_token",
            get(get_by_token).post(submit_by_token),
        )
        .with_state(state)
}

/// Managers get an overview of their own unanswered rows; team members get
/// the rows assigned to their email.
async fn list_pending(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<SurveyRow>>, ApiError> {
    let rows = match user.role {
        RoleKind::Manager => db::pending_for_manager(&state.pool, user.user_id).await?,
        RoleKind::TeamMember => db::pending_for_email(&state.pool, &user.email).await?,
    };
    Ok(Json(rows))
}

async fn get_pending(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RespondView>, ApiError> {
    let survey = load_assigned(&state, id, &user).await?;
    Ok(Json(respond_view(survey)))
}

async fn submit_by_id(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<StatusCode, ApiError> {
    let survey = load_assigned(&state, id, &user).await?;
    validate_answers(&payload.answers)?;
    write_answers(&state, survey.id, payload.answers).await
}

async fn get_by_token(
    State(state): State<SharedState>,
    Path(invite_token): Path<String>,
) -> Result<Json<RespondView>, ApiError> {
    let survey = load_by_token(&state, &invite_token).await?;
    Ok(Json(respond_view(survey)))
}

async fn submit_by_token(
    State(state): State<SharedState>,
    Path(invite_token): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<StatusCode, ApiError> {
    let survey = load_by_token(&state, &invite_token).await?;
    validate_answers(&payload.answers)?;
    write_answers(&state, survey.id, payload.answers).await
}

/// Precondition order is part of the contract: missing record, then already
/// responded, then the assignment check (distinct from not-found).
async fn load_assigned(
    state: &SharedState,
    id: Uuid,
    user: &CurrentUser,
) -> Result<SurveyRow, ApiError> {
    let survey = db::find_survey_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Survey not found".to_string()))?;
    if survey.responded {
        return Err(ApiError::Conflict(
            "This survey has already been submitted.".to_string(),
        ));
    }
    if !survey.team_member_email.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::Forbidden(
            "You can only respond to surveys assigned to you".to_string(),
        ));
    }
    Ok(survey)
}

/// The token is the grant: no assignment check, but it stops working the
/// moment the row is responded.
async fn load_by_token(state: &SharedState, token: &str) -> Result<SurveyRow, ApiError> {
    let survey = db::find_survey_by_token(&state.pool, token)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid or expired survey link.".to_string()))?;
    if survey.responded {
        return Err(ApiError::Conflict(
            "You have already submitted this survey.".to_string(),
        ));
    }
    Ok(survey)
}

fn validate_answers(answers: &[i16; QUESTION_COUNT]) -> Result<(), ApiError> {
    if answers.iter().any(|a| !(1..=5).contains(a)) {
        return Err(ApiError::Validation(
            "Each answer must be a rating from 1 to 5.".to_string(),
        ));
    }
    Ok(())
}

async fn write_answers(
    state: &SharedState,
    id: Uuid,
    answers: [i16; QUESTION_COUNT],
) -> Result<StatusCode, ApiError> {
    // Conditional update: a concurrent submission loses with zero rows
    // affected instead of silently overwriting.
    let updated = db::complete_survey(&state.pool, id, answers).await?;
    if !updated {
        return Err(ApiError::Conflict(
            "This survey was already submitted.".to_string(),
        ));
    }
    tracing::info!("Survey {id} answered");
    Ok(StatusCode::NO_CONTENT)
}

fn respond_view(survey: SurveyRow) -> RespondView {
    RespondView {
        id: survey.id,
        title: survey.title,
        questions: survey.questions.0,
        team_member_email: survey.team_member_email,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        assert!(validate_answers(&[1, 3, 5]).is_ok());
        assert!(validate_answers(&[0, 3, 5]).is_err());
        assert!(validate_answers(&[1, 6, 5]).is_err());
        assert!(validate_answers(&[-1, 2, 3]).is_err());
    }
}
