pub mod seed;

use crate::domain::models::{Profile, Role, RoleKind, SurveyRow};
use anyhow::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool, QueryBuilder};
use uuid::Uuid;

const SURVEY_COLUMNS: &str = "id, batch_id, title, questions, manager_id, \
     team_member_email, invite_token, responded, a1, a2, a3, created_at";

/// Input for one row of a batch insert; the batch id is shared by all rows
/// of one authoring action.
#[derive(Debug)]
pub struct NewSurvey {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub title: String,
    pub questions: Vec<String>,
    pub manager_id: Uuid,
    pub team_member_email: String,
    pub invite_token: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MemberSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

// ========== Roles & profiles ==========

pub async fn find_role_by_id(pool: &PgPool, id: i32) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn find_role_by_name(pool: &PgPool, name: &str) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn insert_user(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    hash: &str,
    full_name: &str,
    role_id: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, hash, full_name, role_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(hash)
    .bind(full_name)
    .bind(role_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<Profile>> {
    let user = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, hash, full_name, role_id, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Profile>> {
    let user = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, hash, full_name, role_id, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Team members matching a name/email fragment, for the recipient picker.
/// An empty fragment lists everyone.
pub async fn list_team_members(pool: &PgPool, search: &str) -> Result<Vec<MemberSummary>> {
    let members = sqlx::query_as::<_, MemberSummary>(
        r#"
        SELECT u.id, u.email, u.full_name
        FROM users u
        JOIN roles r ON u.role_id = r.id
        WHERE r.name = $1
          AND (u.email ILIKE $2 OR u.full_name ILIKE $2)
        ORDER BY u.full_name ASC
        "#,
    )
    .bind(RoleKind::TeamMember.as_str())
    .bind(format!("%{search}%"))
    .fetch_all(pool)
    .await?;
    Ok(members)
}

// ========== Surveys ==========

/// Insert all rows of one authoring action as a single multi-row statement.
pub async fn insert_survey_batch(pool: &PgPool, rows: &[NewSurvey]) -> Result<()> {
    let mut builder = QueryBuilder::<sqlx::Postgres>::new(
        "INSERT INTO surveys (id, batch_id, title, questions, manager_id, \
         team_member_email, invite_token, responded) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.batch_id)
            .push_bind(&row.title)
            .push_bind(sqlx::types::Json(&row.questions))
            .push_bind(row.manager_id)
            .push_bind(&row.team_member_email)
            .push_bind(&row.invite_token)
            .push_bind(false);
    });
    builder.build().execute(pool).await?;
    Ok(())
}

pub async fn surveys_for_manager(pool: &PgPool, manager_id: Uuid) -> Result<Vec<SurveyRow>> {
    let rows = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE manager_id = $1
        ORDER BY created_at DESC
        "#
    ))
    .bind(manager_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn surveys_in_batch(
    pool: &PgPool,
    manager_id: Uuid,
    batch_id: Uuid,
) -> Result<Vec<SurveyRow>> {
    let rows = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE manager_id = $1
          AND (batch_id = $2 OR id = $2)
        ORDER BY created_at DESC
        "#
    ))
    .bind(manager_id)
    .bind(batch_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn pending_for_manager(pool: &PgPool, manager_id: Uuid) -> Result<Vec<SurveyRow>> {
    let rows = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE manager_id = $1
          AND responded = false
        ORDER BY created_at DESC
        "#
    ))
    .bind(manager_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn pending_for_email(pool: &PgPool, email: &str) -> Result<Vec<SurveyRow>> {
    let rows = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE team_member_email = $1
          AND responded = false
        ORDER BY created_at DESC
        "#
    ))
    .bind(email)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_survey_by_id(pool: &PgPool, id: Uuid) -> Result<Option<SurveyRow>> {
    let row = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_survey_by_token(pool: &PgPool, token: &str) -> Result<Option<SurveyRow>> {
    let row = sqlx::query_as::<_, SurveyRow>(&format!(
        r#"
        SELECT {SURVEY_COLUMNS}
        FROM surveys
        WHERE invite_token = $1
        "#
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Write the answer set and flip the responded flag in one conditional
/// update. Returns false when the row was already responded (or gone), so
/// concurrent submissions cannot both win.
pub async fn complete_survey(pool: &PgPool, id: Uuid, answers: [i16; 3]) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE surveys
        SET a1 = $2, a2 = $3, a3 = $4, responded = true
        WHERE id = $1
          AND responded = false
        "#,
    )
    .bind(id)
    .bind(answers[0])
    .bind(answers[1])
    .bind(answers[2])
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
