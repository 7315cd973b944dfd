use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// The two application roles. Stored as reference rows in the `roles` table;
/// this enum mirrors their stable names.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Manager,
    TeamMember,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Manager => "manager",
            RoleKind::TeamMember => "team_member",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "manager" => Some(RoleKind::Manager),
            "team_member" => Some(RoleKind::TeamMember),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub hash: String,
    pub full_name: String,
    pub role_id: i32,
    pub created_at: DateTime<Utc>,
}

/// One recipient's assignment. Rows created by the same authoring action
/// share a batch_id; legacy rows without one stand alone as their own batch.
#[derive(Clone, Debug, Serialize, Deserialize, FromRow)]
pub struct SurveyRow {
    pub id: Uuid,
    pub batch_id: Option<Uuid>,
    pub title: String,
    pub questions: Json<Vec<String>>,
    pub manager_id: Uuid,
    pub team_member_email: String,
    pub invite_token: String,
    pub responded: bool,
    pub a1: Option<i16>,
    pub a2: Option<i16>,
    pub a3: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl SurveyRow {
    pub fn batch_key(&self) -> Uuid {
        self.batch_id.unwrap_or(self.id)
    }

    /// Responded with every answer present. The schema enforces this for new
    /// rows; kept as a filter so partially-written legacy data never skews
    /// averages.
    pub fn fully_answered(&self) -> bool {
        self.responded && self.a1.is_some() && self.a2.is_some() && self.a3.is_some()
    }
}
