use crate::config::EmailConfig;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

const SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Upper bound on in-flight deliveries for one batch; recipient lists can be
/// large and the provider throttles aggressively.
const MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InviteRecipient {
    #[serde(default)]
    pub team_member_email: String,
    #[serde(default)]
    pub team_member_name: String,
    #[serde(default)]
    pub invite_token: String,
}

impl InviteRecipient {
    fn is_complete(&self) -> bool {
        !self.team_member_email.is_empty()
            && !self.team_member_name.is_empty()
            && !self.invite_token.is_empty()
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Error,
}

#[derive(Debug, Serialize)]
pub struct SendOutcome {
    pub email: String,
    pub status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Mailer {
    http: reqwest::Client,
    config: EmailConfig,
    base_url: String,
}

impl Mailer {
    pub fn new(config: EmailConfig, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            base_url,
        }
    }

    pub fn invite_link(&self, token: &str) -> String {
        format!("{}/dashboard/survey/respond/{}", self.base_url, token)
    }

    /// One delivery attempt per recipient, concurrently but bounded, joined
    /// before returning. A failed recipient never affects the others.
    pub async fn send_invites(&self, invites: Vec<InviteRecipient>) -> Vec<SendOutcome> {
        futures::stream::iter(invites)
            .map(|invite| async move {
                match self.send_one(&invite).await {
                    Ok(()) => SendOutcome {
                        email: invite.team_member_email,
                        status: SendStatus::Sent,
                        error: None,
                    },
                    Err(error) => {
                        tracing::error!(
                            "Failed to send invite to {}: {}",
                            invite.team_member_email,
                            error
                        );
                        SendOutcome {
                            email: invite.team_member_email,
                            status: SendStatus::Error,
                            error: Some(error),
                        }
                    }
                }
            })
            .buffered(MAX_CONCURRENT_SENDS)
            .collect()
            .await
    }

    async fn send_one(&self, invite: &InviteRecipient) -> Result<(), String> {
        if !invite.is_complete() {
            return Err("Missing required fields".to_string());
        }

        let body = json!({
            "service_id": self.config.service_id,
            "template_id": self.config.template_id,
            "user_id": self.config.public_key,
            "accessToken": self.config.private_key,
            "template_params": {
                "to_email": invite.team_member_email,
                "to_name": invite.team_member_name,
                "survey_link": self.invite_link(&invite.invite_token),
            },
        });

        let response = self
            .http
            .post(SEND_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if text.contains("Authentication failed") {
            return Err(
                "Email service authentication failed. Please check the EmailJS credentials."
                    .to_string(),
            );
        }
        if text.is_empty() {
            return Err("Failed to send email".to_string());
        }
        Err(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(
            EmailConfig {
                service_id: "service".to_string(),
                template_id: "template".to_string(),
                public_key: "public".to_string(),
                private_key: "private".to_string(),
            },
            "http://localhost:3000".to_string(),
        )
    }

    #[test]
    fn invite_link_points_at_the_respond_page() {
        assert_eq!(
            mailer().invite_link("tok123"),
            "http://localhost:3000/dashboard/survey/respond/tok123"
        );
    }

    #[tokio::test]
    async fn incomplete_recipients_fail_without_a_delivery_attempt() {
        let outcomes = mailer()
            .send_invites(vec![
                InviteRecipient {
                    team_member_email: "a@x.com".to_string(),
                    team_member_name: String::new(),
                    invite_token: "t1".to_string(),
                },
                InviteRecipient::default(),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].email, "a@x.com");
        assert_eq!(outcomes[0].status, SendStatus::Error);
        assert_eq!(outcomes[0].error.as_deref(), Some("Missing required fields"));
        assert_eq!(outcomes[1].status, SendStatus::Error);
    }
}
