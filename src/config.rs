use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};

/// Credentials and identifiers for the transactional-email provider. Only
/// the invite-send path reads these.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        !self.service_id.is_empty()
            && !self.template_id.is_empty()
            && !self.public_key.is_empty()
            && !self.private_key.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub base_url: String,
    pub session_key: Vec<u8>,
    pub email: EmailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_key_b64 = std::env::var("SESSION_KEY").context("SESSION_KEY missing")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64)
            .context("SESSION_KEY must be base64")?;

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{port}")
        });

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let email = EmailConfig {
            service_id: env_or_empty("EMAILJS_SERVICE_ID"),
            template_id: env_or_empty("EMAILJS_TEMPLATE_ID"),
            public_key: env_or_empty("EMAILJS_PUBLIC_KEY"),
            private_key: env_or_empty("EMAILJS_PRIVATE_KEY"),
        };
        if !email.is_configured() {
            tracing::warn!("EmailJS credentials incomplete; invite delivery will report errors");
        }

        Ok(Self {
            bind_addr,
            base_url,
            session_key,
            email,
        })
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}
