/// Outbound mail seam.
///
/// Delivery is not part of this service. [`LogMailer`] writes each message to
/// the log; deployments that need real delivery provide another [`Mailer`].
/// Messages are only sent after the write they describe has committed.

use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Link the user follows to confirm their address
    pub fn email_verification(to: &str, base_url: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            body: format!(
                "Confirm your email address by opening:\n\n{}/auth/email/verify?token={}\n",
                base_url.trim_end_matches('/'),
                token
            ),
        }
    }

    /// Invitation into a team, accepted through `GET /teams/join`
    pub fn team_invite(to: &str, team_name: &str, base_url: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("You have been invited to {}", team_name),
            body: format!(
                "You have been invited to join the team {}.\n\nAccept the invitation:\n\n{}/teams/join?token={}\n",
                team_name,
                base_url.trim_end_matches('/'),
                token
            ),
        }
    }

    /// Notice to team managers that someone asked to join
    pub fn join_request(to: &str, team_name: &str, username: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("{} wants to join {}", username, team_name),
            body: format!(
                "{} has requested to join the team {}. Review pending members to accept the request.\n",
                username, team_name
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Mail queued"
        );
        Ok(())
    }
}
