use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

/// SMTP sender for password-reset links.
pub struct ResetMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl ResetMailer {
    /// Configured from `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS` and
    /// `RESET_EMAIL_FROM`. None when any is missing or invalid.
    pub fn from_env() -> Option<Self> {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        let (host, user, pass, from_addr) = (
            var("SMTP_HOST")?,
            var("SMTP_USER")?,
            var("SMTP_PASS")?,
            var("RESET_EMAIL_FROM")?,
        );

        let mailer = match AsyncSmtpTransport::<Tokio1Executor>::relay(&host) {
            Ok(b) => b.credentials(Credentials::new(user, pass)).build(),
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "invalid SMTP_HOST; reset emails disabled");
                return None;
            }
        };
        let from = match from_addr.parse::<Mailbox>() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(from = %from_addr, error = %e, "invalid RESET_EMAIL_FROM; reset emails disabled");
                return None;
            }
        };
        Some(Self { mailer, from })
    }

    pub async fn send_reset(&self, to: &str, link: &str) -> Result<()> {
        let to: Mailbox = to.parse().context("recipient address")?;
        let body = format!(
            "A password reset was requested for your Trust Verify account.\n\n\
             Open this link within 24 hours to choose a new password:\n{link}\n\n\
             If you did not ask for this, ignore this email.\n"
        );
        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Trust Verify password reset")
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
