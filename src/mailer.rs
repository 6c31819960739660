use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound email dispatch. The account lifecycle only constructs message
/// content; delivery is behind this trait so tests can swap it out.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("build smtp transport")?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(
                format!("IntelHub <{}>", self.from_address)
                    .parse()
                    .context("invalid from address")?,
            )
            .to(to.parse().context("invalid to address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.transport.send(email).await.context("smtp send")?;
        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}

/// Body for the verification email, linking the plaintext token into the
/// front-end confirmation page.
pub fn verification_message(frontend_url: &str, token: &str) -> (String, String) {
    let url = format!("{}/EmailVerification/{}", frontend_url, token);
    let body = format!(
        "Your email verification token is :-\n\n{}\n\n\
         This link will expire in 24 hours.\n\n\
         If you have not requested this email then, please ignore it.",
        url
    );
    ("IntelHub email verification".to_string(), body)
}

/// Body for the password recovery email.
pub fn reset_message(frontend_url: &str, token: &str) -> (String, String) {
    let url = format!("{}/reset-password/{}", frontend_url, token);
    let body = format!(
        "Your password reset token is :-\n\n{}\n\n\
         This link will expire in 15 minutes.\n\n\
         If you have not requested this email then, please ignore it.",
        url
    );
    ("IntelHub password recovery".to_string(), body)
}
