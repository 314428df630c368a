//! SMTP email service implementation

use anyhow::Result;
use async_trait::async_trait;
use clap::{ArgAction, Parser};
use lettre::{
    address::Envelope,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    SmtpTransport, Transport,
};
use tracing::{debug, warn};

use crate::domain::communication::mailer::{Mailer, MailerError, OutgoingMail};

use super::envelope;

/// SMTP configuration
#[derive(Clone, Debug, Parser)]
pub struct SMTPConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST", default_value = "localhost")]
    pub host: String,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value = "587")]
    pub port: u16,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER")]
    pub username: Option<String>,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD")]
    pub password: Option<String>,

    /// Verify the TLS certificate
    #[clap(
        long = "smtp-verify-tls",
        env = "SMTP_VERIFY_TLS",
        default_value = "true",
        action = ArgAction::Set
    )]
    pub verify_tls: bool,

    /// Enable STARTTLS (TLS upgrade on connection)
    #[clap(
        long = "smtp-starttls",
        env = "SMTP_STARTTLS",
        default_value = "true",
        action = ArgAction::Set
    )]
    pub starttls: bool,
}

/// SMTP mailer
#[derive(Debug, Clone)]
pub struct SMTPMailer {
    config: SMTPConfig,
}

impl SMTPMailer {
    /// Create a new SMTP mailer
    pub fn new(config: SMTPConfig) -> Self {
        Self { config }
    }

    /// Create the SMTP transport described by the configuration
    pub fn transport(&self) -> Result<SmtpTransport> {
        let tls = TlsParameters::builder(self.config.host.to_string())
            .dangerous_accept_invalid_certs(!self.config.verify_tls)
            .build()?;

        let mut relay = if self.config.starttls {
            SmtpTransport::starttls_relay(&self.config.host)?.tls(Tls::Required(tls))
        } else {
            SmtpTransport::relay(&self.config.host)?.tls(Tls::Wrapper(tls))
        };

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            relay = relay.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(relay.port(self.config.port).build())
    }
}

/// SMTP always needs a `MAIL FROM`: the envelope sender when set, otherwise the `From` address
fn smtp_envelope(mail: &OutgoingMail) -> Result<Envelope, MailerError> {
    let sender = mail.envelope_sender.as_ref().unwrap_or(&mail.from);

    envelope(mail, Some(sender))
}

#[async_trait]
impl Mailer for SMTPMailer {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailerError> {
        let envelope = smtp_envelope(mail)?;

        debug!(host = %self.config.host, port = self.config.port, "submitting message over SMTP");

        match self
            .transport()?
            .send_raw(&envelope, mail.formatted().as_bytes())
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => {
                warn!("SMTP relay rejected message: {e}");

                Err(MailerError::SendError)
            }
            Err(e) => Err(MailerError::UnknownError(e.into())),
        }
    }
}
