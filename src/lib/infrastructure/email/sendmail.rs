//! Sendmail email service implementation

use async_trait::async_trait;
use clap::Parser;
use lettre::{AsyncSendmailTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

use crate::domain::communication::mailer::{Mailer, MailerError, OutgoingMail};

use super::envelope;

/// Sendmail configuration
#[derive(Clone, Debug, Parser)]
pub struct SendmailConfig {
    /// Path to the sendmail binary
    #[clap(
        long = "sendmail-command",
        env = "SENDMAIL_COMMAND",
        default_value = "/usr/sbin/sendmail"
    )]
    pub command: String,
}

/// Hands messages to the local sendmail binary
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    config: SendmailConfig,
}

impl SendmailMailer {
    /// Create a new sendmail mailer
    pub fn new(config: SendmailConfig) -> Self {
        Self { config }
    }

    /// The sendmail transport running the configured binary
    pub fn transport(&self) -> AsyncSendmailTransport<Tokio1Executor> {
        AsyncSendmailTransport::<Tokio1Executor>::new_with_command(self.config.command.as_str())
    }
}

#[async_trait]
impl Mailer for SendmailMailer {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailerError> {
        // `-f` is only passed when an envelope sender was set
        let envelope = envelope(mail, mail.envelope_sender.as_ref())?;

        debug!(command = %self.config.command, "piping message to sendmail");

        match self
            .transport()
            .send_raw(&envelope, mail.formatted().as_bytes())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(MailerError::UnknownError(e.into())),
        }
    }
}
