//! Mail transports

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use lettre::{address::Envelope, message::Mailbox, Address};

use crate::domain::communication::{
    email_addresses::EmailAddress,
    mailer::{Mailer, MailerError, OutgoingMail},
};

pub mod sendmail;
pub mod smtp;

use sendmail::{SendmailConfig, SendmailMailer};
use smtp::{SMTPConfig, SMTPMailer};

/// Which transport delivers messages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Pipe messages to the local sendmail binary
    #[default]
    Sendmail,

    /// Submit messages to an SMTP relay
    Smtp,
}

/// Transport configuration
#[derive(Clone, Debug, Parser)]
pub struct MailerConfig {
    /// The transport used to deliver messages
    #[clap(long, env = "MAIL_TRANSPORT", value_enum, default_value = "sendmail")]
    pub transport: TransportKind,

    /// The sendmail transport configuration
    #[clap(flatten)]
    pub sendmail: SendmailConfig,

    /// The SMTP transport configuration
    #[clap(flatten)]
    pub smtp: SMTPConfig,
}

/// The transport selected by a [`MailerConfig`]
#[derive(Clone, Debug)]
pub enum ConfiguredMailer {
    /// Local sendmail binary
    Sendmail(SendmailMailer),

    /// SMTP relay
    Smtp(SMTPMailer),
}

impl ConfiguredMailer {
    /// Create the mailer selected in `config`
    pub fn new(config: MailerConfig) -> Self {
        match config.transport {
            TransportKind::Sendmail => Self::Sendmail(SendmailMailer::new(config.sendmail)),
            TransportKind::Smtp => Self::Smtp(SMTPMailer::new(config.smtp)),
        }
    }
}

#[async_trait]
impl Mailer for ConfiguredMailer {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailerError> {
        match self {
            Self::Sendmail(mailer) => mailer.deliver(mail).await,
            Self::Smtp(mailer) => mailer.deliver(mail).await,
        }
    }
}

/// Builds the SMTP envelope for `mail`: every `To`, `Cc` and `Bcc` address, sent from `from`
pub(crate) fn envelope(
    mail: &OutgoingMail,
    from: Option<&EmailAddress>,
) -> Result<Envelope, MailerError> {
    let from = from.map(addr_spec).transpose()?;

    let to = mail
        .envelope_recipients()
        .iter()
        .map(addr_spec)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Envelope::new(from, to)?)
}

/// The bare address, for addresses that may also be written as `Name <addr>`
fn addr_spec(address: &EmailAddress) -> Result<Address, MailerError> {
    Ok(address.as_str().parse::<Mailbox>()?.email)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn mail() -> TestResult<OutgoingMail> {
        Ok(OutgoingMail {
            to: vec![EmailAddress::new("to@example.com")?],
            cc: vec![EmailAddress::new("cc@example.com")?],
            bcc: vec![EmailAddress::new("bcc@example.com")?],
            from: EmailAddress::new("from@example.com")?,
            subject: "=?UTF-8?B?SGk=?=".to_string(),
            headers: "MIME-Version: 1.0".to_string(),
            body: "SGk=\r\n".to_string(),
            envelope_sender: None,
        })
    }

    #[test]
    fn test_envelope_includes_every_recipient() -> TestResult {
        let mail = mail()?;
        let sender = EmailAddress::new("bounces@example.com")?;

        let envelope = envelope(&mail, Some(&sender))?;

        let to: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
        assert_eq!(to, vec!["to@example.com", "cc@example.com", "bcc@example.com"]);
        assert_eq!(
            envelope.from().map(ToString::to_string),
            Some("bounces@example.com".to_string())
        );

        Ok(())
    }

    #[test]
    fn test_envelope_without_sender() -> TestResult {
        let envelope = envelope(&mail()?, None)?;

        assert!(envelope.from().is_none());

        Ok(())
    }

    #[test]
    fn test_envelope_accepts_named_addresses() -> TestResult {
        let mut mail = mail()?;
        mail.to = vec![EmailAddress::new("John Doe <john@example.com>")?];
        mail.bcc = vec![EmailAddress::new("\"Doe, Jane\" <jane@example.com>")?];
        let sender = EmailAddress::new("Bounces <bounces@example.com>")?;

        let envelope = envelope(&mail, Some(&sender))?;

        let to: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
        assert_eq!(to, vec!["john@example.com", "cc@example.com", "jane@example.com"]);
        assert_eq!(
            envelope.from().map(ToString::to_string),
            Some("bounces@example.com".to_string())
        );

        Ok(())
    }

    #[test]
    fn test_envelope_rejects_unparseable_address() -> TestResult {
        let mut mail = mail()?;
        mail.to = vec![EmailAddress::new("not an address")?];

        assert!(matches!(
            envelope(&mail, None),
            Err(MailerError::InvalidEmail)
        ));

        Ok(())
    }

    #[test]
    fn test_configured_mailer_follows_transport_kind() {
        let config = MailerConfig::parse_from(["mailer", "--transport", "smtp"]);

        assert_eq!(config.transport, TransportKind::Smtp);
        assert!(matches!(
            ConfiguredMailer::new(config),
            ConfiguredMailer::Smtp(_)
        ));
    }
}
