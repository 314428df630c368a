#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Command-line front end that composes and sends a single email

use anyhow::Result;
use clap::Parser;
use mime_mailer::{
    domain::communication::message::{MessageBuilder, MessageConfig},
    infrastructure::email::{ConfiguredMailer, MailerConfig},
};
use tracing::info;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[clap(about = "Compose a MIME email and hand it to the configured transport")]
pub struct Args {
    /// Primary recipients, comma separated or repeated
    #[clap(long, required = true, value_delimiter = ',')]
    pub to: Vec<String>,

    /// Carbon copy recipients
    #[clap(long, value_delimiter = ',')]
    pub cc: Vec<String>,

    /// Blind carbon copy recipients
    #[clap(long, value_delimiter = ',')]
    pub bcc: Vec<String>,

    /// The subject
    #[clap(long, default_value = "")]
    pub subject: String,

    /// The from address
    #[clap(long, env = "MAIL_FROM")]
    pub from: String,

    /// The display name shown with the from address
    #[clap(long, env = "MAIL_FROM_NAME", default_value = "")]
    pub from_name: String,

    /// Envelope sender that bounces are returned to
    #[clap(long, env = "MAIL_SENDER")]
    pub sender: Option<String>,

    /// Plain text body
    #[clap(long)]
    pub text: Option<String>,

    /// HTML body
    #[clap(long)]
    pub html: Option<String>,

    /// Files to attach
    #[clap(long = "attach")]
    pub attachments: Vec<String>,

    /// Extra raw header lines
    #[clap(long = "header")]
    pub headers: Vec<String>,

    /// The message configuration
    #[clap(flatten)]
    pub message: MessageConfig,

    /// The transport configuration
    #[clap(flatten)]
    pub mailer: MailerConfig,
}

impl Args {
    fn into_message(self) -> Result<(MessageBuilder, MailerConfig)> {
        let mut message = MessageBuilder::new(&self.message);

        for address in &self.to {
            message.add_recipient(address)?;
        }

        for address in &self.cc {
            message.add_cc(address)?;
        }

        for address in &self.bcc {
            message.add_bcc(address)?;
        }

        message.set_from(&self.from, &self.from_name)?;
        message.set_subject(&self.subject);

        if let Some(sender) = &self.sender {
            message.set_sender(sender)?;
        }

        if let Some(text) = &self.text {
            message.set_text(text);
        }

        if let Some(html) = &self.html {
            message.set_html(html);
        }

        for header in &self.headers {
            message.add_header(header);
        }

        for path in &self.attachments {
            message.add_file(path, None, None)?;
        }

        Ok((message, self.mailer))
    }
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load environment: {}", e);

            return Err(e.into());
        }
    }

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let (message, config) = args.into_message()?;

    let transport = config.transport;
    message.send(&ConfiguredMailer::new(config)).await?;

    info!(?transport, "done");

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_args_populate_message() -> TestResult {
        let args = Args::parse_from([
            "mailer",
            "--to",
            "one@example.com,two@example.com",
            "--cc",
            "cc@example.com",
            "--from",
            "from@example.com",
            "--subject",
            "Hello",
            "--text",
            "hi",
            "--header",
            "X-Priority: 1",
        ]);

        let (message, config) = args.into_message()?;
        let mail = message.build()?;

        assert_eq!(mail.to_header(), "one@example.com,two@example.com");
        assert!(mail.headers.contains("Cc: cc@example.com"));
        assert!(mail.headers.contains("X-Priority: 1"));
        assert_eq!(config.sendmail.command, "/usr/sbin/sendmail");

        Ok(())
    }

    #[test]
    fn test_unreadable_attachment_fails() {
        let args = Args::parse_from([
            "mailer",
            "--to",
            "one@example.com",
            "--from",
            "from@example.com",
            "--attach",
            "/nonexistent/mime-mailer/file.pdf",
        ]);

        assert!(args.into_message().is_err());
    }
}
