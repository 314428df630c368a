//! Message composition module

use clap::Parser;
use tracing::{debug, info, warn};

mod attachment;
mod errors;
mod mime;

pub use attachment::{Attachment, DEFAULT_MIME_TYPE};
pub use errors::MessageError;
pub use mime::Body;

use mime::{encoded_word, message_boundary, Assembly, CRLF};

use crate::domain::communication::{
    email_addresses::{join_addresses, EmailAddress},
    mailer::{Mailer, OutgoingMail},
};

/// Subject used when none, or only whitespace, is given
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// Charset used when none is configured
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Message configuration
#[derive(Clone, Debug, Parser)]
pub struct MessageConfig {
    /// Charset label for bodies and encoded headers
    #[clap(long, env = "MAIL_CHARSET", default_value = DEFAULT_CHARSET)]
    pub charset: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            charset: DEFAULT_CHARSET.to_string(),
        }
    }
}

/// A list of recipient addresses.
///
/// Strings are split on commas, lists are taken item by item.
pub trait Recipients {
    /// The individual, untrimmed addresses
    fn addresses(&self) -> Vec<&str>;
}

impl Recipients for str {
    fn addresses(&self) -> Vec<&str> {
        self.split(',').collect()
    }
}

impl Recipients for String {
    fn addresses(&self) -> Vec<&str> {
        self.as_str().addresses()
    }
}

impl<S: AsRef<str>> Recipients for [S] {
    fn addresses(&self) -> Vec<&str> {
        self.iter().map(AsRef::as_ref).collect()
    }
}

impl<S: AsRef<str>, const N: usize> Recipients for [S; N] {
    fn addresses(&self) -> Vec<&str> {
        self[..].addresses()
    }
}

impl<S: AsRef<str>> Recipients for Vec<S> {
    fn addresses(&self) -> Vec<&str> {
        self[..].addresses()
    }
}

/// Accumulates the parts of a single email and sends it once
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    charset: String,
    boundary: String,
    subject: String,
    from: Option<EmailAddress>,
    from_name: String,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    headers: Vec<String>,
    body: Body,
    attachments: Vec<Attachment>,
    sender: Option<EmailAddress>,
}

impl MessageBuilder {
    /// Creates an empty message with a fresh boundary
    pub fn new(config: &MessageConfig) -> Self {
        Self {
            charset: config.charset.clone(),
            boundary: message_boundary(),
            subject: DEFAULT_SUBJECT.to_string(),
            from: None,
            from_name: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            headers: Vec::new(),
            body: Body::default(),
            attachments: Vec::new(),
            sender: None,
        }
    }

    /// Overrides the configured charset for this message
    pub fn set_charset(&mut self, charset: &str) {
        self.charset = charset.trim().to_string();
    }

    /// Adds a primary recipient
    pub fn add_recipient(&mut self, address: &str) -> Result<(), MessageError> {
        self.to.push(EmailAddress::new(address)?);

        Ok(())
    }

    /// Adds a carbon copy recipient
    pub fn add_cc(&mut self, address: &str) -> Result<(), MessageError> {
        self.cc.push(EmailAddress::new(address)?);

        Ok(())
    }

    /// Adds a blind carbon copy recipient
    pub fn add_bcc(&mut self, address: &str) -> Result<(), MessageError> {
        self.bcc.push(EmailAddress::new(address)?);

        Ok(())
    }

    /// Appends a raw header line, emitted verbatim after `MIME-Version`
    pub fn add_header(&mut self, line: &str) {
        self.headers.push(line.to_string());
    }

    /// Sets the subject, falling back to [`DEFAULT_SUBJECT`] when blank
    pub fn set_subject(&mut self, subject: &str) {
        let subject = subject.trim();

        self.subject = if subject.is_empty() {
            DEFAULT_SUBJECT.to_string()
        } else {
            subject.to_string()
        };
    }

    /// Sets the from address and display name.
    ///
    /// A blank display name is replaced by the address itself.
    pub fn set_from(&mut self, address: &str, display_name: &str) -> Result<(), MessageError> {
        let from = EmailAddress::new(address)?;
        let display_name = display_name.trim();

        self.from_name = if display_name.is_empty() {
            from.to_string()
        } else {
            display_name.to_string()
        };
        self.from = Some(from);

        Ok(())
    }

    /// Sets the envelope sender that bounces are returned to
    pub fn set_sender(&mut self, address: &str) -> Result<(), MessageError> {
        self.sender = Some(EmailAddress::new(address)?);

        Ok(())
    }

    /// Sets the plain text body
    pub fn set_text(&mut self, text: &str) {
        self.body.text = Some(text.to_string());
    }

    /// Sets the HTML body, trimmed
    pub fn set_html(&mut self, html: &str) {
        self.body.html = Some(html.trim().to_string());
    }

    /// Attaches a file.
    ///
    /// Without `data` the contents are read from `path`; a file that cannot be
    /// read is an error and nothing is attached.
    pub fn add_file(
        &mut self,
        path: &str,
        data: Option<Vec<u8>>,
        mime_type: Option<&str>,
    ) -> Result<(), MessageError> {
        let attachment = match data {
            Some(data) => Attachment::new(path, data, mime_type),
            None => Attachment::from_path(path, mime_type)?,
        };

        self.add_attachment(attachment);

        Ok(())
    }

    /// Attaches an already loaded file
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Primary recipients
    pub fn recipients(&self) -> &[EmailAddress] {
        &self.to
    }

    /// Carbon copy recipients
    pub fn cc(&self) -> &[EmailAddress] {
        &self.cc
    }

    /// Blind carbon copy recipients
    pub fn bcc(&self) -> &[EmailAddress] {
        &self.bcc
    }

    /// The subject, before encoding
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The boundary of the top level multipart entity
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Attachments in the order they were added
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Assembles the header block and MIME body without sending
    pub fn build(&self) -> Result<OutgoingMail, MessageError> {
        if self.to.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        let from = self.from.clone().ok_or(MessageError::MissingFrom)?;

        let mut headers = vec![format!(
            "From: {} <{}>",
            encoded_word(&self.charset, &self.from_name),
            from
        )];

        if !self.cc.is_empty() {
            headers.push(format!("Cc: {}", join_addresses(&self.cc)));
        }

        if !self.bcc.is_empty() {
            headers.push(format!("Bcc: {}", join_addresses(&self.bcc)));
        }

        headers.push("MIME-Version: 1.0".to_string());
        headers.extend(self.headers.iter().cloned());

        let assembly = Assembly::new(&self.charset, &self.boundary, &self.body, &self.attachments);
        headers.extend(assembly.content_headers());

        Ok(OutgoingMail {
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            from,
            subject: encoded_word(&self.charset, &self.subject),
            headers: headers.join(CRLF),
            body: assembly.render(),
            envelope_sender: self.sender.clone(),
        })
    }

    /// Assembles the message and hands it to `mailer`
    pub async fn send<M: Mailer>(self, mailer: &M) -> Result<(), MessageError> {
        let mail = self.build()?;

        debug!(
            recipients = mail.envelope_recipients().len(),
            attachments = self.attachments.len(),
            "handing message to transport"
        );

        if let Err(e) = mailer.deliver(&mail).await {
            warn!("transport rejected message: {e}");

            return Err(e.into());
        }

        info!(to = %mail.to_header(), "message sent");

        Ok(())
    }

    /// Fills in a plain text message and sends it in one go.
    ///
    /// Stops at the first recipient, from address or subject that is rejected,
    /// without calling the transport.
    pub async fn send_text<M, R>(
        self,
        mailer: &M,
        to: &R,
        subject: &str,
        text: &str,
        from: &str,
        from_name: &str,
    ) -> Result<(), MessageError>
    where
        M: Mailer,
        R: Recipients + ?Sized,
    {
        self.send_html(mailer, to, subject, text, "", from, from_name)
            .await
    }

    /// Fills in a message with text and HTML bodies and sends it in one go.
    ///
    /// Stops at the first recipient, from address or subject that is rejected,
    /// without calling the transport.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_html<M, R>(
        mut self,
        mailer: &M,
        to: &R,
        subject: &str,
        text: &str,
        html: &str,
        from: &str,
        from_name: &str,
    ) -> Result<(), MessageError>
    where
        M: Mailer,
        R: Recipients + ?Sized,
    {
        for address in to.addresses() {
            self.add_recipient(address)?;
        }

        self.set_from(from, from_name)?;
        self.set_subject(subject);
        self.set_text(text);
        self.set_html(html);

        self.send(mailer).await
    }
}
