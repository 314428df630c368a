//! Outgoing email

use crate::domain::communication::email_addresses::{join_addresses, EmailAddress};

/// A fully assembled email, ready to be handed to a [`Mailer`](super::Mailer)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Primary recipients, rendered into the `To` header
    pub to: Vec<EmailAddress>,

    /// Carbon copy recipients
    pub cc: Vec<EmailAddress>,

    /// Blind carbon copy recipients
    pub bcc: Vec<EmailAddress>,

    /// The address in the `From` header
    pub from: EmailAddress,

    /// The subject as an encoded-word
    pub subject: String,

    /// CRLF separated header lines, without `To` and `Subject`
    pub headers: String,

    /// The MIME body
    pub body: String,

    /// Envelope sender override used for bounces
    pub envelope_sender: Option<EmailAddress>,
}

impl OutgoingMail {
    /// The value of the `To` header
    pub fn to_header(&self) -> String {
        join_addresses(&self.to)
    }

    /// Every address the message is delivered to, without duplicates.
    ///
    /// `To`, `Cc` and `Bcc`, followed by addresses from any recipient header
    /// added to the header block by hand.
    pub fn envelope_recipients(&self) -> Vec<EmailAddress> {
        let from_headers = fields(&self.headers)
            .into_iter()
            .filter(|field| RECIPIENT_FIELDS.iter().any(|name| is_named(field, name)))
            .flat_map(|field| addresses_in(&field_value(&field)));

        let mut recipients: Vec<EmailAddress> = Vec::new();

        for address in self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .chain(from_headers)
        {
            if !recipients.contains(&address) {
                recipients.push(address);
            }
        }

        recipients
    }

    /// Render the message as it goes over the wire.
    ///
    /// `Bcc` fields are dropped, the same way `sendmail -t` removes them after
    /// reading the recipients.
    pub fn formatted(&self) -> String {
        let mut lines = vec![
            format!("To: {}", self.to_header()),
            format!("Subject: {}", self.subject),
        ];

        for field in fields(&self.headers) {
            if !is_named(&field, "Bcc") {
                lines.extend(field.into_iter().map(String::from));
            }
        }

        format!("{}\r\n\r\n{}", lines.join("\r\n"), self.body)
    }
}

const RECIPIENT_FIELDS: [&str; 3] = ["To", "Cc", "Bcc"];

/// Splits a header block into fields, keeping folded continuation lines with their field
fn fields(headers: &str) -> Vec<Vec<&str>> {
    let mut fields: Vec<Vec<&str>> = Vec::new();

    for line in headers.split("\r\n").filter(|line| !line.is_empty()) {
        match fields.last_mut() {
            Some(field) if line.starts_with([' ', '\t']) => field.push(line),
            _ => fields.push(vec![line]),
        }
    }

    fields
}

fn is_named(field: &[&str], name: &str) -> bool {
    field
        .first()
        .and_then(|line| line.split_once(':'))
        .map(|(field_name, _)| field_name.trim().eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

/// The unfolded value of a field
fn field_value(field: &[&str]) -> String {
    let mut lines = field.iter();

    let mut value = lines
        .next()
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default();

    for line in lines {
        value.push_str(line);
    }

    value
}

/// Splits an address list on commas outside quoted display names and angle brackets
fn addresses_in(value: &str) -> Vec<EmailAddress> {
    let mut addresses = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = false;

    for (index, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                addresses.extend(EmailAddress::new(&value[start..index]).ok());
                start = index + 1;
            }
            _ => {}
        }
    }

    addresses.extend(EmailAddress::new(&value[start..]).ok());

    addresses
}
