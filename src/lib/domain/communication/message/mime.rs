//! MIME assembly

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use super::Attachment;

/// Line terminator for every header and body line
pub(crate) const CRLF: &str = "\r\n";

/// Maximum length of a base64 body line
const LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded-word
const ENCODED_WORD_LENGTH: usize = 75;

/// Characters percent-encoded in an RFC 2231 `filename*` parameter
const RFC2231_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

/// The plain text and HTML bodies of a message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    /// Plain text body
    pub text: Option<String>,

    /// HTML body
    pub html: Option<String>,
}

impl Body {
    /// The plain text body, if one was set and it is not empty
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    /// The HTML body, if one was set and it is not empty
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref().filter(|html| !html.is_empty())
    }
}

/// Base64 encode `data` into lines of at most 76 characters, each terminated by CRLF
pub(crate) fn chunked_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);

    if encoded.is_empty() {
        return CRLF.to_string();
    }

    let mut out = String::with_capacity(encoded.len() + (encoded.len() / LINE_LENGTH + 1) * 2);

    for line in encoded.as_bytes().chunks(LINE_LENGTH) {
        out.extend(line.iter().copied().map(char::from));
        out.push_str(CRLF);
    }

    out
}

/// Encode header text as RFC 2047 encoded-words.
///
/// Text too long for one 75 character word is split on character boundaries
/// into several words, folded onto continuation lines.
pub(crate) fn encoded_word(charset: &str, text: &str) -> String {
    let overhead = "=??B??=".len() + charset.len();
    let budget = ENCODED_WORD_LENGTH.saturating_sub(overhead) / 4 * 3;

    let mut chunks = vec![String::new()];

    for c in text.chars() {
        if let Some(chunk) = chunks.last_mut() {
            if chunk.is_empty() || chunk.len() + c.len_utf8() <= budget {
                chunk.push(c);
                continue;
            }
        }

        chunks.push(c.to_string());
    }

    chunks
        .iter()
        .map(|chunk| format!("=?{charset}?B?{}?=", STANDARD.encode(chunk)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// The `Content-Disposition` of an attachment.
///
/// ASCII names are quoted. Other names get an encoded-word for older readers
/// and an RFC 2231 `filename*` parameter.
fn disposition(filename: &str) -> String {
    if filename.is_ascii() {
        let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");

        return format!("Content-Disposition: attachment; filename=\"{escaped}\"");
    }

    format!(
        "Content-Disposition: attachment; filename=\"{}\";\r\n\tfilename*=UTF-8''{}",
        encoded_word("UTF-8", filename),
        utf8_percent_encode(filename, RFC2231_SET)
    )
}

/// A random boundary for the top level entity of a message
pub(crate) fn message_boundary() -> String {
    digest_hex(format!("{}{}", Utc::now().timestamp_micros(), salt()))
}

/// A boundary for a `multipart/alternative` entity nested inside `multipart/mixed`
fn alternative_boundary(text: &str) -> String {
    digest_hex(format!("{}{}", digest_hex(text), salt()))
}

fn salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn digest_hex(data: impl AsRef<[u8]>) -> String {
    Sha256::digest(data)
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// How the top level entity of a message is structured
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Layout {
    /// A single `text/plain` entity
    Text,

    /// A single `text/html` entity
    Html,

    /// `multipart/alternative` with text then HTML
    Alternative,

    /// `multipart/mixed` with the body followed by attachments
    Mixed,
}

/// Renders the body of one message and the headers describing it
#[derive(Debug)]
pub(crate) struct Assembly<'a> {
    charset: &'a str,
    boundary: &'a str,
    body: &'a Body,
    attachments: &'a [Attachment],
}

impl<'a> Assembly<'a> {
    pub(crate) fn new(
        charset: &'a str,
        boundary: &'a str,
        body: &'a Body,
        attachments: &'a [Attachment],
    ) -> Self {
        Self {
            charset,
            boundary,
            body,
            attachments,
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        if !self.attachments.is_empty() {
            Layout::Mixed
        } else if self.body.html().is_none() {
            Layout::Text
        } else if self.body.text().is_none() {
            Layout::Html
        } else {
            Layout::Alternative
        }
    }

    /// `Content-Type` and `Content-Transfer-Encoding` of the top level entity
    pub(crate) fn content_headers(&self) -> [String; 2] {
        match self.layout() {
            Layout::Mixed => [
                format!("Content-Type: multipart/mixed; boundary=\"{}\"", self.boundary),
                "Content-Transfer-Encoding: 7bit".to_string(),
            ],
            Layout::Text => [
                format!("Content-Type: text/plain; charset={}", self.charset),
                "Content-Transfer-Encoding: base64".to_string(),
            ],
            Layout::Html => [
                format!("Content-Type: text/html; charset={}", self.charset),
                "Content-Transfer-Encoding: base64".to_string(),
            ],
            Layout::Alternative => [
                format!(
                    "Content-Type: multipart/alternative; boundary=\"{}\"",
                    self.boundary
                ),
                "Content-Transfer-Encoding: 7bit".to_string(),
            ],
        }
    }

    /// The message body matching [`Assembly::content_headers`]
    pub(crate) fn render(&self) -> String {
        match self.layout() {
            Layout::Mixed => self.mixed(),
            Layout::Text => chunked_base64(self.text_body().as_bytes()),
            Layout::Html => chunked_base64(self.html_body().as_bytes()),
            Layout::Alternative => self.alternative(self.boundary, false),
        }
    }

    fn text_body(&self) -> &str {
        self.body.text().unwrap_or_default()
    }

    fn html_body(&self) -> &str {
        self.body.html().unwrap_or_default()
    }

    fn text_part(&self) -> String {
        [
            format!("Content-Type: text/plain; charset={}", self.charset),
            "Content-Transfer-Encoding: base64".to_string(),
            String::new(),
            chunked_base64(self.text_body().as_bytes()),
        ]
        .join(CRLF)
    }

    fn html_part(&self) -> String {
        [
            format!("Content-Type: text/html; charset={}", self.charset),
            "Content-Transfer-Encoding: base64".to_string(),
            String::new(),
            chunked_base64(self.html_body().as_bytes()),
        ]
        .join(CRLF)
    }

    fn alternative(&self, boundary: &str, nested: bool) -> String {
        let mut lines = Vec::with_capacity(9);

        if nested {
            lines.push(format!(
                "Content-Type: multipart/alternative; boundary=\"{boundary}\""
            ));
            lines.push("Content-Transfer-Encoding: 7bit".to_string());
            lines.push(String::new());
        }

        lines.push(format!("--{boundary}"));
        lines.push(self.text_part());
        lines.push(format!("--{boundary}"));
        lines.push(self.html_part());
        lines.push(format!("--{boundary}--"));

        if nested {
            lines.push(String::new());
        }

        lines.join(CRLF)
    }

    fn mixed(&self) -> String {
        let mut lines = vec![format!("--{}", self.boundary)];

        lines.push(match (self.body.text(), self.body.html()) {
            (Some(text), Some(_)) => self.alternative(&alternative_boundary(text), true),
            (None, Some(_)) => self.html_part(),
            _ => self.text_part(),
        });

        for attachment in self.attachments {
            lines.push(format!("--{}", self.boundary));
            lines.push(format!("Content-Type: {}", attachment.mime_type));
            lines.push("Content-Transfer-Encoding: base64".to_string());
            lines.push(disposition(&attachment.filename));
            lines.push(String::new());
            lines.push(chunked_base64(&attachment.data));
        }

        lines.push(format!("--{}--", self.boundary));

        lines.join(CRLF)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn body(text: Option<&str>, html: Option<&str>) -> Body {
        Body {
            text: text.map(String::from),
            html: html.map(String::from),
        }
    }

    #[test]
    fn test_chunked_base64_wraps_at_76_characters() -> TestResult {
        let data = vec![b'x'; 200];
        let encoded = chunked_base64(&data);

        let lines: Vec<&str> = encoded.split_terminator(CRLF).collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|line| line.len() == 76));
        assert!(encoded.ends_with(CRLF));
        assert_eq!(STANDARD.decode(lines.concat())?, data);

        Ok(())
    }

    #[test]
    fn test_chunked_base64_of_nothing_is_a_blank_line() {
        assert_eq!(chunked_base64(b""), CRLF);
    }

    #[test]
    fn test_encoded_word() {
        assert_eq!(encoded_word("UTF-8", "Grüße"), "=?UTF-8?B?R3LDvMOfZQ==?=");
        assert_eq!(encoded_word("ISO-8859-1", ""), "=?ISO-8859-1?B??=");
    }

    #[test]
    fn test_long_text_is_split_into_several_encoded_words() -> TestResult {
        let subject = "Quarterly report for the infrastructure team, with ünïcödé, ".repeat(3);
        let encoded = encoded_word("UTF-8", &subject);

        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);

        let mut decoded = Vec::new();
        for word in words {
            assert!(word.len() <= 75, "{word}");

            let payload = word
                .strip_prefix("=?UTF-8?B?")
                .and_then(|word| word.strip_suffix("?="))
                .expect("an encoded-word");
            let bytes = STANDARD.decode(payload)?;

            assert!(std::str::from_utf8(&bytes).is_ok());
            decoded.extend(bytes);
        }

        assert_eq!(String::from_utf8(decoded)?, subject);

        Ok(())
    }

    #[test]
    fn test_ascii_filename_is_quoted() {
        assert_eq!(
            disposition("we\"ird\\name.txt"),
            "Content-Disposition: attachment; filename=\"we\\\"ird\\\\name.txt\""
        );
    }

    #[test]
    fn test_non_ascii_filename_is_encoded() {
        assert_eq!(
            disposition("Grüße 1.txt"),
            "Content-Disposition: attachment; filename=\"=?UTF-8?B?R3LDvMOfZSAxLnR4dA==?=\";\r\n\
             \tfilename*=UTF-8''Gr%C3%BC%C3%9Fe%201.txt"
        );
    }

    #[test]
    fn test_attachment_name_cannot_inject_headers() {
        let body = body(Some("hello"), None);
        let attachments = [Attachment::new(
            "we\"ird\r\nX-Injected: yes.txt",
            b"x".to_vec(),
            None,
        )];
        let assembly = Assembly::new("UTF-8", "outer", &body, &attachments);

        let rendered = assembly.render();

        assert!(!rendered.contains("\r\nX-Injected"));
        assert!(rendered.contains(
            "Content-Disposition: attachment; filename=\"we\\\"irdX-Injected: yes.txt\"\r\n"
        ));
    }

    #[test]
    fn test_boundaries_are_unique() {
        let first = message_boundary();
        let second = message_boundary();

        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
        assert_ne!(alternative_boundary("text"), alternative_boundary("text"));
    }

    #[test]
    fn test_layout_precedence() {
        let attachment = Attachment::new("a.bin", vec![1, 2, 3], None);
        let attachments = [attachment];

        let cases = [
            (body(None, None), &[][..], Layout::Text),
            (body(Some("t"), None), &[][..], Layout::Text),
            (body(None, Some("h")), &[][..], Layout::Html),
            (body(Some("t"), Some("h")), &[][..], Layout::Alternative),
            (body(Some(""), Some("h")), &[][..], Layout::Html),
            (body(None, None), &attachments[..], Layout::Mixed),
        ];

        for (body, attachments, expected) in cases {
            let assembly = Assembly::new("UTF-8", "b", &body, attachments);

            assert_eq!(assembly.layout(), expected, "{body:?}");
        }
    }

    #[test]
    fn test_text_only_body_has_no_boundaries() {
        let body = body(Some("hello"), None);
        let assembly = Assembly::new("UTF-8", "outer", &body, &[]);

        assert_eq!(
            assembly.content_headers(),
            [
                "Content-Type: text/plain; charset=UTF-8".to_string(),
                "Content-Transfer-Encoding: base64".to_string(),
            ]
        );
        assert_eq!(assembly.render(), "aGVsbG8=\r\n");
    }

    #[test]
    fn test_alternative_body() {
        let body = body(Some("hello"), Some("<p>hello</p>"));
        let assembly = Assembly::new("UTF-8", "outer", &body, &[]);

        assert_eq!(
            assembly.render(),
            "--outer\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             aGVsbG8=\r\n\
             \r\n\
             --outer\r\n\
             Content-Type: text/html; charset=UTF-8\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             PHA+aGVsbG88L3A+\r\n\
             \r\n\
             --outer--"
        );
    }

    #[test]
    fn test_mixed_body_nests_alternative_under_its_own_boundary() {
        let body = body(Some("hello"), Some("<p>hello</p>"));
        let attachments = [Attachment::new("report.pdf", b"%PDF".to_vec(), Some("application/pdf"))];
        let assembly = Assembly::new("UTF-8", "outer", &body, &attachments);

        let rendered = assembly.render();

        assert_eq!(rendered.matches("--outer\r\n").count(), 2);
        assert!(rendered.ends_with("--outer--"));
        assert!(rendered.contains("Content-Type: multipart/alternative; boundary=\""));
        assert!(rendered.contains("Content-Type: application/pdf\r\n"));
        assert!(rendered.contains("Content-Disposition: attachment; filename=\"report.pdf\"\r\n"));

        let text = rendered.find("text/plain").unwrap_or(usize::MAX);
        let html = rendered.find("text/html").unwrap_or(0);
        assert!(text < html);
    }
}
