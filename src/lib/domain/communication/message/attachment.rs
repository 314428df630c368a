//! Email attachments

use std::{fs, path::Path};

use tracing::debug;

use super::MessageError;

/// MIME type used when none is given
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file attached to a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient, without any directory
    pub filename: String,

    /// Raw file contents
    pub data: Vec<u8>,

    /// MIME type of the contents
    pub mime_type: String,
}

impl Attachment {
    /// Creates an attachment from in-memory data.
    ///
    /// Only the base name of `filename` is kept, with control characters
    /// removed. A missing or blank `mime_type` falls back to [`DEFAULT_MIME_TYPE`].
    pub fn new(filename: &str, data: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            filename: base_name(filename.trim())
                .chars()
                .filter(|c| !c.is_control())
                .collect(),
            data,
            mime_type: mime_type
                .map(str::trim)
                .filter(|mime| !mime.is_empty())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .chars()
                .filter(|c| !c.is_control())
                .collect(),
        }
    }

    /// Creates an attachment by reading the file at `path`
    pub fn from_path(path: &str, mime_type: Option<&str>) -> Result<Self, MessageError> {
        let path = path.trim();

        let data = fs::read(path).map_err(|source| {
            debug!("could not read attachment {path}: {source}");

            MessageError::UnreadableAttachment {
                path: path.into(),
                source,
            }
        })?;

        Ok(Self::new(path, data, mime_type))
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use std::env;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_new_keeps_only_the_base_name() {
        let attachment = Attachment::new("/var/tmp/reports/q3.csv", vec![], Some("text/csv"));

        assert_eq!(attachment.filename, "q3.csv");
        assert_eq!(attachment.mime_type, "text/csv");
    }

    #[test]
    fn test_new_strips_line_breaks_from_the_name() {
        let attachment = Attachment::new("we\"ird\r\nX-Injected: yes.txt", vec![], None);

        assert_eq!(attachment.filename, "we\"irdX-Injected: yes.txt");
    }

    #[test]
    fn test_new_defaults_mime_type() {
        assert_eq!(
            Attachment::new("blob", vec![], None).mime_type,
            DEFAULT_MIME_TYPE
        );
        assert_eq!(
            Attachment::new("blob", vec![], Some("  ")).mime_type,
            DEFAULT_MIME_TYPE
        );
    }

    #[test]
    fn test_from_path_reads_file() -> TestResult {
        let path = env::temp_dir().join(format!("mime-mailer-attachment-{}.txt", std::process::id()));
        fs::write(&path, b"attached bytes")?;

        let attachment = Attachment::from_path(&path.to_string_lossy(), None);
        fs::remove_file(&path)?;
        let attachment = attachment?;

        assert_eq!(attachment.data, b"attached bytes");
        assert_eq!(
            attachment.filename,
            format!("mime-mailer-attachment-{}.txt", std::process::id())
        );
        assert_eq!(attachment.mime_type, DEFAULT_MIME_TYPE);

        Ok(())
    }

    #[test]
    fn test_from_missing_path_is_an_error() {
        let result = Attachment::from_path("/nonexistent/mime-mailer/missing.bin", None);

        assert!(matches!(
            result,
            Err(MessageError::UnreadableAttachment { .. })
        ));
    }
}
