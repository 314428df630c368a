//! Message errors

use std::{io, path::PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::communication::{email_addresses::EmailAddressError, mailer::MailerError};

/// Errors that can occur while composing or sending a message
#[derive(Debug, Error)]
pub enum MessageError {
    /// An address was empty
    #[error(transparent)]
    InvalidAddress(#[from] EmailAddressError),

    /// The message has no primary recipient
    #[error("message has no recipients")]
    NoRecipients,

    /// The message has no from address
    #[error("message has no from address")]
    MissingFrom,

    /// An attachment could not be read from disk
    #[error("could not read attachment {}", path.display())]
    UnreadableAttachment {
        /// Path of the attachment
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The transport did not accept the message
    #[error(transparent)]
    Mailer(MailerError),
}

impl From<MailerError> for MessageError {
    fn from(err: MailerError) -> Self {
        debug!("MailerError -> MessageError");

        MessageError::Mailer(err)
    }
}
