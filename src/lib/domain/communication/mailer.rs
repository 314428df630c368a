//! Mail transport module

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

mod errors;
mod outgoing;

pub use errors::MailerError;
pub use outgoing::OutgoingMail;

/// A transport that hands a fully assembled message over for delivery
#[async_trait]
pub trait Mailer: Clone + Send + Sync + 'static {
    /// Deliver an email
    ///
    /// # Arguments
    /// * `mail` - The [`OutgoingMail`] holding envelope recipients, the encoded subject,
    ///   the header block and the MIME body.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] once the transport accepted the message,
    /// or an [`Err`] containing a [`MailerError`] if it did not.
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailerError>;
}

#[cfg(test)]
mock! {
    pub Mailer {}

    impl Clone for Mailer {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl Mailer for Mailer {
        async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailerError>;
    }
}

#[cfg(test)]
pub mod tests {
    pub use super::MockMailer;
}
