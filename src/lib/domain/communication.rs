//! Composing and sending email

pub mod email_addresses;
pub mod mailer;
pub mod message;
