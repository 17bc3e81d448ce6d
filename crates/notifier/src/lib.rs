//! Bulk SMS / WhatsApp delivery for customer broadcasts.
//!
//! The [`Dispatcher`] fans a message out to every recipient over two
//! independent channels and returns a [`DispatchReport`] once every attempt
//! has resolved. Delivery itself goes through a [`MessagingProvider`], injected
//! at construction so tests can substitute a stub.

pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod report;

pub use dispatcher::{Dispatcher, DispatcherConfig, Recipient};
pub use error::NotifierError;
pub use provider::{DisabledProvider, MessagingProvider, TwilioProvider};
pub use report::{AttemptOutcome, Channel, ChannelOutcome, DispatchReport, RecipientReport};
