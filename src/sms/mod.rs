//! SMS transport seam: inbound webhook payloads and outbound replies

pub mod twilio;
pub mod types;

pub use twilio::{TwilioCredentials, TwilioSink};
pub use types::{InboundSms, LogSink, ReplySink, SmsError, SmsResult};
