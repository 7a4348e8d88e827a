//! EchoLink relay: carries signed blockchain transactions over SMS
//!
//! A sender compresses and encodes a signed transaction ([`codec`]), splits
//! it into SMS-sized segments ([`segment`]) and texts them to the relay. The
//! relay reassembles segments per sender ([`session`]), rejects replays
//! ([`replay`]), submits to the network ([`ledger`]) and reports the outcome
//! by SMS ([`sms`]). [`relay`] ties the stages together and [`api`] exposes
//! the webhook.

pub mod api;
pub mod codec;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod relay;
pub mod replay;
pub mod segment;
pub mod session;
pub mod sms;
pub mod testing;
