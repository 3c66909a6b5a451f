//! Event Post Bot — guided event submissions published to a channel.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod store;
