//! Socket bootstrap and the readiness-driven dispatcher.

pub mod dispatcher;
pub mod event;
pub mod listener;
pub mod signal;

pub use dispatcher::Server;
