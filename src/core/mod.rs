//! Core types shared by the server and the client
//!
//! At the moment this is the error vocabulary: [`HotswapError`] for typed
//! failure modes and [`ErrorContext`] for presenting them to a terminal user.

pub mod error;

pub use error::{ErrorContext, HotswapError, user_friendly_error};
