//! Client SDK for Lightstreamer-style HTTP streaming sessions.
//!
//! The crate is organized by layer:
//! - `stream`: line protocol, session state, subscriptions, and the stream
//!   client with its receive loop.
//! - `facade`: one-call connect/subscribe/fetch helpers over the client.
//! - `retry`: retry and timeout utilities used during session setup.

/// Connect/subscribe/fetch helpers for callers that hold stream credentials.
pub mod facade;
/// Retry and timeout helpers.
pub mod retry;
/// Streaming session client, protocol codec, and subscription tables.
pub mod stream;
