//! Streaming session modules.
//!
//! - `client`: HTTP transport, control channel, and the receive loop.
//! - `lines`: line framing over streamed response bodies.
//! - `proto`: control tokens, header parsing, and the field codec.
//! - `session`: server-assigned session parameters and the table registry.
//! - `subscription`: per-table item state and listener dispatch.

/// Stream client and connection lifecycle.
pub mod client;
/// Line reader over chunked bodies.
pub mod lines;
/// Protocol tokens and decoding rules.
pub mod proto;
/// Session state and table registry.
pub mod session;
/// Subscription tables and update events.
pub mod subscription;
