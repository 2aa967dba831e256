//! HTTP/1.1 protocol implementation.
//!
//! This module implements the per-connection request/response engine: an
//! incremental parser over fixed buffers, resource resolution against the
//! web root, and a scatter-send response path.
//!
//! # Submodules
//!
//! - **`connection`**: the per-socket state machine driven by readiness
//!   events (`read_once` / `process` / `write`)
//! - **`parser`**: line extraction and request-line/header token rules
//! - **`request`**: the parsed request fields
//! - **`response`**: status codes and canned error bodies
//!
//! # Connection state machine
//!
//! ```text
//!        ┌──────────────────────┐
//!        │  ParsingRequestLine  │ ← method, url, version
//!        └──────────┬───────────┘
//!                   │ request line accepted
//!                   ▼
//!        ┌──────────────────────┐
//!        │    ParsingHeaders    │ ← Connection / Content-Length / Host
//!        └──────────┬───────────┘
//!                   │ blank line
//!          ┌────────┴────────┐
//!          │ POST with body  │ GET, or no body
//!          ▼                 ▼
//!   ┌─────────────┐   ┌──────────────┐
//!   │ ParsingBody │──▶│   complete   │ → resolve file, assemble response
//!   └─────────────┘   └──────┬───────┘
//!                            │ response sent
//!                            ├─ keep-alive → ParsingRequestLine (reset)
//!                            └─ close → connection torn down
//! ```
//!
//! Any prefix of a request may be buffered when an event fires; parsing
//! always resumes where it stopped, so the final state is identical whether
//! the request arrives byte by byte or in one read.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
