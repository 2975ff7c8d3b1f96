//! # skystream-core
//!
//! Foundation types, errors, and utilities for the skystream firehose client.
//!
//! This crate provides the shared vocabulary the other skystream crates depend on:
//!
//! - **Wire events**: [`RawEvent`] with `Commit`, `Identity`, `Account` variants
//! - **Projections**: [`ProjectedPost`], the flattened view of a newly created post
//! - **Errors**: [`StreamError`] taxonomy via `thiserror`
//! - **Backoff**: reconnect delay math in [`backoff`]
//! - **Logging**: `tracing` subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod errors;
pub mod events;
pub mod logging;
pub mod post;

pub use errors::{HandlerError, Result, StreamError};
pub use events::{
    AccountEvent, AccountInfo, CommitEvent, CommitInfo, CommitOperation, IdentityEvent,
    IdentityInfo, RawEvent,
};
pub use post::ProjectedPost;
