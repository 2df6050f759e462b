//! docflow - event-sourced documents with flow-controlled query streaming
//!
//! Channels feed projections that materialize documents into binders.
//! Commands publish to channels; queries stream binder documents to clients
//! with byte-credit backpressure, each execution pinned to one context.

pub mod binder;
pub mod channel;
pub mod cli;
pub mod config;
pub mod cqrs;
pub mod observability;
pub mod platform;
pub mod query;
pub mod rest_api;
pub mod runtime;
