//! Sparteo bidder adapter.
//!
//! Rewrites `OpenRTB` bid requests for the Sparteo exchange and converts its
//! responses into typed bids for the host auction server.
//!
//! # Modules
//!
//! - [`bidder`]: Contract between the host and bidder adapters
//! - [`error`]: Error types and error handling utilities
//! - [`json_ext`]: Helpers for editing open `ext` objects
//! - [`logging`]: Logger initialization for standalone hosts
//! - [`macros`]: Endpoint URL templates and macro resolution
//! - [`settings`]: Configuration management and validation
//! - [`sparteo`]: The Sparteo adapter itself
//! - [`test_support`]: Testing utilities and fixtures

pub mod bidder;
pub mod error;
pub mod json_ext;
pub mod logging;
pub mod macros;
pub mod settings;
pub mod sparteo;
