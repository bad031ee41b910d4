//! Verbena Core - Shared types library.
//!
//! This crate provides common types used across the Verbena components:
//! - `storefront` - Public-facing e-commerce service
//! - `integration-tests` - End-to-end tests of the reconciliation engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no document store access,
//! no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
