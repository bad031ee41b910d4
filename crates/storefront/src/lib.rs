//! Verbena Storefront - cart, checkout, and order finalization service.
//!
//! # Architecture
//!
//! - Axum web framework exposing a JSON API over the reconciliation engine
//! - Document store collaborator abstracted behind [`store::DocumentStore`]
//! - Identity, shipping-rate, and payment collaborators reached over HTTP
//! - Guest cart/favorites held in a local file-backed store until login
//!
//! The interesting logic lives in [`services`]: merging a guest cart into an
//! authenticated cart, pricing a checkout with shipping quotes, and turning
//! a payment notification into exactly one order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod guest;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod shipping;
pub mod state;
pub mod store;
