//! Depot HTTP surface
//!
//! Axum handlers for the chunked-upload protocol, error mapping, caller
//! context extraction, OpenAPI document, and application setup.

pub mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
