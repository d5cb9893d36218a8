//! REST client for the school-bus backend.
//!
//! [`ApiClient`] owns the HTTP transport and the attached bearer token;
//! endpoint groups live in [`auth`] and [`resources`].

pub mod auth;
pub(crate) mod client;
pub mod resources;

pub use client::{ApiClient, IDEMPOTENCY_HEADER};
pub use resources::merge_input;
