//! REST API client for the booking portal.
//!
//! This module provides the `ApiClient` for fetching customer data from
//! the portal API. Requests are authenticated with a JWT bearer token
//! obtained by the application's login flow; this crate only consumes the
//! token.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
