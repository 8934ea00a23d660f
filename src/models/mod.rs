//! Data models for booking portal entities.
//!
//! This module contains the data structures used to represent customer
//! data and list queries:
//!
//! - `Customer`, `CustomerStatus`: the cached record type
//! - `CustomerListResponse`, `Pagination`: API response wrappers
//! - `CustomerFilters`, `SortField`, `SortDirection`: list query parameters,
//!   applied identically by the remote API and the local cache

pub mod customer;
pub mod filters;

pub use customer::{Customer, CustomerListResponse, CustomerStatus, Pagination};
pub use filters::{CustomerFilters, SortDirection, SortField, DEFAULT_PAGE_SIZE};
