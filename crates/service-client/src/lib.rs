//! # linktag-service-client
//!
//! [`ResilientClient`] wraps GET calls to an external read-only JSON service, retrying
//! transient failures under a [`linktag_core::RetryPolicy`] and reporting 404 as
//! [`ServiceClientError::NotFound`].

mod client;
mod error;

pub use client::{ResilientClient, DEFAULT_TIMEOUT};
pub use error::{Result, RetryClass, ServiceClientError};
