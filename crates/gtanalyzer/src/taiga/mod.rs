//! Taiga REST client.
//!
//! [`TaigaClient`] implements [`BoardSource`](crate::platform::BoardSource)
//! against a Taiga instance (hosted or self-managed) with a bearer token.

mod client;
mod convert;
mod error;
mod types;

pub use client::{TAIGA_API_URL, TaigaClient};
pub use convert::to_date;
pub use error::{TaigaError, is_retryable, short_error_message};
