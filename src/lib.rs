//! A minimal OCI Distribution client that transparently answers registry
//! authentication challenges
#![deny(missing_docs)]

mod cancellation;
pub mod challenge;
pub mod client;
pub mod config;
pub mod errors;
mod regexp;
pub mod request;
pub mod response;
pub mod secrets;
mod token;
pub mod transport;

#[doc(inline)]
pub use client::Client;
#[doc(inline)]
pub use errors::{RegistryError, Result};
#[doc(inline)]
pub use request::{PathParams, Request};
#[doc(inline)]
pub use response::Response;
#[doc(inline)]
pub use tokio_util::sync::CancellationToken;

#[macro_use]
extern crate lazy_static;
