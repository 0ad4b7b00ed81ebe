//! REST client side of the clinic intake server.
//!
//! This crate maps the server's JSON API onto the core's `RemoteStore` trait.
//! Wire types and endpoint paths are always available; the blocking HTTP
//! client lives behind the `http` feature.

pub mod endpoints;
pub mod wire;

#[cfg(feature = "http")]
pub mod http;

pub use endpoints::*;
pub use wire::*;

#[cfg(feature = "http")]
pub use http::HttpRemoteStore;
