//! # chris-core
//!
//! Link-driven request engine for hypermedia REST APIs such as the ChRIS backend.
//!
//! Clients never build endpoint URLs themselves. The API root advertises its
//! collections as named links, and every resource carries URLs to related
//! resources; methods name the link they need and the URL is resolved when the
//! request is made.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status mapping
//! - [`config`] - Configuration structures and the pagination budget
//! - [`session`] - Connection pool and session lifecycle
//! - [`connection`] - Session and pagination budget carried by connected objects
//! - [`link`] - Link sets, route tables and their validation
//! - [`de`] - Deserialization of responses into connected or plain values
//! - [`dispatch`] - HTTP requests to resolved links
//! - [`search`] - Lazy paginated collections
//! - [`query`] - Query parameter builder
//! - [`client`] - Client bootstrap by link discovery

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod connection;
pub mod de;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod query;
pub mod search;
pub mod session;

// Re-export commonly used types
pub use client::{ClientBuilder, CollectionClient};
pub use config::{ChrisConfig, ClientConfig, MaxRequests};
pub use connection::Connection;
pub use de::FromLinked;
pub use error::{Error, Result, StatusError};
pub use link::{check_routes, LinkSet, Linked, Route, ROOT_LINK};
pub use query::QueryParams;
pub use search::Search;
pub use session::{Connector, Session, SessionModifier};
pub use url::Url;
