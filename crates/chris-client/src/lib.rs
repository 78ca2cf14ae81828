//! # chris-client
//!
//! Typed asynchronous client for the ChRIS backend API (CUBE).
//!
//! Three clients are provided, from least to most privileged:
//!
//! - [`AnonChrisClient`] reads public resources
//! - [`ChrisClient`] is a logged in user who uploads files and runs plugins
//! - [`ChrisAdminClient`] also registers plugins and creates compute resources
//!
//! Every resource returned by a client is connected to the client's session and
//! can follow its own links, e.g. [`PluginInstance::get_feed`]. Searches are lazy:
//! see [`Search`].
//!
//! ```no_run
//! use chris_client::{ChrisClient, QueryParams, SecretString};
//! use futures::TryStreamExt;
//!
//! # async fn example() -> chris_client::Result<()> {
//! let password = SecretString::from("chris1234");
//! let chris = ChrisClient::from_login("http://localhost:8000/api/v1/", "chris", &password).await?;
//! let mut plugins = chris.search_plugins(QueryParams::new().with("name", "pl-"))?.stream();
//! while let Some(plugin) = plugins.try_next().await? {
//!     println!("{} {}", plugin.name, plugin.version);
//! }
//! chris.close();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admin;
pub mod anon;
pub mod authed;
pub mod enums;
pub mod links;
pub mod models;

pub use admin::{ChrisAdminClient, NewComputeResource};
pub use anon::AnonChrisClient;
pub use authed::{AuthenticatedClient, ChrisClient};
pub use enums::{ParameterType, ParameterValue, PluginType, Status};
pub use links::{
    AdminApiCollectionLinks, AdminCollectionLinks, AnonymousCollectionLinks, CollectionLinks,
    UserLinks,
};
pub use models::{
    ComputeResource, Feed, FeedNote, File, PacsFile, Plugin, PluginInstance,
    PluginInstanceParameter, PluginParameter, PublicPlugin, User, UserData,
};

pub use chris_core::{
    ChrisConfig, ClientBuilder, ClientConfig, Connector, Error, MaxRequests, QueryParams, Search,
    StatusError,
};
pub use secrecy::SecretString;

/// Convenient result alias matching the shared ChRIS error type.
pub type Result<T> = chris_core::Result<T>;
