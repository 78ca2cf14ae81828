//! Generic client bootstrap.
//!
//! A client is created in two phases: a session is opened, then the API root is
//! requested and its `collection_links` parsed into the client's [`LinkSet`].

use crate::config::{parse_api_url, ChrisConfig, ClientConfig, MaxRequests};
use crate::connection::Connection;
use crate::de::{self, Value};
use crate::dispatch;
use crate::link::{resolve, LinkSet, Linked, ROOT_LINK};
use crate::session::{Connector, Session, SessionModifier};
use crate::Result;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Deserialize)]
struct Root<L> {
    collection_links: L,
}

/// A connected client of an API root whose links are described by `L`.
pub struct CollectionClient<L> {
    url: Url,
    links: Arc<L>,
    connection: Connection,
}

impl<L> Clone for CollectionClient<L> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            links: Arc::clone(&self.links),
            connection: self.connection.clone(),
        }
    }
}

impl<L: std::fmt::Debug> std::fmt::Debug for CollectionClient<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionClient")
            .field("url", &self.url.as_str())
            .field("links", &self.links)
            .field("connection", &self.connection)
            .finish()
    }
}

impl<L: LinkSet + DeserializeOwned> CollectionClient<L> {
    /// Request the API root and parse its links, using an open connection.
    ///
    /// # Errors
    ///
    /// Returns a status, transport or structural error, or the error of
    /// [`LinkSet::validate`].
    pub async fn discover(url: Url, connection: Connection) -> Result<Self> {
        debug!(%url, "discovering collection links");
        let request = connection.session().request(Method::GET, url.clone())?;
        let root: Value = dispatch::fetch(&connection, request, None).await?;
        let Root { collection_links } = de::structural::<Root<L>>(root)?;
        collection_links.validate()?;
        Ok(Self {
            url,
            links: Arc::new(collection_links),
            connection,
        })
    }
}

impl<L> CollectionClient<L> {
    /// API root URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Links discovered at the API root.
    #[must_use]
    pub fn links(&self) -> &L {
        &self.links
    }

    /// Close the session. Objects produced by this client can no longer make requests.
    ///
    /// The connector is closed too unless it was supplied by the caller.
    pub fn close(&self) -> bool {
        self.connection.session().close()
    }

    /// Returns true once the session is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.session().is_closed()
    }
}

impl<L: LinkSet> Linked for CollectionClient<L> {
    const LINK_NAMES: &'static [&'static str] = L::NAMES;
    const SERVES_ROOT: bool = true;

    fn link(&self, name: &str) -> Result<Url> {
        if name == ROOT_LINK {
            return Ok(self.url.clone());
        }
        resolve(self.links.as_ref(), std::any::type_name::<L>(), name)
    }

    fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// Builder for [`CollectionClient`].
pub struct ClientBuilder<L> {
    url: String,
    max_search_requests: MaxRequests,
    http_config: ClientConfig,
    connector: Option<(Connector, bool)>,
    modifier: Option<SessionModifier>,
    links: PhantomData<fn() -> L>,
}

impl<L> std::fmt::Debug for ClientBuilder<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("max_search_requests", &self.max_search_requests)
            .field("http_config", &self.http_config)
            .field("shared_connector", &self.connector.is_some())
            .field("session_modifier", &self.modifier.is_some())
            .finish()
    }
}

impl<L> ClientBuilder<L> {
    /// Create a builder for the API root at `url`, e.g. `https://cube.chrisproject.org/api/v1/`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_search_requests: MaxRequests::default(),
            http_config: ClientConfig::new(),
            connector: None,
            modifier: None,
            links: PhantomData,
        }
    }

    /// Create a builder from a [`ChrisConfig`].
    #[must_use]
    pub fn from_config(config: &ChrisConfig) -> Self {
        Self::new(config.url.clone())
            .with_max_search_requests(config.max_search_requests)
            .with_http_config(config.http_config())
    }

    /// API root URL this builder connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Set the maximum number of requests a single search may make.
    #[must_use]
    pub fn with_max_search_requests(mut self, max: MaxRequests) -> Self {
        self.max_search_requests = max;
        self
    }

    /// Override the HTTP configuration. Ignored when a connector is supplied.
    #[must_use]
    pub fn with_http_config(mut self, http_config: ClientConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Use an existing connector. When `connector_owner` is false, closing the
    /// client leaves the connector open for others.
    #[must_use]
    pub fn with_connector(mut self, connector: Connector, connector_owner: bool) -> Self {
        self.connector = Some((connector, connector_owner));
        self
    }

    /// Modify the session headers before the first request.
    #[must_use]
    pub fn with_session_modifier(mut self, modifier: SessionModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Build the connector now unless one was supplied, so that it can be used
    /// for requests made before [`ClientBuilder::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`](crate::Error::ConfigError) if the HTTP client cannot be built.
    pub fn prepare_connector(mut self) -> Result<Self> {
        if self.connector.is_none() {
            self.connector = Some((Connector::new(&self.http_config)?, true));
        }
        Ok(self)
    }

    /// The connector the client will use, if already known.
    #[must_use]
    pub fn connector(&self) -> Option<&Connector> {
        self.connector.as_ref().map(|(connector, _)| connector)
    }

    /// Pagination budget given to the client.
    #[must_use]
    pub fn max_search_requests(&self) -> MaxRequests {
        self.max_search_requests
    }
}

impl<L: LinkSet + DeserializeOwned> ClientBuilder<L> {
    /// Open a session and discover the API's links.
    ///
    /// If discovery fails the session is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`](crate::Error::ConfigError) if the URL is not
    /// an API root, or any error from [`CollectionClient::discover`].
    pub async fn connect(self) -> Result<CollectionClient<L>> {
        let url = parse_api_url(&self.url)?;
        let (connector, connector_owner) = match self.connector {
            Some(shared) => shared,
            None => (Connector::new(&self.http_config)?, true),
        };
        let session = Session::open(connector, connector_owner, self.modifier);
        let connection = Connection::new(session.clone(), self.max_search_requests);

        match CollectionClient::discover(url.clone(), connection).await {
            Ok(client) => {
                info!(%url, "connected to ChRIS backend");
                Ok(client)
            }
            Err(err) => {
                warn!(%url, error = %err, "link discovery failed, closing session");
                session.close();
                Err(err)
            }
        }
    }
}
