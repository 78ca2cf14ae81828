//! Network session lifecycle.
//!
//! A [`Connector`] is a connection pool which may be shared by several clients.
//! A [`Session`] is a handle over a connector carrying its own default headers;
//! it is shared by a client and every connected object the client produced.

use crate::config::ClientConfig;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Called once on a new session's headers, before any request is sent.
pub type SessionModifier = Box<dyn FnOnce(&mut HeaderMap) + Send>;

struct ConnectorInner {
    http: Client,
    closed: AtomicBool,
    open_sessions: AtomicUsize,
}

/// Shareable HTTP connection pool.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

impl Connector {
    /// Build a connection pool from the HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .gzip(config.enable_compression);

        if !config.tls_verify {
            warn!("TLS verification disabled for ChRIS client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self::from_client(http))
    }

    /// Wrap an existing [`reqwest::Client`].
    #[must_use]
    pub fn from_client(http: Client) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                http,
                closed: AtomicBool::new(false),
                open_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of sessions on this connector which are still open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Close the connector. Sessions using it can no longer make requests.
    ///
    /// Only marks the connector closed: the underlying connection pool is
    /// released once the last clone of this connector is dropped.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`Connector::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("closed", &self.is_closed())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

struct SessionInner {
    connector: Connector,
    connector_owner: bool,
    headers: HeaderMap,
    closed: AtomicBool,
}

impl SessionInner {
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.connector
            .inner
            .open_sessions
            .fetch_sub(1, Ordering::SeqCst);
        if self.connector_owner {
            self.connector.close();
        }
        true
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shared network session.
///
/// Cloning is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Open a session on a connector.
    ///
    /// Every request carries `Accept: application/json` and whatever headers
    /// `modifier` adds. When `connector_owner` is true, closing the session
    /// also closes the connector.
    #[must_use]
    pub fn open(
        connector: Connector,
        connector_owner: bool,
        modifier: Option<SessionModifier>,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(modifier) = modifier {
            modifier(&mut headers);
        }
        connector
            .inner
            .open_sessions
            .fetch_add(1, Ordering::SeqCst);
        debug!(connector_owner, "opened session");
        Self {
            inner: Arc::new(SessionInner {
                connector,
                connector_owner,
                headers,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Start a request with this session's headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session or its connector is closed.
    pub fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> Result<RequestBuilder> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        Ok(self
            .inner
            .connector
            .inner
            .http
            .request(method, url)
            .headers(self.inner.headers.clone()))
    }

    /// Close the session. Calling it again has no effect.
    ///
    /// Returns true if this call closed the session.
    pub fn close(&self) -> bool {
        let closed = self.inner.close();
        if closed {
            debug!(
                connector_owner = self.inner.connector_owner,
                "closed session"
            );
        }
        closed
    }

    /// Returns true if the session or its connector is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.connector.is_closed()
    }

    /// The connector this session uses.
    #[must_use]
    pub fn connector(&self) -> &Connector {
        &self.inner.connector
    }

    /// Default headers sent with every request.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .field("connector_owner", &self.inner.connector_owner)
            .finish_non_exhaustive()
    }
}
