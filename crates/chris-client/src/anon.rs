//! Anonymous client.

use crate::links::AnonymousCollectionLinks;
use crate::models::PublicPlugin;
use chris_core::link::Route;
use chris_core::search::DEFAULT_SEARCH_SUBPATH;
use chris_core::{
    check_routes, dispatch, route_link, ClientBuilder, CollectionClient, Connection, LinkSet,
    Linked, QueryParams, Result, Search, Url,
};

/// A client which has not logged in. It can read public resources such as plugins.
///
/// # Example
///
/// ```no_run
/// use chris_client::{AnonChrisClient, QueryParams};
///
/// # async fn example() -> chris_client::Result<()> {
/// let chris = AnonChrisClient::connect("https://cube.chrisproject.org/api/v1/").await?;
/// let dircopy = chris
///     .search_plugins(QueryParams::new().with("name_exact", "pl-dircopy"))?
///     .first()
///     .await?;
/// println!("{:?}", dircopy.map(|p| p.version.clone()));
/// chris.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnonChrisClient {
    inner: CollectionClient<AnonymousCollectionLinks>,
}

impl AnonChrisClient {
    /// Connect to the API root at `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an API root or the links cannot be discovered.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::from_builder(ClientBuilder::new(url)).await
    }

    /// Connect using a configured builder.
    ///
    /// # Errors
    ///
    /// See [`AnonChrisClient::connect`].
    pub async fn from_builder(builder: ClientBuilder<AnonymousCollectionLinks>) -> Result<Self> {
        check_routes::<Self>()?;
        Ok(Self {
            inner: builder.connect().await?,
        })
    }

    /// Search for plugins.
    ///
    /// Plugins found this way cannot be run: log in to create plugin instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the `plugins` link cannot be resolved.
    pub fn search_plugins(&self, query: QueryParams) -> Result<Search<PublicPlugin>> {
        let link = route_link!(AnonChrisClient, search_plugins);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// API root URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    /// Links discovered at the API root.
    #[must_use]
    pub fn links(&self) -> &AnonymousCollectionLinks {
        self.inner.links()
    }

    /// Close the session of this client.
    pub fn close(&self) -> bool {
        self.inner.close()
    }
}

impl Linked for AnonChrisClient {
    const LINK_NAMES: &'static [&'static str] = AnonymousCollectionLinks::NAMES;
    const SERVES_ROOT: bool = true;
    const ROUTES: &'static [Route] = &[Route::new("search_plugins", "plugins")];

    fn link(&self, name: &str) -> Result<Url> {
        self.inner.link(name)
    }

    fn connection(&self) -> &Connection {
        self.inner.connection()
    }
}

chris_core::assert_routes!(AnonChrisClient);
