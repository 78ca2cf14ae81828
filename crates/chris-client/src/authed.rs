//! Authenticated client: login, token authentication and the resources of a logged in user.

use crate::links::{AdminCollectionLinks, CollectionLinks, UserLinks, UPLOADEDFILES, USERFILES};
use crate::models::{ComputeResource, Feed, File, PacsFile, Plugin, PluginInstance, User, UserData};
use chris_core::config::parse_api_url;
use chris_core::link::Route;
use chris_core::search::DEFAULT_SEARCH_SUBPATH;
use chris_core::{
    check_routes, dispatch, route_link, ClientBuilder, ClientConfig, CollectionClient, Connection,
    Connector, Error, Linked, MaxRequests, QueryParams, Result, Search, Session, Url, ROOT_LINK,
};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A client of a normal user, who may upload files and run plugins.
pub type ChrisClient = AuthenticatedClient<CollectionLinks>;

/// A logged in client whose root links are described by `L`.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient<L> {
    inner: CollectionClient<L>,
    user: Arc<OnceCell<User>>,
}

#[derive(Deserialize)]
struct AuthToken {
    token: String,
}

impl<L: UserLinks + DeserializeOwned> AuthenticatedClient<L> {
    /// Connect to the API root at `url` using an authentication token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the token is rejected, or any
    /// error from [`ClientBuilder::connect`].
    pub async fn from_token(url: impl Into<String>, token: &SecretString) -> Result<Self> {
        Self::from_token_with(ClientBuilder::new(url), token).await
    }

    /// Connect using a configured builder and an authentication token.
    ///
    /// The token is sent as `Authorization: Token <token>` with every request.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_token`].
    pub async fn from_token_with(builder: ClientBuilder<L>, token: &SecretString) -> Result<Self> {
        check_routes::<Self>()?;
        let mut header = HeaderValue::from_str(&format!("Token {}", token.expose_secret()))
            .map_err(|e| Error::ConfigError(format!("token is not a valid header value: {e}")))?;
        header.set_sensitive(true);
        let inner = builder
            .with_session_modifier(Box::new(move |headers| {
                headers.insert(AUTHORIZATION, header);
            }))
            .connect()
            .await?;
        Ok(Self {
            inner,
            user: Arc::default(),
        })
    }

    /// Get an authentication token using a username and password, then connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectLogin`] if the credentials are rejected, or any
    /// error from [`AuthenticatedClient::from_token`].
    pub async fn from_login(
        url: impl Into<String>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self> {
        Self::from_login_with(ClientBuilder::new(url), username, password).await
    }

    /// Get an authentication token using a configured builder, then connect.
    ///
    /// The token request goes through the connector the client will use. A
    /// connector created here is closed again if the login fails.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_login`].
    pub async fn from_login_with(
        builder: ClientBuilder<L>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self> {
        check_routes::<Self>()?;
        let url = parse_api_url(builder.url())?;
        let created_here = builder.connector().is_none();
        let builder = builder.prepare_connector()?;
        let Some(connector) = builder.connector().cloned() else {
            return Err(Error::ConfigError("connector was not prepared".to_string()));
        };

        match request_token(&connector, &url, username, password).await {
            Ok(token) => {
                info!(%url, username, "logged in");
                Self::from_token_with(builder, &token).await
            }
            Err(err) => {
                if created_here {
                    connector.close();
                }
                Err(err)
            }
        }
    }
}

async fn request_token(
    connector: &Connector,
    api_url: &Url,
    username: &str,
    password: &SecretString,
) -> Result<SecretString> {
    let auth_url = api_url.join("auth-token/")?;
    debug!(url = %auth_url, username, "requesting authentication token");
    let session = Session::open(connector.clone(), false, None);
    let response = session
        .request(Method::POST, auth_url)?
        .json(&json!({ "username": username, "password": password.expose_secret() }))
        .send()
        .await?;
    if response.status() == StatusCode::BAD_REQUEST {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::IncorrectLogin(message));
    }
    let response = dispatch::check_status(response, Some(json!({ "username": username }))).await?;
    let AuthToken { token } = response
        .json()
        .await
        .map_err(|e| Error::Deserialize(format!("authentication token: {e}")))?;
    Ok(SecretString::from(token))
}

impl<L: UserLinks> AuthenticatedClient<L> {
    /// Search for feeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the search URL cannot be built.
    pub fn search_feeds(&self, query: QueryParams) -> Result<Search<Feed>> {
        let link = route_link!(ChrisClient, search_feeds);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// Search for plugins.
    ///
    /// # Errors
    ///
    /// Returns an error if the `plugins` link cannot be resolved.
    pub fn search_plugins(&self, query: QueryParams) -> Result<Search<Plugin>> {
        let link = route_link!(ChrisClient, search_plugins);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// Search for plugin instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the `plugin_instances` link cannot be resolved.
    pub fn plugin_instances(&self, query: QueryParams) -> Result<Search<PluginInstance>> {
        let link = route_link!(ChrisClient, plugin_instances);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// Search for compute resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the `compute_resources` link cannot be resolved.
    pub fn search_compute_resources(&self, query: QueryParams) -> Result<Search<ComputeResource>> {
        let link = route_link!(ChrisClient, search_compute_resources);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// Every compute resource. There are usually few of them.
    ///
    /// # Errors
    ///
    /// Returns the first error met while paginating.
    pub async fn get_all_compute_resources(&self) -> Result<Vec<ComputeResource>> {
        self.search_compute_resources(QueryParams::new())?
            .collect_all()
            .await
    }

    /// Search for files pushed from a PACS.
    ///
    /// # Errors
    ///
    /// Returns an error if the `pacsfiles` link cannot be resolved.
    pub fn search_pacsfiles(&self, query: QueryParams) -> Result<Search<PacsFile>> {
        let link = route_link!(ChrisClient, search_pacsfiles);
        dispatch::search(self, link, DEFAULT_SEARCH_SUBPATH, query)
    }

    /// The account of the logged in user. Always makes a request.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn user(&self) -> Result<User> {
        dispatch::get(self, route_link!(ChrisClient, user), &QueryParams::new()).await
    }

    /// Username of the logged in user. Only the first call makes a request.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn username(&self) -> Result<String> {
        let user = self.user.get_or_try_init(|| self.user()).await?;
        Ok(user.username.clone())
    }

    /// Upload a local file to `<username>/uploads/<upload_path>`.
    ///
    /// `upload_path` may already start with `<username>/uploads/`. The whole
    /// file is read into memory before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or the error of the request.
    pub async fn upload_file(&self, local_file: impl AsRef<Path>, upload_path: &str) -> Result<File> {
        let upload_path = self.add_upload_prefix(upload_path).await?;
        let local_file = local_file.as_ref();
        let contents = tokio::fs::read(local_file).await?;
        let file_name = local_file
            .file_name()
            .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());
        let sent = json!({
            "fname": local_file.display().to_string(),
            "upload_path": upload_path,
        });
        let form = Form::new()
            .text("upload_path", upload_path)
            .part("fname", Part::bytes(contents).file_name(file_name));
        dispatch::post_form(self, self.inner.links().upload_link_name(), form, sent).await
    }

    async fn add_upload_prefix(&self, upload_path: &str) -> Result<String> {
        let prefix = format!("{}/uploads/", self.username().await?);
        if upload_path.starts_with(&prefix) {
            Ok(upload_path.to_string())
        } else {
            Ok(format!("{prefix}{upload_path}"))
        }
    }

    /// API root URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    /// Links discovered at the API root.
    #[must_use]
    pub fn links(&self) -> &L {
        self.inner.links()
    }

    /// Close the session. Objects produced by this client can no longer make requests.
    pub fn close(&self) -> bool {
        self.inner.close()
    }

    /// Returns true once the session is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl ChrisClient {
    /// Create a user account, without logging in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if the account cannot be created, e.g.
    /// because the username is taken.
    pub async fn create_user(
        url: &str,
        username: &str,
        password: &SecretString,
        email: &str,
    ) -> Result<UserData> {
        let connector = Connector::new(&ClientConfig::new())?;
        let result = Self::create_user_with(&connector, url, username, password, email).await;
        connector.close();
        result
    }

    /// Create a user account using an existing connector, which is left open.
    ///
    /// # Errors
    ///
    /// See [`ChrisClient::create_user`].
    pub async fn create_user_with(
        connector: &Connector,
        url: &str,
        username: &str,
        password: &SecretString,
        email: &str,
    ) -> Result<UserData> {
        let users_url = parse_api_url(url)?.join("users/")?;
        let template = |password: &str| {
            json!({
                "template": {
                    "data": [
                        { "name": "email", "value": email },
                        { "name": "username", "value": username },
                        { "name": "password", "value": password },
                    ]
                }
            })
        };
        debug!(url = %users_url, username, "creating user");
        let session = Session::open(connector.clone(), false, None);
        let request = session
            .request(Method::POST, users_url)?
            .header(CONTENT_TYPE, "application/vnd.collection+json")
            .body(template(password.expose_secret()).to_string());
        let connection = Connection::new(session, MaxRequests::default());
        dispatch::fetch(&connection, request, Some(template("********"))).await
    }
}

impl<L: UserLinks> Linked for AuthenticatedClient<L> {
    const LINK_NAMES: &'static [&'static str] = L::NAMES;
    const SERVES_ROOT: bool = true;
    const ROUTES: &'static [Route] = &[
        Route::new("search_feeds", ROOT_LINK),
        Route::new("search_plugins", "plugins"),
        Route::new("plugin_instances", "plugin_instances"),
        Route::new("search_compute_resources", "compute_resources"),
        Route::new("search_pacsfiles", "pacsfiles"),
        Route::new("user", "user"),
        Route::new("upload_file", USERFILES),
        Route::new("upload_file", UPLOADEDFILES),
    ];

    fn link(&self, name: &str) -> Result<Url> {
        self.inner.link(name)
    }

    fn connection(&self) -> &Connection {
        self.inner.connection()
    }
}

chris_core::assert_routes!(ChrisClient, AuthenticatedClient<AdminCollectionLinks>);
