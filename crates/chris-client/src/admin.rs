//! Administrator client.
//!
//! Administrators can do everything a normal user can, and can also register
//! plugins and define compute resources. Compute resources are created through
//! a second API root, `/chris-admin/api/v1/`, which is discovered on first use
//! and shares the session of the client.

use crate::authed::AuthenticatedClient;
use crate::links::{AdminApiCollectionLinks, AdminCollectionLinks};
use crate::models::{ComputeResource, Plugin};
use chris_core::dispatch::{self, without_nulls};
use chris_core::link::Route;
use chris_core::{
    check_routes, route_link, ClientBuilder, CollectionClient, Connection, LinkSet, Linked,
    Result, Url,
};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

const ADD_PLUGIN_FILE_NAME: &str = "chris_add_plugin.json";
const REDACTED: &str = "********";

type AdminApiClient = CollectionClient<AdminApiCollectionLinks>;

/// A client with access to `/chris-admin/`.
///
/// Dereferences to the [`AuthenticatedClient`] it extends.
#[derive(Debug, Clone)]
pub struct ChrisAdminClient {
    client: AuthenticatedClient<AdminCollectionLinks>,
    admin_api: Arc<OnceCell<AdminApiClient>>,
}

impl ChrisAdminClient {
    /// Connect to the API root at `url` using an authentication token.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_token`].
    pub async fn from_token(url: impl Into<String>, token: &SecretString) -> Result<Self> {
        Self::from_token_with(ClientBuilder::new(url), token).await
    }

    /// Connect using a configured builder and an authentication token.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_token`].
    pub async fn from_token_with(
        builder: ClientBuilder<AdminCollectionLinks>,
        token: &SecretString,
    ) -> Result<Self> {
        check_routes::<Self>()?;
        AuthenticatedClient::from_token_with(builder, token)
            .await
            .map(Self::new)
    }

    /// Get an authentication token using a username and password, then connect.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_login`].
    pub async fn from_login(
        url: impl Into<String>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self> {
        Self::from_login_with(ClientBuilder::new(url), username, password).await
    }

    /// Get an authentication token using a configured builder, then connect.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::from_login`].
    pub async fn from_login_with(
        builder: ClientBuilder<AdminCollectionLinks>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self> {
        check_routes::<Self>()?;
        AuthenticatedClient::from_login_with(builder, username, password)
            .await
            .map(Self::new)
    }

    fn new(client: AuthenticatedClient<AdminCollectionLinks>) -> Self {
        Self {
            client,
            admin_api: Arc::default(),
        }
    }

    /// Register a plugin from a ChRIS store, e.g.
    /// `https://cube.chrisproject.org/api/v1/plugins/108/`.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn register_plugin_from_store<S: AsRef<str>>(
        &self,
        plugin_store_url: &str,
        compute_names: &[S],
    ) -> Result<Plugin> {
        let body = json!({
            "plugin_store_url": plugin_store_url,
            "compute_names": join_names(compute_names),
        });
        let link = route_link!(ChrisAdminClient, register_plugin_from_store);
        dispatch::post(self, link, &body).await
    }

    /// Add a plugin from its JSON description, as printed by `chris_plugin_info`.
    ///
    /// `compute_names` are names of compute resources, or [`ComputeResource`]s.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn add_plugin<S: AsRef<str>>(
        &self,
        plugin_description: &Value,
        compute_names: &[S],
    ) -> Result<Plugin> {
        let compute_names = join_names(compute_names);
        let sent = json!({
            "fname": ADD_PLUGIN_FILE_NAME,
            "compute_names": compute_names,
        });
        let form = Form::new()
            .part(
                "fname",
                Part::text(plugin_description.to_string()).file_name(ADD_PLUGIN_FILE_NAME),
            )
            .text("compute_names", compute_names);
        let link = route_link!(ChrisAdminClient, add_plugin);
        dispatch::post_form(self, link, form, sent).await
    }

    /// Define a new compute resource.
    ///
    /// Secrets are left out of the payload attached to errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin API cannot be discovered, or the error of the request.
    pub async fn create_compute_resource(
        &self,
        compute_resource: &NewComputeResource,
    ) -> Result<ComputeResource> {
        let admin_api = self.admin_api().await?;
        let url = Url::parse(&admin_api.links().compute_resources)?;
        let sent = compute_resource.to_json(false);
        debug!(%url, data = %sent, "creating compute resource");
        let request = admin_api
            .connection()
            .session()
            .request(Method::POST, url)?
            .json(&compute_resource.to_json(true));
        dispatch::fetch(admin_api.connection(), request, Some(sent)).await
    }

    async fn admin_api(&self) -> Result<&AdminApiClient> {
        self.admin_api
            .get_or_try_init(|| async {
                let url = self.link(route_link!(ChrisAdminClient, create_compute_resource))?;
                CollectionClient::discover(url, self.connection().clone()).await
            })
            .await
    }
}

impl Deref for ChrisAdminClient {
    type Target = AuthenticatedClient<AdminCollectionLinks>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Linked for ChrisAdminClient {
    const LINK_NAMES: &'static [&'static str] = AdminCollectionLinks::NAMES;
    const SERVES_ROOT: bool = true;
    const ROUTES: &'static [Route] = &[
        Route::new("register_plugin_from_store", "admin"),
        Route::new("add_plugin", "admin"),
        Route::new("create_compute_resource", "admin"),
    ];

    fn link(&self, name: &str) -> Result<Url> {
        self.client.link(name)
    }

    fn connection(&self) -> &Connection {
        self.client.connection()
    }
}

chris_core::assert_routes!(ChrisAdminClient);

fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// Definition of a compute resource to create.
#[derive(Debug, Clone)]
pub struct NewComputeResource {
    /// Unique name
    pub name: String,
    /// URL of the pfcon service
    pub compute_url: String,
    /// pfcon username
    pub compute_user: String,
    /// pfcon password
    pub compute_password: SecretString,
    /// Description
    pub description: Option<String>,
    /// URL used to authenticate with pfcon
    pub compute_auth_url: Option<String>,
    /// pfcon token, used instead of the password when given
    pub compute_auth_token: Option<SecretString>,
    /// Maximum run time of a plugin instance, in seconds
    pub max_job_exec_seconds: Option<i64>,
}

impl NewComputeResource {
    /// Describe a compute resource served by pfcon at `compute_url`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        compute_url: impl Into<String>,
        compute_user: impl Into<String>,
        compute_password: SecretString,
    ) -> Self {
        Self {
            name: name.into(),
            compute_url: compute_url.into(),
            compute_user: compute_user.into(),
            compute_password,
            description: None,
            compute_auth_url: None,
            compute_auth_token: None,
            max_job_exec_seconds: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the authentication URL.
    #[must_use]
    pub fn with_compute_auth_url(mut self, url: impl Into<String>) -> Self {
        self.compute_auth_url = Some(url.into());
        self
    }

    /// Set the authentication token.
    #[must_use]
    pub fn with_compute_auth_token(mut self, token: SecretString) -> Self {
        self.compute_auth_token = Some(token);
        self
    }

    /// Set the maximum run time of plugin instances.
    #[must_use]
    pub fn with_max_job_exec_seconds(mut self, seconds: i64) -> Self {
        self.max_job_exec_seconds = Some(seconds);
        self
    }

    fn to_json(&self, expose_secrets: bool) -> Value {
        let secret = |s: &SecretString| {
            if expose_secrets {
                s.expose_secret().to_string()
            } else {
                REDACTED.to_string()
            }
        };
        without_nulls(json!({
            "name": self.name,
            "compute_url": self.compute_url,
            "compute_user": self.compute_user,
            "compute_password": secret(&self.compute_password),
            "description": self.description,
            "compute_auth_url": self.compute_auth_url,
            "compute_auth_token": self.compute_auth_token.as_ref().map(secret),
            "max_job_exec_seconds": self.max_job_exec_seconds,
        }))
    }
}
