//! Collection links advertised by the API roots of the ChRIS backend.
//!
//! Which links are present depends on who is asking: anonymous users see the
//! public collections, logged in users also get their own, and administrators
//! additionally get the admin API.

use chris_core::{Error, Result};
use serde::Deserialize;

macro_rules! cube_links {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $extra:ident: $ty:ty,
            )*
        }
        $(validated by $validate:path)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
        pub struct $name {
            /// Information about this ChRIS instance
            pub chrisinstance: String,
            /// Compute resources
            pub compute_resources: String,
            /// Plugin metadata
            pub plugin_metas: String,
            /// Plugins
            pub plugins: String,
            /// Plugin instances
            pub plugin_instances: String,
            /// Pipelines
            pub pipelines: String,
            /// Pipeline instances
            pub pipeline_instances: String,
            /// Workflows
            pub workflows: String,
            /// Tags
            pub tags: String,
            /// Files pushed from a PACS
            pub pacsfiles: String,
            /// Files from other services
            pub servicefiles: String,
            /// File browser
            pub filebrowser: String,
            $(
                $(#[$fmeta])*
                pub $extra: $ty,
            )*
        }

        chris_core::link_set!($name {
            chrisinstance,
            compute_resources,
            plugin_metas,
            plugins,
            plugin_instances,
            pipelines,
            pipeline_instances,
            workflows,
            tags,
            pacsfiles,
            servicefiles,
            filebrowser,
            $($extra,)*
        } $(validated by $validate)?);
    };
}

cube_links! {
    /// Links available without logging in.
    pub struct AnonymousCollectionLinks {}
}

cube_links! {
    /// Links available to a logged in user.
    pub struct CollectionLinks {
        /// The user's own account
        user: String,
        /// Uploaded files, on recent backends
        #[serde(default)]
        userfiles: Option<String>,
        /// Uploaded files, on older backends
        #[serde(default)]
        uploadedfiles: Option<String>,
    }
    validated by CollectionLinks::check_upload_links
}

cube_links! {
    /// Links available to an administrator.
    pub struct AdminCollectionLinks {
        /// The user's own account
        user: String,
        /// Uploaded files, on recent backends
        #[serde(default)]
        userfiles: Option<String>,
        /// Uploaded files, on older backends
        #[serde(default)]
        uploadedfiles: Option<String>,
        /// Root of the admin API, ending with `/chris-admin/api/v1/`
        admin: String,
    }
    validated by AdminCollectionLinks::check_upload_links
}

/// Links of the admin API root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminApiCollectionLinks {
    /// Compute resources
    pub compute_resources: String,
}

chris_core::link_set!(AdminApiCollectionLinks { compute_resources });

/// Name of the upload link on recent backends.
pub const USERFILES: &str = "userfiles";

/// Name of the upload link on older backends.
pub const UPLOADEDFILES: &str = "uploadedfiles";

fn upload_link<'a>(
    userfiles: Option<&'a String>,
    uploadedfiles: Option<&'a String>,
) -> Result<&'a str> {
    match (userfiles, uploadedfiles) {
        (Some(link), None) | (None, Some(link)) => Ok(link.as_str()),
        _ => Err(Error::Deserialize(
            "either userfiles or uploadedfiles link must be present".to_string(),
        )),
    }
}

/// Collection links of a logged in user, with or without admin rights.
pub trait UserLinks: chris_core::LinkSet {
    /// Name of the link where files are uploaded to.
    fn upload_link_name(&self) -> &'static str;

    /// URL where files are uploaded to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialize`] unless exactly one upload link is present.
    fn useruploadedfiles(&self) -> Result<&str>;
}

macro_rules! user_links {
    ($($name:ident),+) => {
        $(
            impl UserLinks for $name {
                fn upload_link_name(&self) -> &'static str {
                    if self.userfiles.is_some() {
                        USERFILES
                    } else {
                        UPLOADEDFILES
                    }
                }

                fn useruploadedfiles(&self) -> Result<&str> {
                    upload_link(self.userfiles.as_ref(), self.uploadedfiles.as_ref())
                }
            }

            impl $name {
                fn check_upload_links(&self) -> Result<()> {
                    self.useruploadedfiles().map(|_| ())
                }
            }
        )+
    };
}

user_links!(CollectionLinks, AdminCollectionLinks);

#[cfg(test)]
mod tests {
    use super::*;
    use chris_core::LinkSet;
    use serde_json::{json, Value};

    fn anonymous() -> Value {
        json!({
            "chrisinstance": "http://cube/api/v1/chrisinstance/1/",
            "compute_resources": "http://cube/api/v1/computeresources/",
            "plugin_metas": "http://cube/api/v1/plugins/metas/",
            "plugins": "http://cube/api/v1/plugins/",
            "plugin_instances": "http://cube/api/v1/plugins/instances/",
            "pipelines": "http://cube/api/v1/pipelines/",
            "pipeline_instances": "http://cube/api/v1/pipelines/instances/",
            "workflows": "http://cube/api/v1/pipelines/workflows/",
            "tags": "http://cube/api/v1/tags/",
            "pacsfiles": "http://cube/api/v1/pacsfiles/",
            "servicefiles": "http://cube/api/v1/servicefiles/",
            "filebrowser": "http://cube/api/v1/filebrowser/",
        })
    }

    fn with(mut links: Value, extra: Value) -> Value {
        if let (Some(links), Some(extra)) = (links.as_object_mut(), extra.as_object()) {
            links.extend(extra.clone());
        }
        links
    }

    #[test]
    fn anonymous_links_ignore_extra_fields() {
        let links: AnonymousCollectionLinks =
            serde_json::from_value(with(anonymous(), json!({"new_thing": "http://x/"})))
                .unwrap();
        assert_eq!(links.get("plugins"), Some("http://cube/api/v1/plugins/"));
        assert_eq!(links.get("user"), None);
        assert_eq!(AnonymousCollectionLinks::NAMES.len(), 12);
    }

    #[test]
    fn user_links_accept_either_upload_link() {
        let recent: CollectionLinks = serde_json::from_value(with(
            anonymous(),
            json!({
                "user": "http://cube/api/v1/users/2/",
                "userfiles": "http://cube/api/v1/userfiles/",
            }),
        ))
        .unwrap();
        assert!(recent.validate().is_ok());
        assert_eq!(recent.upload_link_name(), USERFILES);
        assert!(CollectionLinks::has_field(USERFILES));
        assert_eq!(
            recent.useruploadedfiles().unwrap(),
            "http://cube/api/v1/userfiles/"
        );

        let older: CollectionLinks = serde_json::from_value(with(
            anonymous(),
            json!({
                "user": "http://cube/api/v1/users/2/",
                "uploadedfiles": "http://cube/api/v1/uploadedfiles/",
            }),
        ))
        .unwrap();
        assert!(older.validate().is_ok());
        assert_eq!(older.upload_link_name(), UPLOADEDFILES);
        assert!(AdminCollectionLinks::has_field(UPLOADEDFILES));
    }

    #[test]
    fn user_links_need_exactly_one_upload_link() {
        let neither: CollectionLinks = serde_json::from_value(with(
            anonymous(),
            json!({"user": "http://cube/api/v1/users/2/"}),
        ))
        .unwrap();
        assert!(matches!(neither.validate(), Err(Error::Deserialize(_))));

        let both: AdminCollectionLinks = serde_json::from_value(with(
            anonymous(),
            json!({
                "user": "http://cube/api/v1/users/1/",
                "userfiles": "http://cube/api/v1/userfiles/",
                "uploadedfiles": "http://cube/api/v1/uploadedfiles/",
                "admin": "http://cube/chris-admin/api/v1/",
            }),
        ))
        .unwrap();
        assert!(both.validate().is_err());
    }

    #[test]
    fn admin_links_include_user_links() {
        assert!(AdminCollectionLinks::has_field("admin"));
        assert!(AdminCollectionLinks::has_field("user"));
        assert!(!CollectionLinks::has_field("admin"));
        assert!(AdminApiCollectionLinks::has_field("compute_resources"));
    }
}
