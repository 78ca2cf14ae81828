//! Link registry: typed mappings from link names to URLs.
//!
//! URLs of API endpoints come from the API itself. A [`LinkSet`] is a record whose
//! fields are named slots holding URLs, either the `collection_links` of an API root
//! or the URL-valued fields of a resource. A [`Linked`] type resolves link names to
//! URLs at call time and declares, in [`Linked::ROUTES`], which link each of its
//! request-making methods depends on.

use crate::connection::Connection;
use crate::{Error, Result};
use url::Url;

/// Link name which always refers to a client's own API root URL.
pub const ROOT_LINK: &str = ".";

/// A record of named URL slots.
pub trait LinkSet {
    /// Every link name this record can hold, present or not.
    const NAMES: &'static [&'static str];

    /// URL held by the named slot, if the slot exists and is filled.
    fn get(&self, name: &str) -> Option<&str>;

    /// Check invariants which span several slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialize`] when the record is not acceptable.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Returns true if `name` is one of [`LinkSet::NAMES`].
    fn has_field(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }
}

/// A field which may hold a link.
pub trait AsLink {
    /// The URL, if present.
    fn as_link(&self) -> Option<&str>;
}

impl AsLink for String {
    fn as_link(&self) -> Option<&str> {
        Some(self)
    }
}

impl AsLink for Option<String> {
    fn as_link(&self) -> Option<&str> {
        self.as_deref()
    }
}

impl AsLink for Url {
    fn as_link(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl AsLink for Option<Url> {
    fn as_link(&self) -> Option<&str> {
        self.as_ref().map(Url::as_str)
    }
}

/// A request-making method and the link it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Method name
    pub method: &'static str,
    /// Link name
    pub link: &'static str,
}

impl Route {
    /// Declare that `method` needs `link`.
    #[must_use]
    pub const fn new(method: &'static str, link: &'static str) -> Self {
        Self { method, link }
    }
}

/// An object which makes HTTP requests to links from an API.
pub trait Linked {
    /// Link names this type can resolve.
    const LINK_NAMES: &'static [&'static str];

    /// Whether [`ROOT_LINK`] resolves to this type's API root.
    const SERVES_ROOT: bool = false;

    /// Request-making methods of this type and the links they need.
    const ROUTES: &'static [Route] = &[];

    /// Returns true if this type can resolve `name`.
    fn has_link(name: &str) -> bool {
        (Self::SERVES_ROOT && name == ROOT_LINK) || Self::LINK_NAMES.contains(&name)
    }

    /// Resolve a link name to a URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLink`] if this instance has no URL for the link.
    fn link(&self, name: &str) -> Result<Url>;

    /// Session and pagination budget used for requests made by this object.
    fn connection(&self) -> &Connection;
}

/// Check that every route of `T` needs a link `T` declares.
///
/// # Errors
///
/// Returns [`Error::UndefinedLink`] naming the first offending method and link.
pub fn check_routes<T: Linked>() -> Result<()> {
    match T::ROUTES.iter().find(|route| !T::has_link(route.link)) {
        Some(route) => Err(Error::UndefinedLink {
            owner: std::any::type_name::<T>(),
            method: route.method,
            link: route.link,
        }),
        None => Ok(()),
    }
}

/// Compile-time counterpart of [`check_routes`], used by [`assert_routes!`](crate::assert_routes).
#[must_use]
pub const fn routes_declared(routes: &[Route], names: &[&str], serves_root: bool) -> bool {
    let mut i = 0;
    while i < routes.len() {
        let link = routes[i].link;
        if !((serves_root && str_eq(link, ROOT_LINK)) || contains(names, link)) {
            return false;
        }
        i += 1;
    }
    true
}

/// Link `method` needs, according to `routes`.
///
/// # Panics
///
/// Panics if `method` has no route. Through [`route_link!`](crate::route_link)
/// this happens at compile time.
#[must_use]
pub const fn route_link(routes: &[Route], method: &str) -> &'static str {
    let mut i = 0;
    while i < routes.len() {
        if str_eq(routes[i].method, method) {
            return routes[i].link;
        }
        i += 1;
    }
    panic!("method has no route")
}

const fn contains(names: &[&str], name: &str) -> bool {
    let mut i = 0;
    while i < names.len() {
        if str_eq(names[i], name) {
            return true;
        }
        i += 1;
    }
    false
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Resolve `name` from a link set, as a URL.
///
/// # Errors
///
/// Returns [`Error::MissingLink`] if the slot is absent or empty, or
/// [`Error::InvalidUrl`] if it does not hold a URL.
pub fn resolve<S: LinkSet + ?Sized>(links: &S, owner: &'static str, name: &str) -> Result<Url> {
    let link = links.get(name).ok_or_else(|| Error::MissingLink {
        owner,
        link: name.to_string(),
    })?;
    Url::parse(link).map_err(|e| Error::InvalidUrl(format!("link \"{name}\" ({link}): {e}")))
}

/// Fail the build if a type's routes need links it does not declare.
#[macro_export]
macro_rules! assert_routes {
    ($($owner:ty),+ $(,)?) => {
        $(
            const _: () = assert!(
                $crate::link::routes_declared(
                    <$owner as $crate::link::Linked>::ROUTES,
                    <$owner as $crate::link::Linked>::LINK_NAMES,
                    <$owner as $crate::link::Linked>::SERVES_ROOT,
                ),
                concat!("a method of ", stringify!($owner), " needs a link it does not have"),
            );
        )+
    };
}

/// The link a method of `$owner` requests, taken from its [`Linked::ROUTES`].
///
/// Request-making methods pass this to [`dispatch`](crate::dispatch) instead of
/// a link name of their own, so the link they send is the link the route table
/// declares and [`assert_routes!`](crate::assert_routes) checks. A method
/// without a route fails the build.
#[macro_export]
macro_rules! route_link {
    ($owner:ty, $method:ident) => {{
        const LINK: &str = $crate::link::route_link(
            <$owner as $crate::link::Linked>::ROUTES,
            stringify!($method),
        );
        LINK
    }};
}

/// Implement [`LinkSet`] for a struct whose listed fields hold URLs.
///
/// An optional `validated by path` clause names a `fn(&Self) -> Result<()>`
/// used as [`LinkSet::validate`].
#[macro_export]
macro_rules! link_set {
    ($ty:ty { $($field:ident),* $(,)? } $(validated by $validate:path)?) => {
        impl $crate::link::LinkSet for $ty {
            const NAMES: &'static [&'static str] = &[$(stringify!($field)),*];

            fn get(&self, name: &str) -> ::std::option::Option<&str> {
                match name {
                    $(stringify!($field) => $crate::link::AsLink::as_link(&self.$field),)*
                    _ => ::std::option::Option::None,
                }
            }

            $(
                fn validate(&self) -> $crate::Result<()> {
                    $validate(self)
                }
            )?
        }
    };
}
