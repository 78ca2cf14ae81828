//! Hypermedia deserializer.
//!
//! Construction has two phases: the structural fields of a response are parsed into a
//! plain value first, then types able to make further linked requests are wrapped
//! together with the caller's [`Connection`]. The session and pagination budget never
//! appear in the wire payload.

use crate::connection::Connection;
use crate::{Error, Result};
use serde::de::DeserializeOwned;

pub use serde_json::Value;

/// A type which can be produced from a JSON response body.
pub trait FromLinked: Sized {
    /// Whether a response body is read at all. `()` sets this to false.
    const EXPECTS_BODY: bool = true;

    /// Build a value from a JSON body, connecting it to `connection` if it
    /// makes further requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialize`] if the JSON does not have the expected shape.
    fn from_linked(connection: &Connection, value: Value) -> Result<Self>;
}

impl FromLinked for () {
    const EXPECTS_BODY: bool = false;

    fn from_linked(_: &Connection, _: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromLinked for Value {
    fn from_linked(_: &Connection, value: Value) -> Result<Self> {
        Ok(value)
    }
}

/// Deserialize the structural fields of `T`. Unknown fields are ignored.
///
/// # Errors
///
/// Returns [`Error::Deserialize`] on a missing field or type mismatch.
pub fn structural<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        Error::Deserialize(format!("{}: {e}", std::any::type_name::<T>()))
    })
}

/// Implement [`FromLinked`] for plain records which make no requests.
#[macro_export]
macro_rules! plain_model {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::de::FromLinked for $ty {
                fn from_linked(
                    _: &$crate::Connection,
                    value: $crate::de::Value,
                ) -> $crate::Result<Self> {
                    $crate::de::structural(value)
                }
            }
        )+
    };
}

/// Define a connected model: a record of type `$data` bound to the [`Connection`]
/// it was received on. The listed routes name the methods of the model and the
/// field of `$data` holding the URL each one requests; `$data` must implement
/// [`LinkSet`](crate::LinkSet) over its URL fields. Method bodies get their
/// link with [`route_link!`](crate::route_link).
///
/// ```ignore
/// connected_model! {
///     /// A feed.
///     pub struct Feed(FeedData) {
///         get_note => "note",
///         delete => "url",
///     }
/// }
/// ```
#[macro_export]
macro_rules! connected_model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($data:ty) {
            $($method:ident => $link:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            data: $data,
            connection: $crate::Connection,
        }

        impl $name {
            /// The structural fields of this object.
            #[must_use]
            pub fn data(&self) -> &$data {
                &self.data
            }

            /// Discard the connection, keeping the structural fields.
            #[must_use]
            pub fn into_data(self) -> $data {
                self.data
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $data;

            fn deref(&self) -> &$data {
                &self.data
            }
        }

        impl $crate::de::FromLinked for $name {
            fn from_linked(
                connection: &$crate::Connection,
                value: $crate::de::Value,
            ) -> $crate::Result<Self> {
                let data: $data = $crate::de::structural(value)?;
                Ok(Self {
                    data,
                    connection: connection.clone(),
                })
            }
        }

        impl $crate::link::Linked for $name {
            const LINK_NAMES: &'static [&'static str] =
                <$data as $crate::link::LinkSet>::NAMES;
            const ROUTES: &'static [$crate::link::Route] =
                &[$($crate::link::Route::new(stringify!($method), $link)),*];

            fn link(&self, name: &str) -> $crate::Result<$crate::Url> {
                $crate::link::resolve(&self.data, stringify!($name), name)
            }

            fn connection(&self) -> &$crate::Connection {
                &self.connection
            }
        }

        $crate::assert_routes!($name);
    };
}
