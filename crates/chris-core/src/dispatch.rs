//! Request dispatcher: HTTP requests to links resolved at call time.
//!
//! Arguments are serialized, `null` members are dropped, and the response is
//! deserialized into the caller's declared return type through [`FromLinked`].
//! Nothing is retried.

use crate::connection::Connection;
use crate::de::{FromLinked, Value};
use crate::link::Linked;
use crate::query::QueryParams;
use crate::search::Search;
use crate::{Error, Result};
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

/// GET a link, sending `query` as the querystring.
///
/// # Errors
///
/// Returns a status error for responses of 400 and above, [`Error::Deserialize`]
/// if the body does not fit `R`, or a link resolution or transport error.
pub async fn get<O, R>(owner: &O, link: &str, query: &QueryParams) -> Result<R>
where
    O: Linked,
    R: FromLinked,
{
    let url = owner.link(link)?;
    debug!(method = "GET", %url, ?query, "linked request");
    let request = owner
        .connection()
        .session()
        .request(Method::GET, url)?
        .query(&query.iter().collect::<Vec<_>>());
    let sent = (!query.is_empty()).then(|| query.to_json());
    fetch(owner.connection(), request, sent).await
}

/// POST `body` as JSON to a link.
///
/// # Errors
///
/// See [`get`].
pub async fn post<O, B, R>(owner: &O, link: &str, body: &B) -> Result<R>
where
    O: Linked,
    B: Serialize + ?Sized,
    R: FromLinked,
{
    send_json(owner, Method::POST, link, body).await
}

/// PUT `body` as JSON to a link.
///
/// # Errors
///
/// See [`get`].
pub async fn put<O, B, R>(owner: &O, link: &str, body: &B) -> Result<R>
where
    O: Linked,
    B: Serialize + ?Sized,
    R: FromLinked,
{
    send_json(owner, Method::PUT, link, body).await
}

/// DELETE a link. The response body is not read.
///
/// # Errors
///
/// See [`get`].
pub async fn delete<O: Linked>(owner: &O, link: &str) -> Result<()> {
    let url = owner.link(link)?;
    debug!(method = "DELETE", %url, "linked request");
    let request = owner.connection().session().request(Method::DELETE, url)?;
    fetch(owner.connection(), request, None).await
}

/// POST a `multipart/form-data` body to a link.
///
/// `sent` describes the form for error reports.
///
/// # Errors
///
/// See [`get`].
pub async fn post_form<O, R>(owner: &O, link: &str, form: Form, sent: Value) -> Result<R>
where
    O: Linked,
    R: FromLinked,
{
    let url = owner.link(link)?;
    debug!(method = "POST", %url, data = %sent, "linked multipart request");
    let request = owner
        .connection()
        .session()
        .request(Method::POST, url)?
        .multipart(form);
    fetch(owner.connection(), request, Some(sent)).await
}

/// Describe a search of the collection behind a link. No request is made.
///
/// # Errors
///
/// Returns an error if the link cannot be resolved.
pub fn search<O, T>(owner: &O, link: &str, subpath: &str, query: QueryParams) -> Result<Search<T>>
where
    O: Linked,
{
    let base_url = owner.link(link)?;
    Search::new(owner.connection().clone(), base_url, subpath, query)
}

async fn send_json<O, B, R>(owner: &O, method: Method, link: &str, body: &B) -> Result<R>
where
    O: Linked,
    B: Serialize + ?Sized,
    R: FromLinked,
{
    let url = owner.link(link)?;
    let data = without_nulls(serde_json::to_value(body)?);
    debug!(%method, %url, %data, "linked request");
    let request = owner
        .connection()
        .session()
        .request(method, url)?
        .json(&data);
    fetch(owner.connection(), request, Some(data)).await
}

/// Send a prepared request and deserialize the response into `R`.
///
/// `sent` is attached to status errors.
///
/// # Errors
///
/// See [`get`].
pub async fn fetch<R: FromLinked>(
    connection: &Connection,
    request: RequestBuilder,
    sent: Option<Value>,
) -> Result<R> {
    let response = check_status(request.send().await?, sent).await?;
    if !R::EXPECTS_BODY {
        return R::from_linked(connection, Value::Null);
    }
    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::Deserialize(format!("response is not JSON: {e}")))?;
    R::from_linked(connection, body)
}

/// Turn a response with a status of 400 or above into an error.
///
/// The body is kept when it is JSON.
///
/// # Errors
///
/// Returns [`Error::Unauthorized`], [`Error::BadRequest`] or [`Error::InternalServer`].
pub async fn check_status(response: Response, sent: Option<Value>) -> Result<Response> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    let url = response.url().to_string();
    let message = response.json::<Value>().await.ok();
    Err(Error::from_status(status, url, message, sent)
        .unwrap_or_else(|| Error::Http(format!("unexpected status {status}"))))
}

/// Drop the `null` members of a JSON object. Other values are returned as is.
#[must_use]
pub fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            Value::Object(object.into_iter().filter(|(_, v)| !v.is_null()).collect())
        }
        other => other,
    }
}
