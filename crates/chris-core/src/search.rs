//! Lazy paginated collections.
//!
//! A [`Search`] describes a filtered query of a collection. Building one makes no
//! request; iterating it fetches pages one at a time, following the `next` URL of
//! each page only once the previous page's items were consumed.

use crate::config::MaxRequests;
use crate::connection::Connection;
use crate::de::{FromLinked, Value};
use crate::dispatch;
use crate::query::QueryParams;
use crate::{Error, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Method;
use serde::Deserialize;
use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::debug;
use url::Url;

/// Subpath of a collection URL where its search endpoint lives.
pub const DEFAULT_SEARCH_SUBPATH: &str = "search/";

/// Body of a paginated endpoint response.
#[derive(Debug, Deserialize)]
struct Paginated {
    count: u64,
    next: Option<String>,
    results: Vec<Value>,
}

crate::plain_model!(Paginated);

/// A deferred, replayable search of a collection yielding items of type `T`.
pub struct Search<T> {
    connection: Connection,
    url: Url,
    first_url: Url,
    item: PhantomData<fn() -> T>,
}

impl<T> Clone for Search<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            url: self.url.clone(),
            first_url: self.first_url.clone(),
            item: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Search<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("url", &self.url.as_str())
            .field("max_requests", &self.connection.max_search_requests())
            .finish_non_exhaustive()
    }
}

impl<T> Search<T> {
    /// Describe a search of the collection at `base_url`.
    ///
    /// The search URL is `base_url` joined with `subpath`, with the non-empty
    /// `query` appended. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `subpath` cannot be joined to `base_url`.
    pub fn new(
        connection: Connection,
        mut base_url: Url,
        subpath: &str,
        query: QueryParams,
    ) -> Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let search_url = base_url.join(subpath)?;
        let first_query = query.clone().set("limit", 1).set("offset", 0);
        Ok(Self {
            url: with_query(search_url.clone(), &query),
            first_url: with_query(search_url, &first_query),
            connection,
            item: PhantomData,
        })
    }

    /// Search URL, including the caller's query.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Number of items in the collection, from a single request for one item.
    ///
    /// # Errors
    ///
    /// Returns a status, transport or structural error from the request.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.first_page().await?.count)
    }

    async fn first_page(&self) -> Result<Paginated> {
        debug!(url = %self.first_url, "fetching first search result");
        let request = self
            .connection
            .session()
            .request(Method::GET, self.first_url.clone())?;
        dispatch::fetch(&self.connection, request, None).await
    }
}

impl<T: FromLinked> Search<T> {
    /// The first item, if any.
    ///
    /// `limit` and `offset` are forced to `1` and `0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooMuchPagination`] if the pagination budget is zero, or
    /// a status, transport or structural error from the request.
    pub async fn first(&self) -> Result<Option<T>> {
        if self.connection.max_search_requests().is_exhausted() {
            return Err(Error::TooMuchPagination {
                url: self.first_url.to_string(),
            });
        }
        let page = self.first_page().await?;
        page.results
            .into_iter()
            .next()
            .map(|item| T::from_linked(&self.connection, item))
            .transpose()
    }

    /// The only item of a search expected to have exactly one result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoneSearch`] if the search is empty, [`Error::ManySearch`]
    /// if it has more than one result, or [`Error::NonsenseResponse`] if the
    /// backend reports results without returning any.
    pub async fn get_only(&self) -> Result<T> {
        self.only(false).await
    }

    /// Like [`Search::get_only`], returning the first item when there are several.
    ///
    /// # Errors
    ///
    /// See [`Search::get_only`], except that several results are not an error.
    pub async fn get_only_allowing_many(&self) -> Result<T> {
        self.only(true).await
    }

    async fn only(&self, allow_many: bool) -> Result<T> {
        let page = self.first_page().await?;
        let count = page.count;
        if count == 0 {
            return Err(Error::NoneSearch {
                url: self.url.to_string(),
            });
        }
        // A count without results is inconsistent, however many are claimed.
        let item = page.results.into_iter().next().ok_or_else(|| {
            Error::NonsenseResponse(format!(
                "{} reports count={count} but the results are empty",
                self.first_url
            ))
        })?;
        if count > 1 && !allow_many {
            return Err(Error::ManySearch {
                url: self.url.to_string(),
                count,
            });
        }
        T::from_linked(&self.connection, item)
    }
}

impl<T: FromLinked + Send + 'static> Search<T> {
    /// Iterate over every item, fetching pages as they are needed.
    ///
    /// Each call starts over from the first page. The stream fails with
    /// [`Error::TooMuchPagination`] when a further page is needed and the
    /// pagination budget is spent.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, Result<T>> {
        let pager = Pager {
            connection: self.connection.clone(),
            items: VecDeque::new(),
            next: Some(self.url.to_string()),
            remaining: self.connection.max_search_requests(),
        };
        stream::try_unfold(pager, next_item::<T>).boxed()
    }

    /// Collect every item into a vector. Only sensible for small collections.
    ///
    /// # Errors
    ///
    /// Returns the first error met while paginating.
    pub async fn collect_all(&self) -> Result<Vec<T>> {
        self.stream().try_collect().await
    }
}

struct Pager {
    connection: Connection,
    items: VecDeque<Value>,
    next: Option<String>,
    remaining: MaxRequests,
}

async fn next_item<T: FromLinked>(mut pager: Pager) -> Result<Option<(T, Pager)>> {
    loop {
        if let Some(item) = pager.items.pop_front() {
            let item = T::from_linked(&pager.connection, item)?;
            return Ok(Some((item, pager)));
        }
        let Some(url) = pager.next.take() else {
            return Ok(None);
        };
        if pager.remaining.is_exhausted() {
            return Err(Error::TooMuchPagination { url });
        }
        debug!(%url, remaining = ?pager.remaining, "fetching search page");
        pager.remaining = pager.remaining.decrement();
        let request = pager.connection.session().request(Method::GET, url.as_str())?;
        let page: Paginated = dispatch::fetch(&pager.connection, request, None).await?;
        pager.items = page.results.into();
        pager.next = page.next;
    }
}

fn with_query(mut url: Url, query: &QueryParams) -> Url {
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    url
}
