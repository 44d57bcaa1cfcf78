//! Paginated stream for lazy iteration over API results.
//!
//! The eager engine in [`super::http`] aggregates every page before
//! returning. This module provides the lazy alternative: a
//! [`PaginatedStream`] implementing the `Stream` trait that fetches the
//! next page only once the current one is exhausted, following the
//! server's continuation tokens.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::http::PageRequest;
use super::ClientInner;
use crate::{case, Result};

/// One page of raw items as returned by a single HTTP round trip.
#[derive(Debug)]
pub(crate) struct RawPage {
    /// The raw items in this page, in wire key convention.
    pub items: Vec<Value>,
    /// Opaque cursor for the next page, absent on the last page.
    pub continuation_token: Option<String>,
}

/// Type alias for a boxed future used internally.
type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

enum PageState {
    /// First page not yet requested.
    Start,
    /// Next page reachable through this continuation token.
    Next(String),
    /// No more pages.
    Done,
}

/// A stream that lazily fetches pages from a paginated API endpoint.
///
/// The stream yields individual typed items; each raw item is converted
/// to snake_case keys and deserialized on the way out. Fetching stops
/// when a page arrives without a continuation token, with an empty item
/// list, or with an error.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
///
/// # async fn example(client: omnia_rs::OmniaClient) -> omnia_rs::Result<()> {
/// let mut stream = client.time_series().list_stream(None);
///
/// while let Some(result) = stream.next().await {
///     let series = result?;
///     println!("{}: {}", series.id, series.name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PaginatedStream<T> {
    /// Fetch a page by continuation token (`None` for the first page).
    fetch_page:
        Box<dyn Fn(Option<String>) -> BoxFuture<'static, Result<RawPage>> + Send + Sync>,
    /// Raw items of the current page, yielded front to back.
    current_items: Vec<Value>,
    state: PageState,
    /// Current in-flight fetch future.
    pending_fetch: Option<BoxFuture<'static, Result<RawPage>>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> PaginatedStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new<F>(fetch_page: F) -> Self
    where
        F: Fn(Option<String>) -> BoxFuture<'static, Result<RawPage>> + Send + Sync + 'static,
    {
        Self {
            fetch_page: Box::new(fetch_page),
            current_items: Vec::new(),
            state: PageState::Start,
            pending_fetch: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Stream for PaginatedStream<T>
where
    T: DeserializeOwned + Unpin,
{
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            // Yield from the current page first.
            if !this.current_items.is_empty() {
                let item = this.current_items.remove(0);
                let mapped = serde_json::from_value(case::to_snake(item)).map_err(Into::into);
                return Poll::Ready(Some(mapped));
            }

            // Current page exhausted; drive any in-flight fetch.
            if let Some(ref mut fut) = this.pending_fetch {
                match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.pending_fetch = None;
                        this.current_items = page.items;

                        // An empty page ends pagination even if the server
                        // handed out another token.
                        this.state = match page.continuation_token {
                            Some(token) if !this.current_items.is_empty() => {
                                PageState::Next(token)
                            }
                            _ => PageState::Done,
                        };

                        if this.current_items.is_empty() {
                            return Poll::Ready(None);
                        }
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.pending_fetch = None;
                        this.state = PageState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => {
                        return Poll::Pending;
                    }
                }
            }

            // Start the next fetch, if any pages remain.
            let token = match &this.state {
                PageState::Start => None,
                PageState::Next(token) => Some(token.clone()),
                PageState::Done => return Poll::Ready(None),
            };
            this.pending_fetch = Some((this.fetch_page)(token));
        }
    }
}

impl<T> Unpin for PaginatedStream<T> {}

/// Builder for creating paginated streams from a request template.
pub(crate) struct PaginatedStreamBuilder<T> {
    inner: Arc<ClientInner>,
    request: PageRequest,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned + Unpin + Send + 'static> PaginatedStreamBuilder<T> {
    pub(crate) fn new(inner: Arc<ClientInner>, request: PageRequest) -> Self {
        Self {
            inner,
            request,
            _marker: std::marker::PhantomData,
        }
    }

    pub(crate) fn build(self) -> PaginatedStream<T> {
        let inner = self.inner;
        let request = self.request;

        PaginatedStream::new(move |token: Option<String>| {
            let inner = inner.clone();
            let request = request.clone();

            Box::pin(async move { inner.fetch_page(&request, token.as_deref()).await })
        })
    }
}
