//! Lazy sequences over cursor-paginated list endpoints.
//!
//! A [`PaginatedSequence`] presents a remote list as one sequence and only
//! fetches the next page when a caller needs an item that has not been
//! fetched yet. Fetched pages are kept for the lifetime of the sequence,
//! so indexing into an already-fetched prefix never hits the network.
//!
//! The sequence is a small state machine:
//!
//! - `Unfetched`: nothing requested yet.
//! - `Open`: at least one page fetched and the server reported more,
//!   with the cursor to continue from.
//! - `Exhausted`: the last page has been seen.
//!
//! Forward iteration is not restartable. Iterating a second time from
//! the start means building a new sequence.

use std::marker::PhantomData;

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{Page, PageRequest, PageSource};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SequenceState {
    Unfetched,
    Open { next_cursor: String },
    Exhausted,
}

/// A lazily fetched, cursor-paginated list of `T`.
pub struct PaginatedSequence<'a, S: PageSource + ?Sized, T = Value> {
    source: &'a S,
    request: PageRequest,
    state: SequenceState,
    items: Vec<T>,
    pages_fetched: usize,
    /// Position of forward iteration.
    position: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, S, T> PaginatedSequence<'a, S, T>
where
    S: PageSource + ?Sized,
    T: DeserializeOwned + Clone + Send,
{
    /// Create a sequence that issues `request` against `source`.
    ///
    /// Nothing is fetched until the sequence is first accessed.
    pub fn new(source: &'a S, request: PageRequest) -> Self {
        Self {
            source,
            request,
            state: SequenceState::Unfetched,
            items: Vec::new(),
            pages_fetched: 0,
            position: 0,
            _marker: PhantomData,
        }
    }

    /// Create a sequence whose first page was already fetched by the caller.
    pub fn with_first_page(source: &'a S, request: PageRequest, page: Page) -> DomainResult<Self> {
        let mut sequence = Self::new(source, request);
        sequence.ingest(page)?;
        Ok(sequence)
    }

    /// Whether the server may hold further items.
    ///
    /// Fetches the first page when nothing has been fetched yet.
    pub async fn has_more(&mut self) -> DomainResult<bool> {
        if self.state == SequenceState::Unfetched {
            self.fetch_next().await?;
        }
        Ok(matches!(self.state, SequenceState::Open { .. }))
    }

    /// Fetch the next page and return the newly appended items.
    ///
    /// Past the last page this returns an empty slice and the sequence
    /// stays exhausted.
    pub async fn fetch_next(&mut self) -> DomainResult<&[T]> {
        let cursor = match &self.state {
            SequenceState::Exhausted => {
                tracing::debug!(path = %self.request.path, "fetch past last page ignored");
                return Ok(&[]);
            }
            SequenceState::Unfetched => None,
            SequenceState::Open { next_cursor } => Some(next_cursor.clone()),
        };

        tracing::debug!(
            path = %self.request.path,
            page = self.pages_fetched + 1,
            cursor = ?cursor,
            "fetching page"
        );
        let page = self
            .source
            .fetch_page(&self.request, cursor.as_deref())
            .await?;

        let start = self.items.len();
        self.ingest(page)?;
        Ok(&self.items[start..])
    }

    fn ingest(&mut self, page: Page) -> DomainResult<()> {
        let decoded = page
            .results
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<Result<Vec<_>, _>>()?;
        self.items.extend(decoded);
        self.pages_fetched += 1;

        self.state = match (page.has_more, page.next_cursor) {
            (true, Some(next_cursor)) => SequenceState::Open { next_cursor },
            (true, None) => {
                tracing::warn!(
                    path = %self.request.path,
                    "page reported more results without a cursor; treating as last page"
                );
                SequenceState::Exhausted
            }
            (false, _) => SequenceState::Exhausted,
        };
        Ok(())
    }

    /// Fetch pages until `index` is covered or the list is exhausted.
    ///
    /// Returns whether `index` is now available.
    async fn fetch_to(&mut self, index: usize) -> DomainResult<bool> {
        while self.items.len() <= index && self.state != SequenceState::Exhausted {
            self.fetch_next().await?;
        }
        Ok(index < self.items.len())
    }

    /// Item at `index`, fetching pages as needed.
    pub async fn get(&mut self, index: usize) -> DomainResult<&T> {
        if self.fetch_to(index).await? {
            Ok(&self.items[index])
        } else {
            Err(DomainError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }

    /// Lazy view over `start..stop` (open-ended when `stop` is `None`)
    /// taking every `step`-th item.
    pub fn slice(
        &mut self,
        start: usize,
        stop: Option<usize>,
        step: usize,
    ) -> DomainResult<PaginatedSlice<'_, 'a, S, T>> {
        if step == 0 {
            return Err(DomainError::ValidationFailed(
                "slice step cannot be zero".to_string(),
            ));
        }
        Ok(PaginatedSlice {
            parent: self,
            index: start,
            stop,
            step,
        })
    }

    /// Next item of forward iteration.
    ///
    /// Yields already-fetched items first, then fetches further pages in
    /// order. Returns `None` once the list is exhausted.
    pub async fn next(&mut self) -> DomainResult<Option<T>> {
        if !self.fetch_to(self.position).await? {
            return Ok(None);
        }
        let item = self.items[self.position].clone();
        self.position += 1;
        Ok(Some(item))
    }

    /// Consume the sequence into a stream of items.
    pub fn into_stream(self) -> impl Stream<Item = DomainResult<T>> + 'a
    where
        T: 'a,
    {
        stream::try_unfold(self, |mut sequence| async move {
            let item = sequence.next().await?;
            Ok::<_, DomainError>(item.map(|item| (item, sequence)))
        })
    }

    /// Drain every remaining page and return all items.
    pub async fn collect_all(mut self) -> DomainResult<Vec<T>> {
        while self.has_more().await? {
            self.fetch_next().await?;
        }
        Ok(self.items)
    }

    /// Items fetched so far.
    pub fn fetched(&self) -> &[T] {
        &self.items
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == SequenceState::Exhausted
    }
}

/// Lazy `start:stop:step` view over a [`PaginatedSequence`].
///
/// Pulls pages from the parent only as the view advances and stops at
/// `stop` without exhausting the parent.
pub struct PaginatedSlice<'p, 'a, S: PageSource + ?Sized, T> {
    parent: &'p mut PaginatedSequence<'a, S, T>,
    index: usize,
    stop: Option<usize>,
    step: usize,
}

impl<S, T> PaginatedSlice<'_, '_, S, T>
where
    S: PageSource + ?Sized,
    T: DeserializeOwned + Clone + Send,
{
    /// Next item of the view, or `None` at `stop` or the end of the list.
    pub async fn next(&mut self) -> DomainResult<Option<T>> {
        if self.stop.is_some_and(|stop| self.index >= stop) {
            return Ok(None);
        }
        if !self.parent.fetch_to(self.index).await? {
            return Ok(None);
        }
        let item = self.parent.items[self.index].clone();
        self.index += self.step;
        Ok(Some(item))
    }

    /// Drain the view.
    pub async fn collect(mut self) -> DomainResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }
}
