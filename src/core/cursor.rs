//! Purpose: Page through a streaming query with bounded pages and an opaque bookmark.
//! Exports: `PaginatedCursor`, `PageSource`, `PageRequest`, `Page`, `QueryState`.
//! Role: Runs one `RecordStream` per page and threads the producer's bookmark to the next page.
//! Invariants: Pages are strictly sequential; page N ends before page N+1 is requested.
//! Invariants: A short page, or a full page without a bookmark, exhausts the cursor.
//! Invariants: Bookmark bytes are passed back verbatim and never inspected.
use super::error::{Error, ErrorKind};
use super::stream::{RecordStream, StreamEvent, StreamIntake};
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Resume point for a paginated query, stamped with the query it belongs to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryState {
    scope: Arc<str>,
    bookmark: Bytes,
}

impl QueryState {
    pub fn new(scope: impl Into<Arc<str>>, bookmark: Bytes) -> Self {
        Self {
            scope: scope.into(),
            bookmark,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn bookmark(&self) -> &Bytes {
        &self.bookmark
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub max_records: u32,
    pub bookmark: Option<Bytes>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Producer of one bounded page at a time.
pub trait PageSource {
    type Item: Send;

    /// Identity of the query; bookmarks from other scopes are rejected.
    fn scope(&self) -> &str;

    /// Stream at most `request.max_records` items into `intake`, then end with the next bookmark.
    fn fetch_page(
        &self,
        request: PageRequest,
        intake: StreamIntake<Self::Item>,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

pub struct PaginatedCursor<S: PageSource> {
    source: S,
    max_records: u32,
    state: Option<QueryState>,
    exhausted: bool,
    pages: u64,
}

impl<S: PageSource> PaginatedCursor<S> {
    pub fn new(source: S, max_records: u32) -> Result<Self, Error> {
        if max_records == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("max records per page must be greater than zero"));
        }
        Ok(Self {
            source,
            max_records,
            state: None,
            exhausted: false,
            pages: 0,
        })
    }

    /// Resume from a state saved by an earlier cursor over the same query.
    pub fn with_state(mut self, state: QueryState) -> Result<Self, Error> {
        if state.scope() != self.source.scope() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("query state belongs to a different query")
                .with_hint(format!(
                    "state was saved for '{}', cursor runs '{}'",
                    state.scope(),
                    self.source.scope()
                )));
        }
        self.state = Some(state);
        Ok(self)
    }

    pub fn max_records(&self) -> u32 {
        self.max_records
    }

    pub fn has_next_page(&self) -> bool {
        !self.exhausted
    }

    pub fn query_state(&self) -> Option<&QueryState> {
        self.state.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn next_page(&mut self) -> Result<Page<S::Item>, Error> {
        if self.exhausted {
            return Ok(Page {
                items: Vec::new(),
                has_more: false,
            });
        }

        let request = PageRequest {
            max_records: self.max_records,
            bookmark: self.state.as_ref().map(|state| state.bookmark().clone()),
        };
        let (stream, intake) = RecordStream::channel();
        let (produced, consumed) =
            tokio::join!(self.source.fetch_page(request, intake), drain_page(stream));
        produced?;
        let (items, bookmark) = consumed?;

        self.pages += 1;
        let full = items.len() >= self.max_records as usize;
        let has_more = match bookmark {
            Some(bookmark) if full && !bookmark.is_empty() => {
                self.state = Some(QueryState::new(self.source.scope(), bookmark));
                true
            }
            _ => {
                self.state = None;
                self.exhausted = true;
                false
            }
        };
        debug!(
            page = self.pages,
            records = items.len(),
            has_more,
            "fetched query page"
        );
        Ok(Page { items, has_more })
    }

    /// Drain every remaining page into one flat list.
    pub async fn results(&mut self) -> Result<Vec<S::Item>, Error> {
        let mut items = Vec::new();
        while self.has_next_page() {
            let page = self.next_page().await?;
            items.extend(page.items);
        }
        Ok(items)
    }
}

async fn drain_page<T>(mut stream: RecordStream<T>) -> Result<(Vec<T>, Option<Bytes>), Error> {
    let mut items = Vec::new();
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Data(item) => items.push(item),
            StreamEvent::Error(err) => {
                stream.abort();
                return Err(err);
            }
            StreamEvent::End(bookmark) => return Ok((items, bookmark)),
        }
    }
    Ok((items, None))
}
