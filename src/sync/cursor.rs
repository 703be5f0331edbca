//! Pagination cursor engine
//!
//! Drives `Store::list_objects` page by page until the listing is exhausted,
//! stopping early when a backend hands back the cursor it was given.

use crate::error::Result;
use crate::storage::Store;
use crate::types::ObjectPage;

/// How listing continues after a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// More pages follow
    More,
    /// Terminal page reported by the backend
    Last,
    /// Cursor did not advance; treated as terminal
    Stalled,
}

impl PageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PageStatus::More)
    }
}

/// Cursor over the pages of one container listing
pub struct ListingCursor<'a> {
    store: &'a dyn Store,
    container: &'a str,
    prefix: &'a str,
    cursor: String,
    finished: bool,
}

impl<'a> ListingCursor<'a> {
    /// Start a listing from the beginning of the container
    pub fn new(store: &'a dyn Store, container: &'a str, prefix: &'a str) -> Self {
        Self {
            store,
            container,
            prefix,
            cursor: String::new(),
            finished: false,
        }
    }

    /// The cursor the next listing call will use
    pub fn position(&self) -> &str {
        &self.cursor
    }

    /// Fetch the next page, or `None` once a terminal page has been returned
    ///
    /// A listing error is returned as-is and leaves the cursor where it was.
    pub async fn next_page(&mut self) -> Result<Option<(ObjectPage, PageStatus)>> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .store
            .list_objects(self.container, &self.cursor, self.prefix)
            .await?;

        let status = if page.exhausted {
            tracing::info!(container = self.container, "Listing exhausted");
            PageStatus::Last
        } else {
            match page.next_cursor.as_deref() {
                Some(next) if next != self.cursor => {
                    self.cursor = next.to_string();
                    PageStatus::More
                }
                _ => {
                    tracing::warn!(
                        container = self.container,
                        cursor = %self.cursor,
                        "Pagination stalled: cursor did not advance, unable to list all objects"
                    );
                    PageStatus::Stalled
                }
            }
        };

        if status.is_terminal() {
            self.finished = true;
        }
        Ok(Some((page, status)))
    }
}
