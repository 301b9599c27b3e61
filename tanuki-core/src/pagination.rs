//! Accumulate every page of a paginated list endpoint

use std::collections::HashSet;
use std::future::Future;

/// One page of results and the number of the page after it (0 when done)
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page: u32) -> Self {
        Self { items, next_page }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Fetch(E),
    #[error("server returned page {0} more than once")]
    RepeatedPage(u32),
}

/// Fetch pages starting at 1 until the server reports no next page
///
/// Items keep server order. The first fetch error is returned as-is; a next
/// page number that was already fetched is an error rather than a loop.
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, PageError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    E: std::error::Error + 'static,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut page = 1;

    loop {
        if !seen.insert(page) {
            return Err(PageError::RepeatedPage(page));
        }

        let result = fetch(page).await.map_err(PageError::Fetch)?;
        log::debug!(
            "fetched page {} ({} items), next page {}",
            page,
            result.items.len(),
            result.next_page
        );
        items.extend(result.items);

        if result.next_page == 0 {
            return Ok(items);
        }
        page = result.next_page;
    }
}
