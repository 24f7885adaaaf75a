use anyhow::Result;
use futures::{Stream, TryStreamExt, stream};
use tracing::debug;

use crate::{
    error::Error,
    types::{Candidate, Forge, PageInfo},
};

#[derive(Debug)]
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Streams the viewer's open pull requests page by page.
///
/// Pages are requested strictly in sequence: the next request is only issued
/// once the previous page's end cursor is known and the consumer has drained
/// its candidates. The stream ends after the last page, or after yielding the
/// first error.
pub fn fetch_pages<F>(forge: &F, page_size: u32) -> impl Stream<Item = Result<Candidate>> + '_
where
    F: Forge + ?Sized,
{
    stream::try_unfold((Cursor::Start, 0usize), move |(cursor, pages)| {
        fetch_page(forge, page_size, cursor, pages)
    })
    .map_ok(|candidates| stream::iter(candidates.into_iter().map(Ok::<_, anyhow::Error>)))
    .try_flatten()
}

type PageStep = Option<(Vec<Candidate>, (Cursor, usize))>;

async fn fetch_page<F>(forge: &F, page_size: u32, cursor: Cursor, pages: usize) -> Result<PageStep>
where
    F: Forge + ?Sized,
{
    let after = match cursor {
        Cursor::Done => return Ok(None),
        Cursor::Start => None,
        Cursor::After(cursor) => Some(cursor),
    };

    let page = forge
        .fetch_candidate_page(page_size, after.as_deref())
        .await?;
    let pages = pages + 1;
    let next = next_cursor(&page.page_info, after.as_deref())?;

    debug!(
        page = pages,
        candidates = page.candidates.len(),
        has_next_page = page.page_info.has_next_page,
        "Fetched pull request page"
    );

    Ok(Some((page.candidates, (next, pages))))
}

fn next_cursor(page_info: &PageInfo, requested: Option<&str>) -> Result<Cursor, Error> {
    if !page_info.has_next_page {
        return Ok(Cursor::Done);
    }

    match page_info.end_cursor.as_deref() {
        None => Err(Error::MalformedResponse(
            "hasNextPage is true but endCursor is missing".into(),
        )),
        Some(end) if Some(end) == requested => Err(Error::MalformedResponse(format!(
            "pagination did not advance past cursor '{end}'"
        ))),
        Some(end) => Ok(Cursor::After(end.to_string())),
    }
}
