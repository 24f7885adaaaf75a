use std::collections::HashSet;

use anyhow::Result;
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::{
    aggregate::Report,
    enrich::{Slot, resolve_slots},
    fetch::fetch_pages,
    filter::{Relevance, RelevanceFilter},
    types::{Forge, Progress, QuerySpec},
};

/// Builds the viewer's report of open pull requests.
///
/// Pages through every open pull request first, filtering and classifying
/// drafts as they arrive, then resolves the merge state of the remaining
/// pull requests concurrently. Any failure aborts the run and nothing is
/// returned.
pub async fn fetch_report<F, P>(spec: &QuerySpec, forge: &F, progress: &P) -> Result<Report>
where
    F: Forge + ?Sized,
    P: Progress + ?Sized,
{
    let viewer = forge.viewer_info().await?;
    let login = viewer.login.clone();
    let total = viewer.total_open;
    info!(
        viewer = %login,
        total_open = total,
        "Collecting open pull requests"
    );

    let filter = RelevanceFilter::new(&login, spec);
    let mut report = Report::new(viewer);
    let mut slots = Vec::new();
    let mut accepted_urls = HashSet::new();
    let mut found = 0usize;
    let notify = |found: usize| progress.update(found, total.max(found));

    {
        let mut candidates = std::pin::pin!(fetch_pages(forge, spec.effective_page_size()));
        while let Some(candidate) = candidates.try_next().await? {
            match filter.check(&candidate) {
                Relevance::Skip(reason) => {
                    debug!(id = %candidate.id, %reason, "Skipping pull request");
                    report.record_skip();
                    found += 1;
                    notify(found);
                }
                Relevance::Accept => {
                    if !accepted_urls.insert(candidate.url.clone()) {
                        debug!(url = %candidate.url, "Dropping duplicate pull request");
                        continue;
                    }
                    let slot = Slot::from_candidate(candidate);
                    if !slot.is_pending() {
                        found += 1;
                        notify(found);
                    }
                    slots.push(slot);
                }
            }
        }
    }

    let pending = slots.iter().filter(|slot| slot.is_pending()).count();
    debug!(
        candidates = slots.len(),
        pending,
        "Pagination complete, resolving merge states"
    );

    let pull_requests = resolve_slots(forge, slots, spec.effective_max_concurrent(), || {
        found += 1;
        notify(found);
    })
    .await?;

    for pr in pull_requests {
        let url = pr.url.clone();
        if !report.insert(pr) {
            debug!(%url, "Dropping duplicate pull request");
        }
    }

    info!(
        shown = report.len(),
        skipped = report.skipped(),
        "Pull request report complete"
    );

    Ok(report)
}
