use anyhow::{Result, anyhow};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::{
    classify::{classify_draft, classify_ready},
    types::{Candidate, DetailedState, Forge, PullRequest},
};

/// A relevant candidate in discovery order, either already classified or
/// waiting for its detail lookup.
#[derive(Debug)]
pub enum Slot {
    Classified(PullRequest),
    Pending(Candidate),
}

impl Slot {
    /// Drafts are classified on the spot and never looked up.
    pub fn from_candidate(candidate: Candidate) -> Self {
        if candidate.is_draft {
            Slot::Classified(classify_draft(candidate))
        } else {
            Slot::Pending(candidate)
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending(_))
    }
}

/// Looks up every pending slot concurrently and classifies it.
///
/// At most `max_concurrent` lookups are in flight at once and they complete
/// in any order; results are written back by slot index so the returned
/// pull requests keep the order of `slots`. `on_resolved` is called once per
/// completed lookup. The first failed lookup aborts the rest.
pub async fn resolve_slots<F>(
    forge: &F,
    slots: Vec<Slot>,
    max_concurrent: usize,
    mut on_resolved: impl FnMut(),
) -> Result<Vec<PullRequest>>
where
    F: Forge + ?Sized,
{
    let mut states: Vec<Option<DetailedState>> = slots.iter().map(|_| None).collect();

    {
        let pending = slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Pending(candidate) => Some((index, &candidate.id)),
                Slot::Classified(_) => None,
            });

        let lookups = stream::iter(pending)
            .map(|(index, id)| async move {
                let state = forge.fetch_detailed_state(id).await?;
                debug!(%id, merge_state = ?state.merge_state_status, "Resolved merge state");
                Ok::<_, anyhow::Error>((index, state))
            })
            .buffer_unordered(max_concurrent.max(1));

        let mut lookups = std::pin::pin!(lookups);
        while let Some((index, state)) = lookups.try_next().await? {
            states[index] = Some(state);
            on_resolved();
        }
    }

    slots
        .into_iter()
        .zip(states)
        .map(|(slot, state)| match (slot, state) {
            (Slot::Classified(pr), _) => Ok(pr),
            (Slot::Pending(candidate), Some(state)) => Ok(classify_ready(candidate, &state)),
            (Slot::Pending(candidate), None) => {
                Err(anyhow!("no merge state was resolved for {}", candidate.id))
            }
        })
        .collect()
}
