//! Merging per-source batches into one deduplicated, ranked list.

use std::cmp::{Ordering, Reverse};

use serde::{Deserialize, Serialize};

use crate::models::{PaperRecord, Ranking};
use crate::utils::{find_duplicate_groups, pick_survivor};

use super::orchestrator::{FanOut, SourceStatus};

/// Final answer to a search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub papers: Vec<PaperRecord>,
    pub statuses: Vec<SourceStatus>,
    pub ranking: Ranking,
}

impl SearchReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceStatus> {
        self.statuses.iter().filter(|s| !s.is_success())
    }
}

/// A deduplicated paper plus where its group sat in the raw batches
struct Survivor {
    paper: PaperRecord,
    /// Best round-robin slot of any group member: (position in batch, batch)
    slot: (usize, usize),
    /// Dispatch-order index of the group's first member
    first_seen: usize,
}

/// Collapses duplicates across sources and orders what is left.
///
/// Within a duplicate group the record with the most populated fields wins;
/// ties go to the earliest record in dispatch order. Merging is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMerger;

impl ResultMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, fan_out: FanOut, ranking: Ranking) -> SearchReport {
        // Flatten in dispatch order, remembering each record's slot
        let mut slots = Vec::new();
        let mut records = Vec::new();
        for (batch_idx, batch) in fan_out.batches.into_iter().enumerate() {
            for (pos, paper) in batch.papers.into_iter().enumerate() {
                slots.push((pos, batch_idx));
                records.push(paper);
            }
        }

        let groups = find_duplicate_groups(&records);
        let picks: Vec<(usize, (usize, usize), usize)> = groups
            .iter()
            .map(|group| {
                let survivor = pick_survivor(&records, group);
                let slot = group
                    .iter()
                    .map(|&i| slots[i])
                    .min()
                    .unwrap_or(slots[survivor]);
                (survivor, slot, group[0])
            })
            .collect();

        let removed = records.len() - picks.len();
        if removed > 0 {
            tracing::debug!("Merged away {} duplicate records", removed);
        }

        let mut owned: Vec<Option<PaperRecord>> = records.into_iter().map(Some).collect();
        let mut survivors: Vec<Survivor> = picks
            .into_iter()
            .filter_map(|(idx, slot, first_seen)| {
                owned[idx].take().map(|paper| Survivor {
                    paper,
                    slot,
                    first_seen,
                })
            })
            .collect();

        match ranking {
            Ranking::Relevance => survivors.sort_by_key(|s| s.slot),
            Ranking::DateDescending => survivors.sort_by(newest_first),
        }

        SearchReport {
            papers: survivors.into_iter().map(|s| s.paper).collect(),
            statuses: fan_out.statuses,
            ranking,
        }
    }
}

/// Newest first, undated last, ties in dispatch order
fn newest_first(a: &Survivor, b: &Survivor) -> Ordering {
    let key = |s: &Survivor| (s.paper.published.is_none(), Reverse(s.paper.published));
    key(a).cmp(&key(b)).then(a.first_seen.cmp(&b.first_seen))
}
