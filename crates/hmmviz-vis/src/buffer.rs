//! Append-only, randomly seekable store of snapshots for one training run.

use std::sync::Arc;

use hmmviz_layout::TierCounts;

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

/// Ordered snapshots of one run.
///
/// Snapshots are immutable once appended and handed out as `Arc`s, so a
/// renderer can keep drawing an old snapshot while new ones arrive. There is
/// no eviction: the buffer only shrinks through [`SnapshotBuffer::clear`] or a
/// wholesale [`SnapshotBuffer::replace`].
#[derive(Debug, Default, Clone)]
pub struct SnapshotBuffer {
    snapshots: Vec<Arc<Snapshot>>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Iteration index of the last snapshot, if any.
    pub fn last_iteration(&self) -> Option<u64> {
        self.snapshots.last().map(|s| s.iteration)
    }

    /// Node counts shared by every snapshot in the buffer.
    pub fn tier_counts(&self) -> Option<TierCounts> {
        self.snapshots.first().map(|s| s.tier_counts())
    }

    /// Validate and append. On error the buffer is unchanged.
    pub fn append(&mut self, snapshot: Snapshot) -> Result<()> {
        self.check_next(&snapshot, self.last_iteration(), self.tier_counts())?;
        warn_on_violations(&snapshot);
        self.snapshots.push(Arc::new(snapshot));
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<Arc<Snapshot>> {
        self.snapshots.get(index).cloned().ok_or(Error::Range {
            index,
            len: self.snapshots.len(),
        })
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Swap in a whole new run. Every snapshot is validated first; if any is
    /// rejected the current contents are kept.
    pub fn replace(&mut self, snapshots: Vec<Snapshot>) -> Result<()> {
        let mut last = None;
        let mut counts = None;
        for (i, snapshot) in snapshots.iter().enumerate() {
            self.check_next(snapshot, last, counts)
                .map_err(|e| Error::validation(format!("snapshot {i}: {e}")))?;
            last = Some(snapshot.iteration);
            counts = counts.or(Some(snapshot.tier_counts()));
        }
        for snapshot in &snapshots {
            warn_on_violations(snapshot);
        }
        self.snapshots = snapshots.into_iter().map(Arc::new).collect();
        Ok(())
    }

    fn check_next(
        &self,
        snapshot: &Snapshot,
        last: Option<u64>,
        counts: Option<TierCounts>,
    ) -> Result<()> {
        snapshot.validate()?;
        if let Some(last) = last {
            if snapshot.iteration <= last {
                return Err(Error::validation(format!(
                    "iteration index {} is not greater than previous {last}",
                    snapshot.iteration
                )));
            }
        }
        if let Some(counts) = counts {
            if snapshot.tier_counts() != counts {
                return Err(Error::validation(format!(
                    "snapshot dimensions {:?} differ from run dimensions {counts:?}",
                    snapshot.tier_counts()
                )));
            }
        }
        Ok(())
    }
}

fn warn_on_violations(snapshot: &Snapshot) {
    for v in snapshot.stochastic_violations() {
        tracing::warn!(
            iteration = snapshot.iteration,
            distribution = ?v.distribution,
            sum = v.sum,
            "probability vector does not sum to 1"
        );
    }
}
