use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::stage::StageId;

/// Stages still physically attached and flying as one body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RocketBodyGroup {
    stages: BTreeSet<StageId>,
}

impl RocketBodyGroup {
    pub fn new(stages: impl IntoIterator<Item = StageId>) -> Self {
        Self { stages: stages.into_iter().collect() }
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.stages.contains(&stage)
    }

    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.stages.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Remove the attached part of `separating` and return it as its own
    /// group. `None` when nothing would actually come off, either because
    /// none of those stages are attached or because all of this group's
    /// stages would leave together.
    pub fn split_off(&mut self, separating: &BTreeSet<StageId>) -> Option<RocketBodyGroup> {
        let leaving: BTreeSet<StageId> = self.stages.intersection(separating).copied().collect();
        if leaving.is_empty() || leaving.len() == self.stages.len() {
            return None;
        }
        self.stages.retain(|s| !leaving.contains(s));
        Some(RocketBodyGroup { stages: leaving })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[usize]) -> BTreeSet<StageId> {
        v.iter().map(|&i| StageId(i)).collect()
    }

    #[test]
    fn split_conserves_membership() {
        let mut g = RocketBodyGroup::new(ids(&[0, 1, 2]));
        let before = g.clone();
        let off = g.split_off(&ids(&[1, 2])).unwrap();
        let union: BTreeSet<StageId> = g.stages().chain(off.stages()).collect();
        assert_eq!(union, before.stages().collect());
        assert!(g.stages().all(|s| !off.contains(s)));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn absent_stage_splits_nothing() {
        let mut g = RocketBodyGroup::new(ids(&[0, 1]));
        assert!(g.split_off(&ids(&[2])).is_none());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn whole_group_leaving_is_not_a_split() {
        let mut g = RocketBodyGroup::new(ids(&[1]));
        assert!(g.split_off(&ids(&[1, 2])).is_none());
        assert!(g.contains(StageId(1)));
    }
}
