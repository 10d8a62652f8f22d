use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stage definition
// ---------------------------------------------------------------------------

/// Stage index. Axial stages are numbered from the top (0 = sustainer)
/// downwards; parallel stages may take any index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageKind {
    /// Stacked on the rocket axis.
    Axial,
    /// Strap-on boosters mounted around `parent`.
    Parallel { parent: StageId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub kind: StageKind,
}

impl Stage {
    pub fn axial(id: usize, name: impl Into<String>) -> Self {
        Self { id: StageId(id), name: name.into(), kind: StageKind::Axial }
    }

    pub fn parallel(id: usize, name: impl Into<String>, parent: StageId) -> Self {
        Self { id: StageId(id), name: name.into(), kind: StageKind::Parallel { parent } }
    }

    pub fn is_axial(&self) -> bool {
        matches!(self.kind, StageKind::Axial)
    }

    pub fn parent(&self) -> Option<StageId> {
        match self.kind {
            StageKind::Axial => None,
            StageKind::Parallel { parent } => Some(parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_stage_knows_its_parent() {
        let s = Stage::parallel(2, "Side boosters", StageId(1));
        assert!(!s.is_axial());
        assert_eq!(s.parent(), Some(StageId(1)));
        assert_eq!(Stage::axial(0, "Sustainer").parent(), None);
    }
}
