//! Mutation planning: requested achievement flips → coalesced stat writes.
//!
//! Each achievement is one bit of a stat word, so several requested flips can
//! land on the same stat. The planner keeps at most one [`StatWrite`] per stat id
//! and composes every bit change onto it, starting from the value last fetched
//! from the peer so untouched bits survive.
//!
//! Per-item problems (index out of range, already in the requested state,
//! restricted) are reported as [`Diagnostic`]s and never stop the batch.
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::IndexListError;
use crate::model::{AchievementDefinition, StatWrite};

/// Why a requested achievement was left out of the write set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    OutOfRange { index: u32 },
    AlreadyInState { index: u32, unlocked: bool },
    Protected { index: u32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OutOfRange { index } => write!(f, "Achievement #{} is out of range", index),
            Diagnostic::AlreadyInState { index, unlocked } => write!(
                f,
                "Achievement #{} is already {}",
                index,
                if *unlocked { "unlocked" } else { "locked" }
            ),
            Diagnostic::Protected { index } => {
                write!(f, "Achievement #{} is protected and can't be switched", index)
            }
        }
    }
}

/// Result of planning one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    pub writes: Vec<StatWrite>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MutationPlan {
    /// An empty write set fails the whole operation, whether nothing was
    /// requested or everything was rejected.
    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }
}

/// Which achievements a user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSelection {
    All,
    Indices(Vec<u32>),
}

impl IndexSelection {
    /// Planner input; the empty slice means every achievement.
    pub fn as_slice(&self) -> &[u32] {
        match self {
            IndexSelection::All => &[],
            IndexSelection::Indices(v) => v,
        }
    }
}

/// Parse `"*"` or a comma/space separated list of 1-based achievement numbers.
/// Duplicates collapse to their first occurrence.
pub fn parse_index_list(text: &str) -> Result<IndexSelection, IndexListError> {
    let trimmed = text.trim();
    if trimmed == "*" {
        return Ok(IndexSelection::All);
    }
    let mut seen = HashSet::new();
    let mut indices = Vec::new();
    for token in trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.parse::<u32>() {
            Ok(n) if n > 0 => {
                if seen.insert(n) {
                    indices.push(n);
                }
            }
            _ => return Err(IndexListError::Invalid(token.to_string())),
        }
    }
    if indices.is_empty() {
        return Err(IndexListError::Empty);
    }
    Ok(IndexSelection::Indices(indices))
}

#[derive(Default)]
struct WriteSet {
    writes: Vec<StatWrite>,
}

impl WriteSet {
    /// Existing write for `stat_id`, or a new one seeded with `seed`.
    fn entry(&mut self, stat_id: u32, seed: u32) -> &mut StatWrite {
        let pos = match self.writes.iter().position(|w| w.stat_id == stat_id) {
            Some(pos) => pos,
            None => {
                self.writes.push(StatWrite { stat_id, value: seed });
                self.writes.len() - 1
            }
        };
        &mut self.writes[pos]
    }

    fn apply(&mut self, def: &AchievementDefinition, set: bool) {
        let mask = 1u32 << def.bit_index;
        let write = self.entry(def.stat_id, def.raw_stat_value);
        if set {
            write.value |= mask;
        } else {
            write.value &= !mask;
        }
        if def.has_dependency() {
            // Progress snaps to the threshold or to zero; only a fresh entry is seeded.
            self.entry(def.dependency_stat_id, def.dependency_seed(set));
        }
    }
}

/// Plan writes that move the `requested` achievements (1-based, in caller order)
/// to `set`. An empty `requested` applies to every unrestricted achievement;
/// restricted ones are skipped silently in that mode.
pub fn plan_mutation(
    definitions: &[AchievementDefinition],
    requested: &[u32],
    set: bool,
) -> MutationPlan {
    let mut writes = WriteSet::default();
    let mut diagnostics = Vec::new();

    if requested.is_empty() {
        for (pos, def) in definitions.iter().enumerate() {
            if def.restricted {
                continue;
            }
            if def.is_unlocked == set {
                diagnostics.push(Diagnostic::AlreadyInState {
                    index: pos as u32 + 1,
                    unlocked: set,
                });
                continue;
            }
            writes.apply(def, set);
        }
    } else {
        let mut seen = HashSet::new();
        for &index in requested {
            if !seen.insert(index) {
                continue;
            }
            let Some(def) = (index as usize)
                .checked_sub(1)
                .and_then(|i| definitions.get(i))
            else {
                diagnostics.push(Diagnostic::OutOfRange { index });
                continue;
            };
            if def.is_unlocked == set {
                diagnostics.push(Diagnostic::AlreadyInState { index, unlocked: set });
                continue;
            }
            if def.restricted {
                diagnostics.push(Diagnostic::Protected { index });
                continue;
            }
            writes.apply(def, set);
        }
    }

    MutationPlan {
        writes: writes.writes,
        diagnostics,
    }
}
