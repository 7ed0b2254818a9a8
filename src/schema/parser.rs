//! Stat schema → achievement definitions.
//!
//! Two passes over the `stats` table:
//!
//! 1. every achievement-bit container (`type` 4 / `ACHIEVEMENTS`) yields one
//!    [`AchievementDefinition`] per entry of its `bits` table, in encounter order;
//! 2. every progress counter (`type` 1 / 2) whose `name` matches a definition's
//!    `dependency_key` is linked to it, and its permission flag is carried over.
//!
//! The passes are never interleaved: a backing stat may be declared before or
//! after the achievement that refers to it.
use std::collections::HashMap;

use log::{debug, warn};

use crate::error::SchemaDecodeError;
use crate::logutil::{escape_log, hex_snippet};
use crate::model::{AchievementDefinition, RawStat, StatKind, StatValue, ValueKind};
use crate::schema::kv::{self, Node};

/// Decode `blob` and extract achievement definitions against the current `stats`.
pub fn parse_achievements(
    blob: &[u8],
    stats: &[RawStat],
) -> Result<Vec<AchievementDefinition>, SchemaDecodeError> {
    let root = kv::decode(blob).map_err(|e| {
        warn!(
            "schema blob rejected ({} bytes, head={}): {}",
            blob.len(),
            hex_snippet(blob, 16),
            e
        );
        e
    })?;
    parse_tree(&root, stats)
}

/// Extract definitions from an already decoded schema root.
pub fn parse_tree(
    root: &Node,
    stats: &[RawStat],
) -> Result<Vec<AchievementDefinition>, SchemaDecodeError> {
    let Some(stat_nodes) = root.child("stats") else {
        debug!("schema '{}' has no stats table", escape_log(&root.name));
        return Ok(Vec::new());
    };

    let mut values: HashMap<u32, u32> = HashMap::with_capacity(stats.len());
    for stat in stats {
        values.entry(stat.stat_id).or_insert(stat.value);
    }

    let mut definitions = collect_achievement_bits(stat_nodes, &values)?;
    link_dependencies(stat_nodes, &values, &mut definitions);
    debug!(
        "parsed {} achievements from schema '{}'",
        definitions.len(),
        escape_log(&root.name)
    );
    Ok(definitions)
}

fn stat_kind(stat: &Node) -> Option<StatKind> {
    stat.child_text("type")
        .and_then(|text| StatKind::from_type_text(&text))
}

fn collect_achievement_bits(
    stat_nodes: &Node,
    values: &HashMap<u32, u32>,
) -> Result<Vec<AchievementDefinition>, SchemaDecodeError> {
    let mut definitions = Vec::new();

    for stat in stat_nodes.children() {
        if stat_kind(stat) != Some(StatKind::Achievements) {
            continue;
        }
        let Ok(stat_id) = stat.name.parse::<u32>() else {
            debug!("skipping achievement stat with non-numeric id '{}'", escape_log(&stat.name));
            continue;
        };
        let Some(bits) = stat.child("bits") else {
            continue;
        };
        let raw_stat_value = values.get(&stat_id).copied().unwrap_or(0);

        for bit in bits.children() {
            let Ok(bit_index) = bit.name.parse::<u8>() else {
                debug!(
                    "skipping bit '{}' of stat {}: not a bit number",
                    escape_log(&bit.name),
                    stat_id
                );
                continue;
            };
            if bit_index >= 32 {
                warn!("skipping bit {} of stat {}: outside the 32-bit word", bit_index, stat_id);
                continue;
            }

            let (dependency_key, dependency_threshold) = match bit.child("progress") {
                Some(progress) => read_progress(progress, stat_id, bit_index)?,
                None => (None, 0),
            };

            definitions.push(AchievementDefinition {
                stat_id,
                bit_index,
                is_unlocked: crate::model::is_unlocked(raw_stat_value, bit_index),
                // Presence alone restricts, whatever the value.
                restricted: bit.child("permission").is_some(),
                dependency_stat_id: 0,
                dependency_threshold,
                dependency_value_kind: ValueKind::Numeric,
                dependency_key,
                display_names: bit.path(&["display", "name"]).cloned(),
                display_name: None,
                raw_stat_value,
            });
        }
    }

    Ok(definitions)
}

fn read_progress(
    progress: &Node,
    stat_id: u32,
    bit_index: u8,
) -> Result<(Option<String>, u32), SchemaDecodeError> {
    let key = progress
        .path(&["value", "operand1"])
        .and_then(Node::text)
        .map(|t| t.into_owned())
        .filter(|t| !t.is_empty());

    let threshold = match progress.child("max_val") {
        None => 0,
        Some(max_val) => {
            let text = max_val.text();
            text.as_deref()
                .and_then(|t| t.trim().parse::<u32>().ok())
                .ok_or_else(|| SchemaDecodeError::InvalidNumber {
                    field: "max_val",
                    stat_id,
                    bit_index,
                    value: text.map(|t| t.into_owned()).unwrap_or_default(),
                })?
        }
    };

    Ok((key, threshold))
}

fn link_dependencies(
    stat_nodes: &Node,
    values: &HashMap<u32, u32>,
    definitions: &mut [AchievementDefinition],
) {
    for stat in stat_nodes.children() {
        let Some(kind) = stat_kind(stat).filter(|k| k.is_progress_counter()) else {
            continue;
        };
        let Ok(stat_id) = stat.name.parse::<u32>() else {
            continue;
        };
        let Some(name) = stat.child_text("name") else {
            continue;
        };
        let restricted = stat.child("permission").is_some();
        let current = StatValue::from_raw(
            kind.value_kind(),
            values.get(&stat_id).copied().unwrap_or(0),
        );

        for def in definitions
            .iter_mut()
            .filter(|d| d.dependency_key.as_deref() == Some(&*name))
        {
            def.dependency_stat_id = stat_id;
            def.dependency_value_kind = kind.value_kind();
            // Backing stat restricts the achievement, never the reverse.
            def.restricted |= restricted;
            debug!(
                "linked stat {}:{} to progress stat {} ('{}', {:?} of {})",
                def.stat_id,
                def.bit_index,
                stat_id,
                escape_log(&name),
                current,
                def.dependency_threshold
            );
        }
    }
}
