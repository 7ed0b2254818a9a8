//! Achievement and stat data model.
//!
//! Achievements are single bits inside 32-bit stat words held by the peer. Other
//! stats are plain counters (integer or float-encoded), some of which back the
//! progress of an achievement.
use serde::{Deserialize, Serialize};

use crate::schema::kv::Node;

/// Declared kind of a stat record in the schema (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Int,
    Float,
    AvgRate,
    Achievements,
    GroupAchievements,
}

impl StatKind {
    /// Interpret a schema `type` value. Both the numeric code and the symbolic
    /// name are accepted, case-insensitively.
    pub fn from_type_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "1" | "INT" => Some(StatKind::Int),
            "2" | "FLOAT" => Some(StatKind::Float),
            "3" | "AVGRATE" => Some(StatKind::AvgRate),
            "4" | "ACHIEVEMENTS" => Some(StatKind::Achievements),
            "5" | "GROUPACHIEVEMENTS" => Some(StatKind::GroupAchievements),
            _ => None,
        }
    }

    /// Kinds whose stats may back an achievement's progress.
    pub fn is_progress_counter(self) -> bool {
        matches!(self, StatKind::Int | StatKind::Float)
    }

    /// Encoding of this kind's value inside the raw 32-bit word.
    pub fn value_kind(self) -> ValueKind {
        match self {
            StatKind::Float | StatKind::AvgRate => ValueKind::Floating,
            _ => ValueKind::Numeric,
        }
    }
}

/// How a stat's 32-bit wire word should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueKind {
    #[default]
    Numeric,
    Floating,
}

/// Typed stat value with total conversions to and from the raw wire word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Numeric(u32),
    Floating(f32),
}

impl StatValue {
    pub fn from_raw(kind: ValueKind, raw: u32) -> Self {
        match kind {
            ValueKind::Numeric => StatValue::Numeric(raw),
            ValueKind::Floating => StatValue::Floating(f32::from_bits(raw)),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            StatValue::Numeric(v) => v,
            StatValue::Floating(v) => v.to_bits(),
        }
    }

    /// Value of `kind` representing the counter `amount`.
    pub fn from_count(kind: ValueKind, amount: u32) -> Self {
        match kind {
            ValueKind::Numeric => StatValue::Numeric(amount),
            ValueKind::Floating => StatValue::Floating(amount as f32),
        }
    }
}

/// Current value of one stat as reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawStat {
    pub stat_id: u32,
    pub value: u32,
}

impl RawStat {
    pub fn new(stat_id: u32, value: u32) -> Self {
        Self { stat_id, value }
    }
}

/// A pending mutation of one stat word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatWrite {
    pub stat_id: u32,
    pub value: u32,
}

/// One achievement bit discovered in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementDefinition {
    pub stat_id: u32,
    /// Always < 32.
    pub bit_index: u8,
    pub is_unlocked: bool,
    pub restricted: bool,
    /// 0 when the achievement has no progress counter.
    pub dependency_stat_id: u32,
    pub dependency_threshold: u32,
    pub dependency_value_kind: ValueKind,
    pub dependency_key: Option<String>,
    /// The `display.name` subtree holding per-language names.
    pub display_names: Option<Node>,
    pub display_name: Option<String>,
    pub raw_stat_value: u32,
}

impl AchievementDefinition {
    pub fn has_dependency(&self) -> bool {
        self.dependency_stat_id != 0
    }

    /// Seed value for the dependency stat when it is first written in a batch.
    pub fn dependency_seed(&self, set: bool) -> u32 {
        if set {
            StatValue::from_count(self.dependency_value_kind, self.dependency_threshold).to_raw()
        } else {
            0
        }
    }
}

/// Whether `bit_index` is set in `stat_value`.
pub fn is_unlocked(stat_value: u32, bit_index: u8) -> bool {
    debug_assert!(bit_index < 32);
    (stat_value >> bit_index) & 1 != 0
}
