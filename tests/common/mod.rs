//! Shared schema fixtures, built with the crate's own encoder.
#![allow(dead_code)] // each test binary uses a different subset

use serde_json::json;
use statbits::config::Config;
use statbits::model::RawStat;
use statbits::schema::{encode, Node};

pub const RESOURCE: u64 = 440;

/// Five achievements over three bit containers:
///
/// 1. `10:0` First Steps (French name available)
/// 2. `10:1` Collector, progress on `items_collected` (stat 20, int, max 100)
/// 3. `10:2` Locked Away, restricted by its own permission
/// 4. `11:0` Marathon, progress on `distance` (stat 21, float, max 42)
/// 5. `12:0` Secret, restricted through its backing stat 22
///
/// The backing stats are declared both before and after the containers.
pub fn game_tree() -> Node {
    Node::from_json(
        "440",
        &json!({
            "gamename": "Fixture Game",
            "stats": {
                "20": { "type": 1, "name": "items_collected" },
                "10": {
                    "type": 4,
                    "bits": {
                        "0": { "display": { "name": { "english": "First Steps", "french": "Premiers pas" } } },
                        "1": {
                            "display": { "name": { "english": "Collector" } },
                            "progress": { "value": { "operand1": "items_collected" }, "max_val": 100 }
                        },
                        "2": { "permission": 2, "display": { "name": { "english": "Locked Away" } } }
                    }
                },
                "11": {
                    "type": "ACHIEVEMENTS",
                    "bits": {
                        "0": {
                            "display": { "name": { "english": "Marathon" } },
                            "progress": { "value": { "operand1": "distance" }, "max_val": "42" }
                        }
                    }
                },
                "12": {
                    "type": "4",
                    "bits": {
                        "0": {
                            "display": { "name": { "english": "Secret" } },
                            "progress": { "value": { "operand1": "secret_counter" }, "max_val": 5 }
                        }
                    }
                },
                "21": { "type": "FLOAT", "name": "distance" },
                "22": { "type": 1, "name": "secret_counter", "permission": 1 }
            }
        }),
    )
}

pub fn game_schema() -> Vec<u8> {
    encode(&game_tree())
}

/// First Steps unlocked, everything else locked.
pub fn game_stats() -> Vec<RawStat> {
    vec![
        RawStat::new(10, 0b001),
        RawStat::new(11, 0),
        RawStat::new(20, 37),
        RawStat::new(21, 12.5f32.to_bits()),
    ]
}

pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.exchange.timeout_ms = 200;
    config.exchange.correlation_seed = Some(1);
    config.logging.file = None;
    config
}
