mod common;

use statbits::model::StatWrite;
use statbits::planner::{parse_index_list, plan_mutation, Diagnostic, IndexSelection};
use statbits::schema::parse_achievements;

use common::{game_schema, game_stats};

fn defs() -> Vec<statbits::model::AchievementDefinition> {
    parse_achievements(&game_schema(), &game_stats()).unwrap()
}

#[test]
fn unlock_all_skips_restricted_silently() {
    let plan = plan_mutation(&defs(), IndexSelection::All.as_slice(), true);
    // First Steps is already unlocked; Locked Away and Secret are restricted.
    assert_eq!(
        plan.diagnostics,
        vec![Diagnostic::AlreadyInState { index: 1, unlocked: true }]
    );
    assert_eq!(
        plan.writes,
        vec![
            StatWrite { stat_id: 10, value: 0b011 },
            StatWrite { stat_id: 20, value: 100 },
            StatWrite { stat_id: 11, value: 1 },
            StatWrite { stat_id: 21, value: 42f32.to_bits() },
        ]
    );
}

#[test]
fn explicit_list_reports_each_skip() {
    let selection = parse_index_list("3, 9, 1, 5, 2").unwrap();
    let plan = plan_mutation(&defs(), selection.as_slice(), true);
    assert_eq!(
        plan.diagnostics,
        vec![
            Diagnostic::Protected { index: 3 },
            Diagnostic::OutOfRange { index: 9 },
            Diagnostic::AlreadyInState { index: 1, unlocked: true },
            Diagnostic::Protected { index: 5 },
        ]
    );
    assert_eq!(
        plan.writes,
        vec![StatWrite { stat_id: 10, value: 0b011 }, StatWrite { stat_id: 20, value: 100 }]
    );
}

#[test]
fn locking_clears_bit_and_zeroes_progress() {
    let plan = plan_mutation(&defs(), &[1, 2], false);
    assert_eq!(
        plan.diagnostics,
        vec![Diagnostic::AlreadyInState { index: 2, unlocked: false }]
    );
    assert_eq!(plan.writes, vec![StatWrite { stat_id: 10, value: 0 }]);
    assert!(plan.has_writes());

    let plan = plan_mutation(&defs(), &[4], false);
    assert!(!plan.has_writes());
}

#[test]
fn one_write_per_stat_id() {
    let plan = plan_mutation(&defs(), &[2, 4, 2], true);
    let mut ids: Vec<u32> = plan.writes.iter().map(|w| w.stat_id).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
}
