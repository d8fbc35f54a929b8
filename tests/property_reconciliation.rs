//! Property tests: a `since` window never changes what a pass decides.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{day, issue, FakeSource};
use notion_issues::{ReconciliationEngine, SyncPolicy};
use proptest::prelude::*;

/// Key index to (title variant, day of last edit).
type Side = BTreeMap<u8, (u8, u32)>;

fn side() -> impl Strategy<Value = Side> {
    prop::collection::btree_map(0u8..16, (0u8..2, 1u32..=28), 0..12)
}

fn key(index: u8) -> String {
    format!("X#{index}")
}

fn source(template: FakeSource, records: &Side) -> FakeSource {
    records.iter().fold(template, |source, (&index, &(title, updated))| {
        source.with_issue(issue(&key(index), day(updated)).with_title(format!("v{title}")))
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Expected {
    creates: Vec<String>,
    board_updates: Vec<String>,
    tracker_updates: Vec<String>,
}

fn expected(board: &Side, tracker: &Side) -> Expected {
    let mut out = Expected::default();
    for (index, &(title, updated)) in tracker {
        match board.get(index) {
            None => out.creates.push(key(*index)),
            Some(&(board_title, board_updated)) if board_title != title => {
                if updated > board_updated {
                    out.board_updates.push(key(*index));
                } else if board_updated > updated {
                    out.tracker_updates.push(key(*index));
                }
            }
            Some(_) => {}
        }
    }
    out.creates.sort();
    out.board_updates.sort();
    out.tracker_updates.sort();
    out
}

fn run(board: &Side, tracker: &Side, since: Option<u32>) -> (Expected, usize, BTreeSet<String>) {
    let board_source = source(FakeSource::board(), board);
    let tracker_source = source(FakeSource::tracker(), tracker);
    let policy = SyncPolicy::default().with_since(since.map(day));

    let report = tokio_test::block_on(ReconciliationEngine::new(policy).run(&board_source, &tracker_source))
        .unwrap();

    let sorted = |mut keys: Vec<String>| {
        keys.sort();
        keys
    };
    let tracker_written: BTreeSet<String> = tracker_source
        .calls()
        .iter()
        .map(|call| call.key().to_string())
        .collect();
    (
        Expected {
            creates: sorted(board_source.creates()),
            board_updates: sorted(board_source.updates()),
            tracker_updates: sorted(tracker_source.updates()),
        },
        report.record_count,
        tracker_written,
    )
}

proptest! {
    /// Backfill makes a bounded scan decide exactly what a full scan would.
    #[test]
    fn prop_since_window_does_not_change_decisions(
        board in side(),
        tracker in side(),
        since in prop::option::of(1u32..=28),
    ) {
        let (actual, record_count, tracker_written) = run(&board, &tracker, since);
        prop_assert_eq!(actual, expected(&board, &tracker));

        // Every board key the tracker also knows is compared after backfill.
        let board_keys: BTreeSet<u8> = board.keys().copied().collect();
        let tracker_keys: BTreeSet<u8> = tracker.keys().copied().collect();
        let shared = board_keys.intersection(&tracker_keys).count();
        prop_assert!(record_count >= shared);

        // Keys unknown to the tracker are never written there.
        for key in tracker_written {
            let index: u8 = key.trim_start_matches("X#").parse().unwrap();
            prop_assert!(tracker.contains_key(&index));
        }
    }
}
