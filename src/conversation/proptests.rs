//! Property-based tests for history windowing
//!
//! - The window is always a suffix of the history
//! - A non-empty history always yields a non-empty window
//! - Every included turn except the oldest one started within budget
//! - Raising the budget never shrinks the window

use super::{select_window, Turn};
use proptest::prelude::*;

fn arb_turn() -> impl Strategy<Value = Turn> {
    ("[a-zA-Zа-я0-9 ]{0,40}", "[a-zA-Zа-я0-9 ]{0,80}").prop_map(|(p, r)| Turn {
        prompt: p,
        response: r,
        timestamp: "2023-01-03T10:11:12.000000".to_string(),
    })
}

fn arb_history() -> impl Strategy<Value = Vec<Turn>> {
    prop::collection::vec(arb_turn(), 0..30)
}

proptest! {
    #[test]
    fn prop_window_is_suffix(turns in arb_history(), limit in 0usize..2000) {
        let window = select_window(&turns, limit);
        prop_assert!(window.len() <= turns.len());
        prop_assert_eq!(window, &turns[turns.len() - window.len()..]);
    }

    #[test]
    fn prop_non_empty_history_includes_last(turns in arb_history(), limit in 0usize..2000) {
        let window = select_window(&turns, limit);
        prop_assert_eq!(window.is_empty(), turns.is_empty());
        if let Some(last) = turns.last() {
            prop_assert_eq!(window.last(), Some(last));
        }
    }

    #[test]
    fn prop_budget_checked_before_each_turn(turns in arb_history(), limit in 0usize..2000) {
        let window = select_window(&turns, limit);
        // Everything newer than the oldest included turn fits in the budget.
        let newer: usize = window.iter().skip(1).map(Turn::weight).sum();
        prop_assert!(window.len() <= 1 || newer <= limit);
        // If something was left out, the whole window overshoots the budget.
        if window.len() < turns.len() {
            let total: usize = window.iter().map(Turn::weight).sum();
            prop_assert!(total > limit);
        }
    }

    #[test]
    fn prop_monotonic_in_budget(turns in arb_history(), a in 0usize..2000, b in 0usize..2000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(select_window(&turns, lo).len() <= select_window(&turns, hi).len());
    }
}
