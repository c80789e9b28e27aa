//! History windowing by character budget

use super::Turn;

/// Select the suffix of `turns` replayed as context for the next prompt.
///
/// Walks backward from the newest turn, adding each turn's character count
/// while the running total is still within `word_limit`. The check happens
/// before a turn is added, so the newest turn is always included and the
/// turn that crosses the budget is included too.
pub fn select_window(turns: &[Turn], word_limit: usize) -> &[Turn] {
    let mut included = 0;
    let mut total = 0usize;

    while total <= word_limit && included < turns.len() {
        total = total.saturating_add(turns[turns.len() - 1 - included].weight());
        included += 1;
    }

    &turns[turns.len() - included..]
}
