//! Query-time operations over a built [`Trie`]: probability scoring,
//! next-word prediction, and top-k ranked predictions (§4.E.2-4).
//!
//! All three share one retry pattern: descend the full token window; if it
//! doesn't resolve completely, drop the leading token and try the
//! (shorter) suffix again. This mirrors the original's `trie_query_ngram`/
//! `trie_get_nwp`, which chain exactly this retry rather than a single
//! longest-prefix-from-the-front walk — confirmed necessary by scenarios
//! like `next_word(["havia", "é"]) == "que"`: a single front-anchored
//! `descend` would land on "havia"'s own children, not "é"'s.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::Trie;

/// How much of a token window matched: `start` is the number of leading
/// tokens dropped before the rest resolved in full, `depth`/`row_index`
/// locate the resolved row.
struct Resolved {
    start: usize,
    depth: u16,
    row_index: u64,
}

impl Trie {
    /// Tries every suffix of `tokens` for a full `descend` match, longest
    /// first (i.e. dropping leading tokens one at a time), stopping at the
    /// first success. `tokens` is first trimmed to its trailing `max_len`
    /// entries, since no order-`N` trie can resolve a window longer than
    /// `N` tokens.
    fn resolve_longest_suffix(&self, tokens: &[&str], max_len: usize) -> Option<Resolved> {
        let tokens = if tokens.len() > max_len {
            &tokens[tokens.len() - max_len..]
        } else {
            tokens
        };
        for start in 0..tokens.len() {
            let window = &tokens[start..];
            let word_ids: Option<Vec<u32>> = window.iter().map(|t| self.word_id(t)).collect();
            let Some(word_ids) = word_ids else {
                continue;
            };
            let (depth, row_index) = self.descend(&word_ids);
            if depth == word_ids.len() {
                return Some(Resolved {
                    start,
                    depth: depth as u16,
                    row_index,
                });
            }
        }
        None
    }

    /// Resolves a `next_word`/`top_k` context: substitutes `["<s>"]` for an
    /// empty context, and again as a last resort if nothing in the context
    /// itself resolves (§4.E.3 step 1/2).
    fn resolve_context(&self, context: &[&str]) -> Option<Resolved> {
        const START: [&str; 1] = ["<s>"];
        let max_len = self.order.saturating_sub(1).max(1) as usize;
        let primary = if context.is_empty() { &START[..] } else { context };
        self.resolve_longest_suffix(primary, max_len)
            .or_else(|| self.resolve_longest_suffix(&START, 1))
    }

    /// The half-open `[lo, hi)` child range in `depth + 1`'s array for the
    /// context resolved at `(depth, row_index)`, and that child order.
    /// `None` if `depth` is already the model's top order, which has no
    /// children.
    fn child_range(&self, depth: u16, row_index: u64) -> Option<(u64, u64, u16)> {
        if depth >= self.order {
            return None;
        }
        let parent = self.row(depth, row_index);
        let next = self.row(depth, row_index + 1);
        Some((parent.third, next.third, depth + 1))
    }

    fn best_child(&self, depth: u16, row_index: u64) -> Option<u32> {
        let (lo, hi, child_order) = self.child_range(depth, row_index)?;
        let mut best: Option<(f32, u32)> = None;
        for i in lo..hi {
            let row = self.row(child_order, i);
            let better = match best {
                None => true,
                Some((best_prob, _)) => row.prob > best_prob,
            };
            if better {
                best = Some((row.prob, row.word_id));
            }
        }
        best.map(|(_, word_id)| word_id)
    }

    /// The log-probability of `tokens` (§4.E.2): the stored probability of
    /// the longest resolvable suffix, plus that row's own backoff weight
    /// whenever the suffix is shorter than `tokens` itself (Katz backoff —
    /// the row's backoff is genuinely stored, unlike the reference schema).
    /// Returns `f32::NEG_INFINITY` if not even the final token resolves.
    pub fn probability(&self, tokens: &[&str]) -> f32 {
        if tokens.is_empty() {
            return f32::NEG_INFINITY;
        }
        match self.resolve_longest_suffix(tokens, self.order as usize) {
            Some(r) => {
                let row = self.row(r.depth, r.row_index);
                if r.start == 0 {
                    row.prob
                } else {
                    row.prob + row.backoff
                }
            }
            None => f32::NEG_INFINITY,
        }
    }

    /// The most probable continuation of `context` (§4.E.3): the highest-
    /// probability child of the longest resolvable suffix, ties broken by
    /// the lowest row index (the original's strict `>` scan never replaces
    /// an existing best on an equal probability).
    pub fn next_word(&self, context: &[&str]) -> &str {
        match self
            .resolve_context(context)
            .and_then(|r| self.best_child(r.depth, r.row_index))
        {
            Some(word_id) => self.word_text(word_id),
            None => self.word_text(0),
        }
    }

    /// Up to `k` highest-probability continuations of `context` (§4.E.4),
    /// descending by probability, ties broken by row index. Returns fewer
    /// than `k` tokens when the child range itself holds fewer — the
    /// reference implementation reads past the range instead (§9).
    pub fn top_k(&self, context: &[&str], k: usize) -> Vec<&str> {
        if k == 0 {
            return Vec::new();
        }
        let Some(r) = self.resolve_context(context) else {
            return Vec::new();
        };
        let Some((lo, hi, child_order)) = self.child_range(r.depth, r.row_index) else {
            return Vec::new();
        };

        let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::with_capacity(k);
        for i in lo..hi {
            let row = self.row(child_order, i);
            let item = HeapItem {
                prob: row.prob,
                index: i,
                word_id: row.word_id,
            };
            if heap.len() < k {
                heap.push(Reverse(item));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if item.prob > worst.prob {
                    heap.pop();
                    heap.push(Reverse(item));
                }
            }
        }
        let mut items: Vec<HeapItem> = heap.into_iter().map(|Reverse(i)| i).collect();
        items.sort_unstable_by(|a, b| b.prob.total_cmp(&a.prob).then(a.index.cmp(&b.index)));
        items
            .iter()
            .map(|item| self.word_text(item.word_id))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapItem {
    prob: f32,
    index: u64,
    word_id: u32,
}

impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.prob
            .total_cmp(&other.prob)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
