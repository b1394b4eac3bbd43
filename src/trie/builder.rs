//! Two-pass trie construction from an ARPA source (§4.E.1).
//!
//! Pass 1 builds the vocabulary from the `1-grams` section. Pass 2 builds
//! each higher order's array in ARPA file order, computes each row's
//! `context_id` by descending through the already-finished lower orders,
//! sorts the order by `(context_id, word_id)`, then back-patches the parent
//! order's array from its build layout into its run layout, replacing its
//! `context_id` column with a `first_child_index` column derived from the
//! order just built. The top order's temporary `context_id` column is
//! finally dropped by `reduce_top_order`, since the run-time layout has no
//! use for it.

use std::io::BufRead;

use tracing::debug;

use crate::packed_array::PackedArray;
use crate::reader::arpa::ArpaReader;
use crate::vocab::{hash_token, Vocabulary};
use crate::Error;

use super::{build_layout, get_row, run_layout, set_row, Row, Trie};

/// Builds a [`Trie`] from an ARPA-format `source`, which must declare
/// exactly `order` orders in its `\data\` header.
pub fn build_from_arpa(order: u16, source: impl BufRead) -> Result<Trie, Error> {
    let mut reader = ArpaReader::new(source)?;
    if reader.order() != order {
        return Err(Error::CountMismatch {
            expected: order as u64,
            found: reader.order() as u64,
        });
    }
    let n_ngrams: Vec<u64> = reader.counts().to_vec();

    let unigram_rows = reader
        .next_section()?
        .ok_or_else(|| Error::InvalidArpa("missing 1-grams section".to_string()))?;
    let vocab = build_vocabulary(&unigram_rows)?;

    let layout1 = run_layout(order, &n_ngrams, 1);
    let len1 = array_len(&n_ngrams, order, 1);
    let mut array1 = PackedArray::new(layout1.width, len1);
    for row in &unigram_rows {
        let text = row
            .words
            .first()
            .ok_or_else(|| Error::InvalidArpa("empty 1-gram row".to_string()))?;
        let wid = vocab
            .id_of(text)
            .expect("every unigram text was just inserted into the vocabulary");
        set_row(
            &mut array1,
            &layout1,
            wid as u64,
            Row {
                prob: row.log_prob,
                backoff: row.backoff,
                word_id: 0,
                third: 0,
            },
        );
    }

    let mut trie = Trie {
        order,
        n_ngrams: n_ngrams.clone(),
        vocab,
        arrays: vec![array1],
        layouts: vec![layout1],
    };

    for n in 2..=order {
        debug!(order = n, "building ngram order");
        let rows = reader
            .next_section()?
            .ok_or_else(|| Error::InvalidArpa(format!("missing {n}-grams section")))?;
        build_order(&mut trie, n, &rows)?;
        back_patch(&mut trie, n);
    }

    if order > 1 {
        reduce_top_order(&mut trie);
    }

    Ok(trie)
}

fn build_vocabulary(unigram_rows: &[crate::reader::ArpaRow]) -> Result<Vocabulary, Error> {
    let mut entries = Vec::with_capacity(unigram_rows.len());
    for row in unigram_rows {
        let text = row
            .words
            .first()
            .ok_or_else(|| Error::InvalidArpa("empty 1-gram row".to_string()))?;
        entries.push((hash_token(text), text.as_str().into()));
    }
    Ok(Vocabulary::build(entries))
}

/// Length of order `n`'s array: orders below the top carry one extra
/// sentinel row so that `descend`'s `row_index + 1` lookup of a context's
/// upper child bound is always in range, even for the last context.
fn array_len(n_ngrams: &[u64], order: u16, n: u16) -> u64 {
    let count = n_ngrams[(n - 1) as usize];
    if n == order {
        count
    } else {
        count + 1
    }
}

/// Populates and sorts order `n`'s array from its ARPA rows. Each row's
/// `context_id` is the index its leading `n-1` tokens resolve to within
/// order `n-1`'s (already finished) array — exactly what [`Trie::descend`]
/// computes at query time, since orders `1..n-1` are already back-patched by
/// the time order `n` is built.
fn build_order(trie: &mut Trie, n: u16, rows: &[crate::reader::ArpaRow]) -> Result<(), Error> {
    let layout = build_layout(trie.order, &trie.n_ngrams, n);
    let len = array_len(&trie.n_ngrams, trie.order, n);

    let mut tmp = Vec::with_capacity(rows.len());
    for row in rows {
        let word_ids: Vec<u32> = row
            .words
            .iter()
            .map(|w| {
                trie.vocab
                    .id_of(w)
                    .ok_or_else(|| Error::UnknownToken(w.clone()))
            })
            .collect::<Result<_, _>>()?;
        if word_ids.len() != n as usize {
            return Err(Error::InvalidArpa(format!(
                "{n}-gram row has {} tokens",
                word_ids.len()
            )));
        }
        let (depth, context_id) = trie.descend(&word_ids[..(n - 1) as usize]);
        if depth != (n - 1) as usize {
            return Err(Error::InvalidArpa(format!(
                "{n}-gram row's context {:?} has no entry in lower orders",
                &row.words[..(n - 1) as usize]
            )));
        }
        tmp.push((context_id, word_ids[(n - 1) as usize], row.log_prob, row.backoff));
    }
    tmp.sort_unstable_by_key(|&(ctx, wid, _, _)| (ctx, wid));
    if tmp.len() as u64 != trie.n_ngrams[(n - 1) as usize] {
        return Err(Error::CountMismatch {
            expected: trie.n_ngrams[(n - 1) as usize],
            found: tmp.len() as u64,
        });
    }

    let mut array = PackedArray::new(layout.width, len);
    for (i, &(context_id, word_id, prob, backoff)) in tmp.iter().enumerate() {
        set_row(
            &mut array,
            &layout,
            i as u64,
            Row {
                prob,
                backoff: if n == trie.order { 0.0 } else { backoff },
                word_id,
                third: context_id,
            },
        );
    }
    trie.arrays.push(array);
    trie.layouts.push(layout);
    Ok(())
}

/// Derives order `n-1`'s `first_child_index` column from order `n`'s
/// `context_id` column, and rewrites order `n-1`'s array from its build
/// layout into its run layout to hold it.
///
/// These two columns generally differ in bit width (`context_id` is sized to
/// order `n-1`'s *parent* count, `first_child_index` to order `n`'s count —
/// see `build_layout`/`run_layout`), so this is a width-changing copy into a
/// fresh array, not an in-place reinterpretation: every row's `prob`/
/// `backoff`/`word_id` are carried over under the old layout, and `third` is
/// set to the freshly computed first_child_index under the new one.
fn back_patch(trie: &mut Trie, n: u16) {
    let child_layout = trie.layout(n);
    let child_widths = child_layout.widths();
    let third_field = child_layout.third_field_index();
    let child_count = trie.n_ngrams[(n - 1) as usize];
    let child_array_idx = (n - 1) as usize;
    let parent_array_idx = (n - 2) as usize;
    let parent_count = trie.n_ngrams[(n - 2) as usize];
    let old_parent_layout = trie.layout(n - 1);
    let new_parent_layout = run_layout(trie.order, &trie.n_ngrams, n - 1);

    let mut new_array = PackedArray::new(new_parent_layout.width, parent_count + 1);
    let mut j = 0u64;
    for i in 0..=parent_count {
        while j < child_count {
            let fields = trie.arrays[child_array_idx].get_fields(j, &child_widths);
            if fields[third_field] < i {
                j += 1;
            } else {
                break;
            }
        }
        let old_row = get_row(&trie.arrays[parent_array_idx], &old_parent_layout, i);
        set_row(
            &mut new_array,
            &new_parent_layout,
            i,
            Row {
                prob: old_row.prob,
                backoff: old_row.backoff,
                word_id: old_row.word_id,
                third: j,
            },
        );
    }
    trie.arrays[parent_array_idx] = new_array;
    trie.layouts[parent_array_idx] = new_parent_layout;
}

/// Drops the top order's temporary `context_id` column, which the run-time
/// layout has no field for.
fn reduce_top_order(trie: &mut Trie) {
    let order = trie.order;
    let old_layout = trie.layout(order);
    let new_layout = run_layout(order, &trie.n_ngrams, order);
    let len = trie.n_ngrams[(order - 1) as usize];
    let mut new_array = PackedArray::new(new_layout.width, len);
    for i in 0..len {
        let row = get_row(&trie.arrays[(order - 1) as usize], &old_layout, i);
        set_row(
            &mut new_array,
            &new_layout,
            i,
            Row {
                prob: row.prob,
                backoff: 0.0,
                word_id: row.word_id,
                third: 0,
            },
        );
    }
    trie.arrays[(order - 1) as usize] = new_array;
    trie.layouts[(order - 1) as usize] = new_layout;
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    const FIXTURE: &str = "\\data\\\nngram 1=5\nngram 2=5\nngram 3=2\n\n\
\\1-grams:\n-1.0\t<unk>\t-0.3\n-1.0\t<s>\t-0.3\n-0.7\ta\t-0.2\n-0.7\tb\t-0.1\n-0.9\tc\t0.0\n\n\
\\2-grams:\n-0.3\t<s> a\t-0.1\n-0.2\ta b\t-0.05\n-0.4\ta c\t-0.2\n-0.1\tb c\t-0.05\n-0.6\tc a\t0.0\n\n\
\\3-grams:\n-0.05\t<s> a b\n-0.1\ta b c\n\n";

    #[test]
    fn builds_a_queryable_trie() {
        let trie = build_from_arpa(3, Cursor::new(FIXTURE)).unwrap();
        assert_eq!(trie.order(), 3);
        assert_eq!(trie.n_grams(1), 5);
        assert_eq!(trie.n_grams(2), 5);
        assert_eq!(trie.n_grams(3), 2);

        let a = trie.word_id("a").unwrap();
        let b = trie.word_id("b").unwrap();
        let c = trie.word_id("c").unwrap();
        let (depth, idx) = trie.descend(&[a, b]);
        assert_eq!(depth, 2);
        let row = trie.row(2, idx);
        assert_eq!(row.word_id, b);

        let (depth3, idx3) = trie.descend(&[a, b, c]);
        assert_eq!(depth3, 3);
        let row3 = trie.row(3, idx3);
        assert_eq!(row3.word_id, c);
        assert_abs_diff_eq!(row3.prob, -0.1, epsilon = 1e-6);
    }

    #[test]
    fn rejects_order_mismatch() {
        let err = build_from_arpa(2, Cursor::new(FIXTURE)).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { .. }));
    }
}
