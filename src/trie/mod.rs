//! The trie store: one [`PackedArray`] per n-gram order plus the shared
//! [`Vocabulary`] (§3, §4.D).
//!
//! Record widths depend on the per-order counts (`n_ngrams`), which are
//! known once at construction time — per the "Dynamic layout discovery"
//! design note, they are computed once into [`RowLayout`]s and cached
//! rather than recomputed on every access.
//!
//! This crate extends the reference schema with a `backoff` column on every
//! order below the top one (see `SPEC_FULL.md` §4.E "Schema extension"), so
//! that [`query::probability`] can apply genuine Katz backoff instead of the
//! reference implementation's documented-but-unreachable claim to do so.

pub(crate) mod builder;
pub mod query;

use std::io::{BufRead, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::headers::{self, Header};
use crate::packed_array::PackedArray;
use crate::vocab::Vocabulary;
use crate::Error;

/// Number of bits needed to represent the integers `0..x` (i.e. `x` distinct
/// values), clamped to a minimum of 1 so no field is ever zero-width.
pub(crate) fn ceil_log2(x: u64) -> u8 {
    if x <= 1 {
        1
    } else {
        (64 - (x - 1).leading_zeros()) as u8
    }
}

/// Which fields a row of a given order carries, and their bit widths.
/// Every row has a 32-bit `prob`. `backoff` is present on every order below
/// the top one (orders `<N` have an ARPA backoff column). `word_id` is
/// present on every order above the first (order 1's row index *is* its
/// word id). `third` (first_child_index at run time, or during construction
/// `context_id` — generally a *different* bit width, since one points
/// forward into the next order and the other back into the previous one;
/// see `build_layout`/`builder.rs::back_patch`) is present on every order
/// below the top one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowLayout {
    pub(crate) width: u8,
    pub(crate) w_backoff: u8,
    pub(crate) w_word_id: u8,
    pub(crate) w_third: u8, // fci (run) or context_id (build), same bit slot
    pub(crate) has_backoff: bool,
    pub(crate) has_word_id: bool,
    pub(crate) has_third: bool,
}

impl RowLayout {
    fn widths(&self) -> Vec<u8> {
        let mut w = vec![32u8];
        if self.has_backoff {
            w.push(self.w_backoff);
        }
        if self.has_word_id {
            w.push(self.w_word_id);
        }
        if self.has_third {
            w.push(self.w_third);
        }
        w
    }

    /// Index of the `word_id` field within a row's unpacked field vector
    /// (meaningless if `!has_word_id`).
    pub(crate) fn word_id_field_index(&self) -> usize {
        1 + self.has_backoff as usize
    }

    /// Index of the `third` (fci/context_id) field within a row's unpacked
    /// field vector (meaningless if `!has_third`).
    pub(crate) fn third_field_index(&self) -> usize {
        1 + self.has_backoff as usize + self.has_word_id as usize
    }
}

/// The run-time (final) layout for order `n` (1-indexed) of a model with
/// `order` total orders and per-order unigram..top-order counts `n_ngrams`.
///
/// The top order never carries a backoff or child-pointer column (the ARPA
/// format gives it no backoff, and it has no children to point at); order 1
/// never carries a `word_id` column (its row index *is* the word id). A
/// degenerate `order == 1` model is therefore both at once: just a bare
/// probability per word.
pub(crate) fn run_layout(order: u16, n_ngrams: &[u64], n: u16) -> RowLayout {
    let is_top = n == order;
    let is_unigram = n == 1;
    let has_backoff = !is_top;
    let has_word_id = !is_unigram;
    let has_third = !is_top;
    let w_word_id = if has_word_id { ceil_log2(n_ngrams[0]) } else { 0 };
    let w_backoff = if has_backoff { 32 } else { 0 };
    let w_third = if has_third {
        ceil_log2(n_ngrams[n as usize] + 1)
    } else {
        0
    };
    RowLayout {
        width: 32 + w_backoff + w_word_id + w_third,
        w_backoff,
        w_word_id,
        w_third,
        has_backoff,
        has_word_id,
        has_third,
    }
}

/// The build-time (temporary) layout for order `n` (2..=order): every order
/// carries a `context_id` column sized to its *parent's* count `N(n-1)` (the
/// row index `context_id` points into array `n-1`), per the unconditional
/// `W_build(n>=2) = 32 + w_word_id + ceil(log2(N(n-1)+1))` formula — this
/// holds for the top order exactly as it does for every middle order, since
/// `context_id`'s range never depends on which order is being built, only on
/// the parent it points into.
///
/// This is generally a *different* width than the order's own run layout
/// (whose `third` column instead points forward into array `n+1`, sized to
/// `N(n+1)`): `N(n-1)` and `N(n+1)` are unrelated counts. Reusing the run
/// layout's width here would silently truncate `context_id` whenever
/// `N(n-1)` needs more bits than `N(n+1)+1` does, so `back_patch` always
/// performs a width-changing rewrite into the run layout rather than
/// reinterpreting this column in place (see `builder.rs`).
pub(crate) fn build_layout(order: u16, n_ngrams: &[u64], n: u16) -> RowLayout {
    debug_assert!(n >= 2);
    let is_top = n == order;
    let w_word_id = ceil_log2(n_ngrams[0]);
    let w_ctx = ceil_log2(n_ngrams[(n - 2) as usize] + 1);
    let w_backoff = if is_top { 0 } else { 32 };
    RowLayout {
        width: 32 + w_backoff + w_word_id + w_ctx,
        w_backoff,
        w_word_id,
        w_third: w_ctx,
        has_backoff: !is_top,
        has_word_id: true,
        has_third: true,
    }
}

/// A decoded trie row; absent fields (per a given order's [`RowLayout`])
/// read back as `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Row {
    pub(crate) prob: f32,
    pub(crate) backoff: f32,
    pub(crate) word_id: u32,
    pub(crate) third: u64, // first_child_index, or context_id during build
}

fn get_row(array: &PackedArray, layout: &RowLayout, i: u64) -> Row {
    let widths = layout.widths();
    let fields = array.get_fields(i, &widths);
    let mut idx = 0;
    let prob = f32::from_bits(fields[idx] as u32);
    idx += 1;
    let backoff = if layout.has_backoff {
        let v = f32::from_bits(fields[idx] as u32);
        idx += 1;
        v
    } else {
        0.0
    };
    let word_id = if layout.has_word_id {
        let v = fields[idx] as u32;
        idx += 1;
        v
    } else {
        i as u32
    };
    let third = if layout.has_third { fields[idx] } else { 0 };
    Row {
        prob,
        backoff,
        word_id,
        third,
    }
}

fn set_row(array: &mut PackedArray, layout: &RowLayout, i: u64, row: Row) {
    let widths = layout.widths();
    let mut fields = vec![row.prob.to_bits() as u64];
    if layout.has_backoff {
        fields.push(row.backoff.to_bits() as u64);
    }
    if layout.has_word_id {
        fields.push(row.word_id as u64);
    }
    if layout.has_third {
        fields.push(row.third);
    }
    array.set_fields(i, &fields, &widths);
}

/// The bit-packed reverse trie: per-order arrays plus the vocabulary that
/// gives their `word_id` columns meaning.
pub struct Trie {
    pub(crate) order: u16,
    pub(crate) n_ngrams: Vec<u64>,
    pub(crate) vocab: Vocabulary,
    pub(crate) arrays: Vec<PackedArray>,
    pub(crate) layouts: Vec<RowLayout>,
}

impl Trie {
    /// Builds a trie from an ARPA-format `source` declaring `order` orders
    /// (§4.E.1, §6.3).
    pub fn build_from_arpa(order: u16, source: impl BufRead) -> Result<Trie, Error> {
        builder::build_from_arpa(order, source)
    }

    /// Writes the binary snapshot format of §6.2: a header, the vocabulary,
    /// then each order's packed array in turn.
    pub fn save(&self, mut sink: impl Write) -> Result<(), Error> {
        Header {
            order: self.order,
            n_ngrams: self.n_ngrams.clone(),
        }
        .write(&mut sink)?;

        for (&hash, text) in self.vocab.hashes().iter().zip(self.vocab.texts()) {
            sink.write_u64::<LittleEndian>(hash)?;
            let bytes = text.as_bytes();
            sink.write_u32::<LittleEndian>(bytes.len() as u32)?;
            sink.write_all(bytes)?;
        }

        for array in &self.arrays {
            array.write(&mut sink)?;
        }
        Ok(())
    }

    /// Reads back a snapshot written by [`Trie::save`].
    pub fn load(mut input: impl Read) -> Result<Trie, Error> {
        let header = Header::read(&mut input)?;
        let order = header.order;
        let n_ngrams = header.n_ngrams;
        let n_words = n_ngrams[0];

        let mut hashes = Vec::with_capacity(n_words as usize);
        let mut texts = Vec::with_capacity(n_words as usize);
        for _ in 0..n_words {
            let hash = input
                .read_u64::<LittleEndian>()
                .map_err(|e| headers::map_eof(e, "vocabulary hash"))?;
            let len = input
                .read_u32::<LittleEndian>()
                .map_err(|e| headers::map_eof(e, "vocabulary text length"))?;
            let mut buf = vec![0u8; len as usize];
            input
                .read_exact(&mut buf)
                .map_err(|e| headers::map_eof(e, "vocabulary text"))?;
            let text = String::from_utf8(buf)
                .map_err(|_| Error::InvalidArpa("vocabulary text is not valid UTF-8".to_string()))?;
            hashes.push(hash);
            texts.push(text.into_boxed_str());
        }
        let vocab = Vocabulary::from_parts(hashes, texts);

        let mut arrays = Vec::with_capacity(order as usize);
        let mut layouts = Vec::with_capacity(order as usize);
        for n in 1..=order {
            let array =
                PackedArray::read(&mut input).map_err(|e| headers::map_eof(e, "array body"))?;
            layouts.push(run_layout(order, &n_ngrams, n));
            arrays.push(array);
        }

        Ok(Trie {
            order,
            n_ngrams,
            vocab,
            arrays,
            layouts,
        })
    }

    pub(crate) fn layout(&self, n: u16) -> RowLayout {
        self.layouts[(n - 1) as usize]
    }

    pub(crate) fn row(&self, n: u16, i: u64) -> Row {
        get_row(&self.arrays[(n - 1) as usize], &self.layout(n), i)
    }

    pub fn order(&self) -> u16 {
        self.order
    }

    pub fn n_grams(&self, order: u16) -> u64 {
        self.n_ngrams[(order - 1) as usize]
    }

    pub fn word_id(&self, text: &str) -> Option<u32> {
        self.vocab.id_of(text)
    }

    pub fn word_text(&self, id: u32) -> &str {
        self.vocab.text_of(id)
    }

    /// Path-walk descent shared by construction (§4.E.1) and querying
    /// (§4.E.2-4): follows `word_ids` from order 1 as deep as possible,
    /// returning the depth reached and the row index at that depth.
    pub(crate) fn descend(&self, word_ids: &[u32]) -> (usize, u64) {
        if word_ids.is_empty() {
            return (0, 0);
        }
        let mut row_index = word_ids[0] as u64;
        for level in 1..word_ids.len() {
            let n = level as u16; // order of the array we search *into* is level+1
            let parent = self.row(n, row_index);
            let next = self.row(n, row_index + 1);
            let (lo, hi) = (parent.third, next.third);
            let child_layout = self.layout(n + 1);
            let widths = child_layout.widths();
            let target = word_ids[level];
            let word_id_field_index = child_layout.word_id_field_index();
            match self.arrays[level].bsearch_by(lo, hi, &widths, |f| {
                f[word_id_field_index].cmp(&(target as u64))
            }) {
                Some(idx) => row_index = idx,
                None => return (level, row_index),
            }
        }
        (word_ids.len(), row_index)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ceil_log2_matches_expectations() {
        assert_eq!(ceil_log2(0), 1);
        assert_eq!(ceil_log2(1), 1);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(256), 8);
        assert_eq!(ceil_log2(257), 9);
    }

    #[test]
    fn build_layout_sizes_context_id_to_parent_count_not_child_count() {
        // order 3 model, N1=6, N2=5, N3=2: array 2's context_id points into
        // array 1 (6 rows, needs 3 bits), not array 3 (2 rows, would fit in
        // 2 bits under the old, buggy child-count formula).
        let n_ngrams = [6u64, 5, 2];
        let build = build_layout(3, &n_ngrams, 2);
        assert_eq!(build.w_third, ceil_log2(n_ngrams[0] + 1));
        assert_ne!(build.w_third, ceil_log2(n_ngrams[2] + 1));
    }

    #[test]
    fn row_get_set_roundtrip_all_shapes() {
        let n_ngrams = [10u64, 20, 15];
        for n in 1..=3u16 {
            let layout = run_layout(3, &n_ngrams, n);
            let mut arr = PackedArray::new(layout.width, 4);
            let row = Row {
                prob: -1.25,
                backoff: -0.5,
                word_id: 7,
                third: 9,
            };
            set_row(&mut arr, &layout, 1, row);
            let back = get_row(&arr, &layout, 1);
            assert_eq!(back.prob, row.prob);
            if layout.has_backoff {
                assert_eq!(back.backoff, row.backoff);
            }
            if layout.has_word_id {
                assert_eq!(back.word_id, row.word_id);
            }
            if layout.has_third {
                assert_eq!(back.third, row.third);
            }
        }
    }

    #[test]
    fn save_load_roundtrip_preserves_queries() {
        const FIXTURE: &str = "\\data\\\nngram 1=4\nngram 2=3\n\n\
\\1-grams:\n-1.0\t<s>\t-0.3\n-0.7\ta\t-0.2\n-0.7\tb\t-0.1\n-0.9\tc\t0.0\n\n\
\\2-grams:\n-0.3\t<s> a\n-0.2\ta b\n-0.1\tb c\n\n";
        let trie = Trie::build_from_arpa(2, std::io::Cursor::new(FIXTURE)).unwrap();
        let mut buf = Vec::new();
        trie.save(&mut buf).unwrap();
        let back = Trie::load(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(back.order(), trie.order());
        assert_eq!(back.n_grams(1), trie.n_grams(1));
        assert_eq!(back.n_grams(2), trie.n_grams(2));
        assert_eq!(back.next_word(&["a"]), trie.next_word(&["a"]));
        assert_eq!(back.probability(&["a", "b"]), trie.probability(&["a", "b"]));
    }
}
