//! Token text ⇄ stable numeric id (§3, §4.C).
//!
//! Stored as two parallel arrays kept sorted ascending by hash: `hashes` and
//! `texts`. A token's word id is its zero-based index into this ordering.
//! Unlike the reference implementation, [`Vocabulary::id_of`] verifies text
//! equality after a hash match, so two distinct tokens that collide on their
//! 64-bit hash are never confused for each other (§9 open question).

use std::io::Cursor;

/// Truncates a 128-bit MurmurHash3 (x64) digest to its low 64 bits, per §3's
/// "any good non-crypto hash; MurmurHash3 is acceptable".
pub(crate) fn hash_token(text: &str) -> u64 {
    let digest = murmur3::murmur3_x64_128(&mut Cursor::new(text.as_bytes()), 0)
        .expect("hashing an in-memory byte slice cannot fail");
    digest as u64
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    hashes: Vec<u64>,
    texts: Vec<Box<str>>,
}

impl Vocabulary {
    /// Builds a vocabulary from `(hash, text)` pairs in unigram order,
    /// sorting ascending by hash. Panics if two distinct texts collide on
    /// hash (practically never happens for real corpora at this scale, and
    /// would otherwise silently violate the "hashes strictly increasing"
    /// invariant, I3).
    pub(crate) fn build(mut entries: Vec<(u64, Box<str>)>) -> Self {
        entries.sort_unstable_by_key(|(h, _)| *h);
        for w in entries.windows(2) {
            assert!(
                w[0].0 != w[1].0 || w[0].1 == w[1].1,
                "hash collision between distinct tokens {:?} and {:?}; vocabulary invariant I3 violated",
                w[0].1,
                w[1].1
            );
        }
        let (hashes, texts) = entries.into_iter().unzip();
        Self { hashes, texts }
    }

    pub(crate) fn from_parts(hashes: Vec<u64>, texts: Vec<Box<str>>) -> Self {
        debug_assert_eq!(hashes.len(), texts.len());
        debug_assert!(hashes.windows(2).all(|w| w[0] <= w[1]), "hashes must be sorted ascending (I3)");
        Self { hashes, texts }
    }

    pub(crate) fn hashes(&self) -> &[u64] {
        &self.hashes
    }

    pub(crate) fn texts(&self) -> &[Box<str>] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Looks up `text`'s word id. Returns `None` both on an outright miss
    /// and on a hash collision with a different token (the reference
    /// implementation's documented weakness, fixed here).
    pub fn id_of(&self, text: &str) -> Option<u32> {
        let hash = hash_token(text);
        let idx = self.hashes.binary_search(&hash).ok()?;
        if self.texts[idx].as_ref() == text {
            Some(idx as u32)
        } else {
            None
        }
    }

    pub fn text_of(&self, id: u32) -> &str {
        &self.texts[id as usize]
    }
}
