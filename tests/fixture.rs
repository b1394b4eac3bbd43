//! End-to-end scenarios against a small bundled ARPA fixture, covering the
//! full build → query → save/load path.

use std::fs::File;
use std::io::BufReader;

use approx::assert_abs_diff_eq;
use ngram_trie::Trie;

fn load_fixture() -> Trie {
    let file = BufReader::new(File::open("tests/fixtures/tiny.arpa").unwrap());
    Trie::build_from_arpa(3, file).unwrap()
}

#[test]
fn full_trigram_match_returns_its_own_probability() {
    let trie = load_fixture();
    let p = trie.probability(&["the", "cat", "sat"]);
    assert_abs_diff_eq!(p, -0.02, epsilon = 1e-6);
}

#[test]
fn oov_leading_token_falls_back_to_bigram_with_backoff() {
    let trie = load_fixture();
    let p = trie.probability(&["xyz", "cat", "sat"]);
    let expected = -0.05 + -0.01; // "cat sat" bigram's own prob + backoff
    assert_abs_diff_eq!(p, expected, epsilon = 1e-6);
}

#[test]
fn next_word_prefers_higher_probability_child() {
    let trie = load_fixture();
    assert_eq!(trie.next_word(&["the"]), "cat");
}

#[test]
fn empty_context_behaves_like_sentence_start() {
    let trie = load_fixture();
    assert_eq!(trie.next_word(&[]), "the");
    assert_eq!(trie.next_word(&[]), trie.next_word(&["<s>"]));
}

#[test]
fn unresolvable_bigram_context_drops_to_last_token() {
    let trie = load_fixture();
    // "dog the" never occurs as a bigram, so this must drop "dog" and
    // predict from "the" alone.
    assert_eq!(trie.next_word(&["dog", "the"]), trie.next_word(&["the"]));
}

#[test]
fn top_k_returns_fewer_than_k_when_range_is_smaller() {
    let trie = load_fixture();
    let top = trie.top_k(&["the"], 10);
    assert_eq!(top, vec!["cat", "dog"]);
}

#[test]
fn top_k_zero_is_empty() {
    let trie = load_fixture();
    assert!(trie.top_k(&["the"], 0).is_empty());
}

#[test]
fn vocabulary_ids_are_a_permutation_of_hash_order() {
    let trie = load_fixture();
    for word in ["<s>", "the", "cat", "dog", "sat", "mat"] {
        let id = trie.word_id(word).expect("word in fixture vocabulary");
        assert_eq!(trie.word_text(id), word);
    }
    assert_eq!(trie.word_id("not-in-fixture"), None);
}

#[test]
fn save_and_load_roundtrip_preserves_every_query() {
    let trie = load_fixture();
    let mut buf = Vec::new();
    trie.save(&mut buf).unwrap();
    let back = Trie::load(std::io::Cursor::new(buf)).unwrap();

    assert_eq!(back.order(), trie.order());
    for n in 1..=trie.order() {
        assert_eq!(back.n_grams(n), trie.n_grams(n));
    }
    assert_eq!(
        back.probability(&["the", "cat", "sat"]),
        trie.probability(&["the", "cat", "sat"])
    );
    assert_eq!(back.next_word(&["the"]), trie.next_word(&["the"]));
    assert_eq!(back.top_k(&["the"], 10), trie.top_k(&["the"], 10));
}
