//! Line-oriented ARPA-format reader (§6.1).
//!
//! Parses the `\data\` header, then each `\n-grams:` section in textual
//! order, yielding one [`ArpaRow`] per line through [`ArpaReader::next_section`].
//! This generalizes the teacher's `ArpaReader` state machine (count header ->
//! per-order section loop -> blank-line boundary) but drops its generic
//! `NGramProcessor`/FST-indexing machinery: every row here resolves straight
//! to `String` tokens that the trie builder turns into vocabulary/word-id
//! entries, rather than feeding an alternate FST search path.
//!
//! An arpa file contains multiple sections, each ending with a blank line.
//! The first section's header is `\data\`, followed by `ngram <order>=<count>`
//! lines. Then follow `order` many `\<n>-grams:` sections; every section but
//! the last carries an optional trailing backoff column.

use std::io::BufRead;

use super::ArpaRow;

#[derive(thiserror::Error, Debug)]
pub enum ArpaReadError {
    #[error("the \\data\\ header is missing")]
    DataHeaderMissing,
    #[error("ngram count section could not be parsed")]
    NgramCountsBroken,
    #[error("ngram counts are missing in the \\data\\ section")]
    NgramCountsMissing,
    #[error("a ngram line is malformed: {0:?}")]
    MalformedLine(String),
    #[error("a ngram section is missing its header")]
    NGramSectionHeaderMissing,
    #[error("ngram section header mismatch: got {0:?}, expected {1:?}")]
    NGramSectionHeaderMismatch(String, String),
    #[error("observed ngram count does not match the header's declared count")]
    NgramCountsMismatch,
    #[error("a section boundary (blank line) is missing")]
    SectionBoundaryMissing,
    #[error("an I/O error occurred while reading the arpa file")]
    IoError(#[from] std::io::Error),
}

pub struct ArpaReader<B> {
    lines: std::io::Lines<B>,
    counts: Vec<u64>,
    cur_order: u16,
}

impl<B: BufRead> ArpaReader<B> {
    const DATA_HEADER: &'static str = "\\data\\";
    const NGRAM_KEY: &'static str = "ngram ";

    /// Constructs the reader and parses the `\data\` count header.
    pub fn new(reader: B) -> Result<Self, ArpaReadError> {
        let mut lines = reader.lines();
        match lines.next().transpose()?.as_deref() {
            Some(Self::DATA_HEADER) => {}
            _ => return Err(ArpaReadError::DataHeaderMissing),
        }
        let mut counts = Vec::new();
        while let Some(line) = lines.next().transpose()? {
            if line.trim().is_empty() {
                break;
            }
            if let Some(suffix) = line.strip_prefix(Self::NGRAM_KEY) {
                counts.push(parse_count_line(suffix)?);
            }
        }
        if counts.is_empty() {
            return Err(ArpaReadError::NgramCountsMissing);
        }
        Ok(Self {
            lines,
            counts,
            cur_order: 1,
        })
    }

    pub fn order(&self) -> u16 {
        self.counts.len() as u16
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Reads the next `\n-grams:` section in full. `None` once all
    /// `order()` sections have already been consumed.
    pub fn next_section(&mut self) -> Result<Option<Vec<ArpaRow>>, ArpaReadError> {
        if self.cur_order as usize > self.counts.len() {
            return Ok(None);
        }
        let order = self.cur_order;
        let expected_header = format!("\\{order}-grams:");
        match self.lines.next().transpose()? {
            Some(line) if line == expected_header => {}
            Some(line) => {
                return Err(ArpaReadError::NGramSectionHeaderMismatch(
                    line,
                    expected_header,
                ))
            }
            None => return Err(ArpaReadError::NGramSectionHeaderMissing),
        }

        let has_backoff = order != self.order();
        let cardinality = self.counts[(order - 1) as usize];
        let mut rows = Vec::with_capacity(cardinality as usize);
        for _ in 0..cardinality {
            let line = self
                .lines
                .next()
                .transpose()?
                .ok_or(ArpaReadError::NgramCountsMismatch)?;
            rows.push(parse_row(&line, has_backoff)?);
        }
        if rows.len() as u64 != cardinality {
            return Err(ArpaReadError::NgramCountsMismatch);
        }
        match self.lines.next().transpose()? {
            Some(line) if line.trim().is_empty() => {}
            Some(_) => return Err(ArpaReadError::SectionBoundaryMissing),
            // Tolerate EOF right after the final section (no trailing `\end\`).
            None if order == self.order() => {}
            None => return Err(ArpaReadError::SectionBoundaryMissing),
        }
        self.cur_order += 1;
        Ok(Some(rows))
    }
}

fn parse_count_line(suffix: &str) -> Result<u64, ArpaReadError> {
    let mut parts = suffix.split('=');
    let _order = parts
        .next()
        .ok_or(ArpaReadError::NgramCountsBroken)?
        .parse::<usize>()
        .map_err(|_| ArpaReadError::NgramCountsBroken)?;
    parts
        .next()
        .ok_or(ArpaReadError::NgramCountsBroken)?
        .parse::<u64>()
        .map_err(|_| ArpaReadError::NgramCountsBroken)
}

fn parse_row(line: &str, has_backoff: bool) -> Result<ArpaRow, ArpaReadError> {
    let mut pieces = line.split_ascii_whitespace();
    let log_prob = pieces
        .next()
        .and_then(|s| s.parse::<f32>().ok())
        .ok_or_else(|| ArpaReadError::MalformedLine(line.to_string()))?;
    if has_backoff {
        let mut rest: Vec<&str> = pieces.collect();
        let backoff = rest
            .pop()
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or_else(|| ArpaReadError::MalformedLine(line.to_string()))?;
        let words = rest.into_iter().map(String::from).collect();
        Ok(ArpaRow {
            words,
            log_prob,
            backoff,
        })
    } else {
        let words = pieces.map(String::from).collect();
        Ok(ArpaRow {
            words,
            log_prob,
            backoff: 0.0,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    const TINY_ARPA: &str = "\\data\\\nngram 1=3\nngram 2=2\n\n\\1-grams:\n-1.0\t<s>\t-0.5\n-1.0\ta\t-0.3\n-1.0\tb\n\n\\2-grams:\n-0.5\t<s> a\n-0.2\ta b\n\n";

    #[test]
    fn reads_counts_and_sections() {
        let mut reader = ArpaReader::new(Cursor::new(TINY_ARPA)).unwrap();
        assert_eq!(reader.order(), 2);
        assert_eq!(reader.counts(), &[3, 2]);
        let unigrams = reader.next_section().unwrap().unwrap();
        assert_eq!(unigrams.len(), 3);
        assert_eq!(unigrams[0].words, vec!["<s>"]);
        assert_eq!(unigrams[0].backoff, -0.5);
        assert_eq!(unigrams[2].backoff, 0.0);

        let bigrams = reader.next_section().unwrap().unwrap();
        assert_eq!(bigrams.len(), 2);
        assert_eq!(bigrams[1].words, vec!["a", "b"]);
        assert_eq!(bigrams[1].backoff, 0.0);

        assert!(reader.next_section().unwrap().is_none());
    }

    #[test]
    fn rejects_missing_data_header() {
        let err = ArpaReader::new(Cursor::new("not the header\n")).unwrap_err();
        assert!(matches!(err, ArpaReadError::DataHeaderMissing));
    }

    #[test]
    fn rejects_section_header_mismatch() {
        let bad = "\\data\\\nngram 1=1\n\n\\2-grams:\n-1.0 x\n\n";
        let mut reader = ArpaReader::new(Cursor::new(bad)).unwrap();
        let err = reader.next_section().unwrap_err();
        assert!(matches!(err, ArpaReadError::NGramSectionHeaderMismatch(_, _)));
    }
}
