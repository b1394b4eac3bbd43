pub mod arpa;

/// A single parsed ARPA row: its token sequence, log10 probability, and
/// backoff weight. `backoff` is `0.0` for rows from the model's top order,
/// which the ARPA format never gives a backoff column (§3 invariant 5).
#[derive(Debug, Clone, PartialEq)]
pub struct ArpaRow {
    pub words: Vec<String>,
    pub log_prob: f32,
    pub backoff: f32,
}
