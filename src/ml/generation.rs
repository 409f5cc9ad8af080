// ============================================================
// Next-Token Selection
// ============================================================
// The rules the greedy decoder honors, parsed out of the
// generation kwargs that survived filtering:
//
//   max_length             — hard cap on the generated sequence
//   min_length             — the end token is banned until the
//                            sequence reaches this length
//   no_repeat_ngram_size   — a token is banned if emitting it
//                            would repeat an n-gram already in
//                            the sequence
//   decoder_start_token_id — first decoder token (seq2seq only)
//
// Selection itself runs on a CPU-side score vector: scan for
// the best non-banned entry.

use std::collections::HashSet;

use crate::ml::policy::GenKwargs;

#[derive(Debug, Clone)]
pub struct GenerationSpec {
    pub max_length:      usize,
    pub min_length:      usize,
    pub no_repeat_ngram: Option<usize>,
    pub decoder_start:   Option<u32>,
    pub eos_token_id:    Option<u32>,
}

impl GenerationSpec {
    /// Resolve a spec from filtered kwargs plus model fallbacks.
    pub fn from_kwargs(
        kwargs: &GenKwargs,
        fallback_max_length: usize,
        eos_token_id: Option<u32>,
        default_decoder_start: Option<u32>,
    ) -> Self {
        Self {
            max_length: kwargs
                .usize_value("max_length")
                .unwrap_or(fallback_max_length)
                .max(1),
            min_length: kwargs.usize_value("min_length").unwrap_or(0),
            no_repeat_ngram: kwargs
                .usize_value("no_repeat_ngram_size")
                .filter(|&n| n > 0),
            decoder_start: kwargs
                .u32_value("decoder_start_token_id")
                .or(default_decoder_start),
            eos_token_id,
        }
    }
}

/// Pick the next token id from per-vocabulary scores, honoring
/// the min-length EOS ban and the no-repeat-ngram ban.
pub fn select_next(scores: &[f32], generated: &[u32], spec: &GenerationSpec) -> u32 {
    let mut banned: HashSet<u32> = HashSet::new();

    if generated.len() < spec.min_length {
        if let Some(eos) = spec.eos_token_id {
            banned.insert(eos);
        }
    }
    if let Some(n) = spec.no_repeat_ngram {
        banned.extend(repeated_ngram_completions(generated, n));
    }

    let mut best: Option<(u32, f32)> = None;
    for (id, &score) in scores.iter().enumerate() {
        let id = id as u32;
        if banned.contains(&id) {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((id, score));
        }
    }

    match best {
        Some((id, _)) => id,
        // every candidate banned: fall back to the raw argmax
        None => argmax(scores),
    }
}

fn argmax(scores: &[f32]) -> u32 {
    let mut best = 0usize;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best as u32
}

/// Tokens that would complete an n-gram already present in the
/// sequence: for each window matching the last n-1 tokens, its
/// final token is banned.
fn repeated_ngram_completions(generated: &[u32], n: usize) -> HashSet<u32> {
    let mut banned = HashSet::new();
    if n == 0 || generated.len() + 1 < n {
        return banned;
    }
    let prefix = &generated[generated.len() + 1 - n..];
    for window in generated.windows(n) {
        if &window[..n - 1] == prefix {
            banned.insert(window[n - 1]);
        }
    }
    banned
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GenerationSpec {
        GenerationSpec {
            max_length: 10,
            min_length: 0,
            no_repeat_ngram: None,
            decoder_start: None,
            eos_token_id: Some(2),
        }
    }

    #[test]
    fn test_greedy_picks_argmax() {
        let scores = [0.1, 0.9, 0.3];
        assert_eq!(select_next(&scores, &[], &spec()), 1);
    }

    #[test]
    fn test_eos_banned_below_min_length() {
        let scores = [0.1, 0.2, 0.9]; // eos (2) scores highest
        let mut s = spec();
        s.min_length = 3;
        assert_eq!(select_next(&scores, &[5], &s), 1);
        // once long enough, eos wins again
        assert_eq!(select_next(&scores, &[5, 6, 7], &s), 2);
    }

    #[test]
    fn test_no_repeat_bigram_ban() {
        // sequence ends with 4; bigram (4, 5) already occurred,
        // so 5 is banned even though it scores highest
        let scores = [0.0, 0.1, 0.0, 0.0, 0.2, 0.9];
        let mut s = spec();
        s.no_repeat_ngram = Some(2);
        assert_eq!(select_next(&scores, &[4, 5, 1, 4], &s), 4);
    }

    #[test]
    fn test_ngram_ban_needs_full_prefix() {
        let scores = [0.0, 0.1, 0.0, 0.0, 0.2, 0.9];
        let mut s = spec();
        s.no_repeat_ngram = Some(3);
        // trigram prefix (1, 4) never followed by 5 → no ban
        assert_eq!(select_next(&scores, &[4, 5, 1, 4], &s), 5);
    }

    #[test]
    fn test_kwargs_resolution_with_fallbacks() {
        let kwargs = GenKwargs::new()
            .with("max_length", 24)
            .with("no_repeat_ngram_size", 3);
        let s = GenerationSpec::from_kwargs(&kwargs, 64, Some(2), Some(0));
        assert_eq!(s.max_length, 24);
        assert_eq!(s.min_length, 0);
        assert_eq!(s.no_repeat_ngram, Some(3));
        assert_eq!(s.decoder_start, Some(0));

        let s = GenerationSpec::from_kwargs(&GenKwargs::new(), 64, None, None);
        assert_eq!(s.max_length, 64);
        assert!(s.decoder_start.is_none());
    }

    #[test]
    fn test_decoder_start_kwarg_wins_over_default() {
        let kwargs = GenKwargs::new().with("decoder_start_token_id", 9);
        let s = GenerationSpec::from_kwargs(&kwargs, 64, None, Some(0));
        assert_eq!(s.decoder_start, Some(9));
    }
}
