//! Transcript stitching
//!
//! Consecutive segments share a fixed audio overlap, so their transcripts
//! repeat a few words at the boundary. Stitching removes the duplicated
//! prefix of each new segment by matching token runs across the boundary,
//! case- and punctuation-insensitively, longest run first.

/// Strip leading/trailing non-alphanumerics and lowercase, for comparison
/// only. Retained tokens keep their original casing and punctuation.
fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Maximum boundary run considered; longer overlaps than this do not occur
/// with 250ms of shared audio.
const MAX_OVERLAP_TOKENS: usize = 20;

/// Remove from `next` the longest token run that duplicates the tail of
/// `previous`. Returns `next` unchanged when no run matches: a small
/// duplicated phrase is safer than dropping real speech.
pub fn trim_overlap(previous: &str, next: &str) -> String {
    if previous.is_empty() {
        return next.to_string();
    }

    let prev_tokens: Vec<&str> = previous.split_whitespace().collect();
    let next_tokens: Vec<&str> = next.split_whitespace().collect();

    let max_comparable = MAX_OVERLAP_TOKENS
        .min(prev_tokens.len())
        .min(next_tokens.len());

    // Longest match first: a genuine long overlap must not be pre-empted
    // by a shorter spurious match on repeated common words
    for overlap in (1..=max_comparable).rev() {
        let matches = prev_tokens[prev_tokens.len() - overlap..]
            .iter()
            .zip(&next_tokens[..overlap])
            .all(|(prev, next)| {
                let prev = normalize_token(prev);
                !prev.is_empty() && prev == normalize_token(next)
            });
        if matches {
            return next_tokens[overlap..].join(" ");
        }
    }

    next.to_string()
}

/// Fold `trim_overlap` over segment transcripts in sequence order,
/// producing one continuous text.
pub fn stitch_transcripts<'a>(transcripts: impl IntoIterator<Item = &'a str>) -> String {
    let mut stitched = String::new();
    for transcript in transcripts {
        let trimmed = trim_overlap(&stitched, transcript);
        if stitched.is_empty() {
            stitched = trimmed;
        } else if !trimmed.is_empty() {
            stitched.push(' ');
            stitched.push_str(&trimmed);
        }
    }
    stitched.trim().to_string()
}
