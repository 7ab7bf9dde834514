//! Name normalisation used to pick search candidates

use strsim::normalized_levenshtein;

/// Minimum similarity for a candidate name to count as a match
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

const RELEASE_SUFFIXES: [&str; 2] = [" - single", " - ep"];

/// Lowercase, fold punctuation to spaces and collapse whitespace
pub fn normalize(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '!' { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip store-style suffixes such as " - Single"
pub fn strip_release_suffix(name: &str) -> &str {
    let lower = name.to_lowercase();
    for suffix in RELEASE_SUFFIXES {
        if lower.ends_with(suffix) {
            if let Some(stripped) = name
                .len()
                .checked_sub(suffix.len())
                .and_then(|end| name.get(..end))
            {
                return stripped;
            }
        }
    }
    name
}

/// Similarity of two names in `0.0..=1.0`, after normalisation
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize(a), &normalize(b))
}

pub fn names_match(a: &str, b: &str) -> bool {
    similarity(a, b) >= NAME_SIMILARITY_THRESHOLD
}

/// "trip hop" -> "Trip Hop"
pub fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
