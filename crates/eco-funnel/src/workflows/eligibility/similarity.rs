use std::collections::HashSet;

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set Jaccard similarity between two free-text addresses, in `[0, 1]`.
///
/// Either side tokenizing to nothing scores 0 rather than dividing by zero;
/// an address with no usable tokens can never be matched with confidence.
pub fn address_similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.len() + right.len() - intersection;
    intersection as f64 / union as f64
}
