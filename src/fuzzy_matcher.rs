use lazy_static::lazy_static;
use regex::Regex;
use strsim::jaro_winkler;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace regex");
}

/// Narrow seam for name similarity so the matching heuristic can be swapped
/// without touching the synthesizer or the relationship inference.
pub trait NameSimilarity: Send + Sync {
    /// Returns a score between 0.0 and 1.0 (higher = more similar)
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Fuzzy matcher for question tokens and schema identifiers
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) for considering two names as matches
    pub similarity_threshold: f64,
    /// Whether to normalize names before comparison
    pub normalize: bool,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.88,
            normalize: true,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            normalize: true,
        }
    }

    /// Normalize a name for fuzzy matching
    /// - Converts to lowercase
    /// - Treats `_` and `-` as word separators
    /// - Removes remaining punctuation
    /// - Normalizes whitespace
    pub fn normalize_string(&self, s: &str) -> String {
        if !self.normalize {
            return s.to_lowercase();
        }
        normalize_identifier(s)
    }
}

impl NameSimilarity for FuzzyMatcher {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let norm1 = self.normalize_string(a);
        let norm2 = self.normalize_string(b);
        if norm1.is_empty() || norm2.is_empty() {
            return 0.0;
        }

        // Jaro-Winkler favours shared prefixes, which suits identifiers
        let jw_score = jaro_winkler(&norm1, &norm2);

        // Bonus when one name contains the other ("amount" vs "total amount"),
        // scaled down as the lengths diverge
        let is_substring = norm1.contains(&norm2) || norm2.contains(&norm1);
        let substring_bonus = if is_substring {
            let len_diff = (norm1.len() as f64 - norm2.len() as f64).abs();
            let max_len = norm1.len().max(norm2.len()) as f64;
            (1.0 - (len_diff / max_len)) * 0.1
        } else {
            0.0
        };

        (jw_score + substring_bonus).min(1.0)
    }
}

/// Lowercase an identifier and split it into space-separated words.
pub fn normalize_identifier(s: &str) -> String {
    let spaced: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    WHITESPACE.replace_all(spaced.trim(), " ").to_string()
}

/// Reduce an English plural to its singular form.
///
/// Only the regular inflections that show up in table names are handled.
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if w.len() <= 3 {
        return w;
    }
    if let Some(stem) = w.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if w.ends_with(suffix) {
            return w[..w.len() - 2].to_string();
        }
    }
    if w.ends_with("ss") || w.ends_with("us") || w.ends_with("is") {
        return w;
    }
    match w.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("Order_Items"), "order items");
        assert_eq!(normalize_identifier("  total-amount "), "total amount");
        assert_eq!(normalize_identifier("price ($)"), "price");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("customers"), "customer");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("inventory"), "inventory");
        assert_eq!(singularize("order_items"), "order_item");
    }

    #[test]
    fn test_similarity() {
        let matcher = FuzzyMatcher::default();
        assert_eq!(matcher.similarity("customer", "customer"), 1.0);
        assert!(matcher.similarity("custmer", "customer") > 0.9);
        assert!(matcher.similarity("product", "customer") < 0.8);
        assert_eq!(matcher.similarity("", "customer"), 0.0);
    }
}
