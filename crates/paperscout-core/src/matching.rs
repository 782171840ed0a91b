use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Normalize a title into a lookup key: lowercase ASCII alphanumerics only.
///
/// DBLP titles end with a period and may carry HTML entities, while the
/// classifier tends to echo titles back without them. Both sides reduce to
/// the same key here.
///
/// Steps (order matters):
/// 1. Unescape common HTML entities
/// 2. Transliterate Greek letters (NFKD leaves them non-ASCII)
/// 3. Unicode NFKD normalization (decomposes accents)
/// 4. Strip to ASCII
/// 5. Keep only `[a-zA-Z0-9]`, lowercased
pub fn normalize_title(title: &str) -> String {
    let title = title
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let title = title
        .replace(['α', 'Α'], "alpha")
        .replace(['β', 'Β'], "beta")
        .replace(['γ', 'Γ'], "gamma")
        .replace(['δ', 'Δ'], "delta")
        .replace(['ε', 'Ε'], "epsilon")
        .replace(['λ', 'Λ'], "lambda")
        .replace(['μ', 'Μ'], "mu")
        .replace(['π', 'Π'], "pi")
        .replace(['σ', 'Σ'], "sigma")
        .replace(['τ', 'Τ'], "tau")
        .replace(['φ', 'Φ'], "phi")
        .replace(['ω', 'Ω'], "omega");

    let normalized: String = title.nfkd().filter(|c| c.is_ascii()).collect();

    static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());
    NON_ALNUM.replace_all(&normalized, "").to_lowercase()
}

/// Strip the bullet and whitespace the classifier sometimes keeps from the
/// prompt's title list.
pub fn clean_returned_title(title: &str) -> &str {
    let trimmed = title.trim();
    trimmed
        .strip_prefix("- ")
        .map(str::trim_start)
        .unwrap_or(trimmed)
}
