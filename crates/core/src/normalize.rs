use unicode_normalization::UnicodeNormalization;

/// Characters operators habitually type in place of an ASCII hyphen, including
/// the katakana long vowel mark.
const DASH_FORMS: [char; 8] = [
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}',
    '\u{30FC}',
];

/// Canonicalize a raw slug for comparison. Total; never fails.
///
/// NFKC first (collapses full-width and half-width forms), then a single pass
/// that drops whitespace and zero-width characters, lower-cases, and folds
/// dash-like characters to `-`. A leading `@` (social-handle convention) is
/// stripped last; the strip repeats so that normalize stays idempotent.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.nfkc() {
        if ch.is_whitespace() || ch == '\u{200B}' || ch == '\u{FEFF}' {
            continue;
        }
        if DASH_FORMS.contains(&ch) {
            out.push('-');
            continue;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    while out.starts_with('@') {
        out.remove(0);
    }
    out
}

/// Lookup-time tolerance for operator-entered data: the canonical form first,
/// then the underscore and hyphen swapped spellings. The index stores whatever
/// the sheet had; callers probe each variant in order.
pub fn separator_variants(canonical: &str) -> Vec<String> {
    let mut variants = vec![canonical.to_string()];
    if canonical.contains('_') {
        let v = canonical.replace('_', "-");
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    if canonical.contains('-') {
        let v = canonical.replace('-', "_");
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}
