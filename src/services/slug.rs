//! Slug generation for courses and videos

/// Lowercase ASCII slug: alphanumerics kept, whitespace/`_`/`-` runs become a
/// single hyphen, everything else is dropped.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut prev_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if c.is_whitespace() || c == '_' || c == '-' {
            if !prev_hyphen && !result.is_empty() {
                result.push('-');
                prev_hyphen = true;
            }
        }
    }

    result.trim_end_matches('-').to_string()
}

/// The `n`th slug candidate: `base`, `base-2`, `base-3`, ...
pub fn slug_candidate(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, n)
    }
}

/// Slug base for a title, with a fallback for titles without ASCII letters
pub fn slug_base(title: &str, fallback: &str) -> String {
    let slug = generate_slug(title);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}
