//! Filesystem-safe note names.

/// Lowercase, keep word characters, collapse whitespace and dashes to one `-`.
///
/// Falls back to `"note"` when nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "note".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses() {
        assert_eq!(slugify("Q3 Plan: Ship -- the  Beta!"), "q3-plan-ship-the-beta");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn never_escapes_a_folder() {
        assert_eq!(slugify("../../etc/passwd"), "etcpasswd");
        assert_eq!(slugify("???"), "note");
    }

    #[test]
    fn keeps_unicode_letters() {
        assert_eq!(slugify("Café Ideas"), "café-ideas");
    }
}
