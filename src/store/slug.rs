use crate::error::Result;

const MAX_SLUG_LEN: usize = 255;

/// Derives a URL-safe slug from a display value.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// hyphen, and trims hyphens from both ends. Returns an empty string when the
/// input has no alphanumeric characters at all.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    slug
}

/// Resolves slug collisions by suffixing `-1`, `-2`, ... until `exists`
/// reports the candidate as free.
///
/// The caller's `exists` check must exclude the record being saved, so that
/// re-saving an already-slugged record is idempotent.
pub fn uniquify<F>(base: &str, mut exists: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    if !exists(base)? {
        return Ok(base.to_string());
    }

    let mut counter = 1u64;
    loop {
        let candidate = format!("{base}-{counter}");
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Company A"), "company-a");
        assert_eq!(slugify("Subsidiary 1"), "subsidiary-1");
        assert_eq!(slugify("already-slugged"), "already-slugged");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Big   Corp!!  "), "big-corp");
        assert_eq!(slugify("a___b---c"), "a-b-c");
    }

    #[test]
    fn test_slugify_strips_edges() {
        assert_eq!(slugify("--edge--"), "edge");
        assert_eq!(slugify("(parens)"), "parens");
    }

    #[test]
    fn test_slugify_empty_when_nothing_usable() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_uniquify_no_collision() {
        let taken: Vec<&str> = vec![];
        let slug = uniquify("acme", |s| Ok(taken.contains(&s))).unwrap();
        assert_eq!(slug, "acme");
    }

    #[test]
    fn test_uniquify_counts_up() {
        let taken = ["acme", "acme-1", "acme-2"];
        let slug = uniquify("acme", |s| Ok(taken.contains(&s))).unwrap();
        assert_eq!(slug, "acme-3");
    }
}
