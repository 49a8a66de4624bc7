//! URL identifiers derived from titles and names.

use time::OffsetDateTime;

pub const SLUG_BASE_MAX_LEN: usize = 180;

/// Post slugs that would be shadowed by fixed routes.
pub const RESERVED_POST_SLUGS: &[&str] = &[
    "autosave", "drafts", "create", "category", "tag", "series", "comment",
];

/// Lowercase ASCII words joined by dashes, or `fallback` if nothing is left.
#[must_use]
pub fn slugify(text: &str, fallback: &str) -> String {
    let slug = ::slug::slugify(text);
    let slug = if slug.len() > SLUG_BASE_MAX_LEN {
        slug[..SLUG_BASE_MAX_LEN].trim_end_matches('-').to_owned()
    } else {
        slug
    };

    if slug.is_empty() {
        fallback.to_owned()
    } else {
        slug
    }
}

/// Slugs to try for a new row: the bare base, then the base suffixed with the
/// creation timestamp, then that with a running counter.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SlugCandidates {
    base: String,
    stamp: String,
    next: usize,
}

impl SlugCandidates {
    #[must_use]
    pub fn new(base: String, created_at: OffsetDateTime) -> Self {
        Self {
            base,
            stamp: timestamp_suffix(created_at),
            next: 0,
        }
    }

    #[must_use]
    pub fn for_post(title: &str, created_at: OffsetDateTime) -> Self {
        let mut candidates = Self::new(slugify(title, "post"), created_at);
        candidates.next = usize::from(RESERVED_POST_SLUGS.contains(&candidates.base()));
        candidates
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The candidates never run out.
    pub fn next_candidate(&mut self) -> String {
        let candidate = match self.next {
            0 => self.base.clone(),
            1 => format!("{}-{}", self.base, self.stamp),
            n => format!("{}-{}-{n}", self.base, self.stamp),
        };
        self.next += 1;
        candidate
    }
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_candidate())
    }
}

/// `YYYYmmddHHMMSS` in UTC.
#[must_use]
pub fn timestamp_suffix(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[cfg(test)]
mod tests {
    use crate::slug::{SlugCandidates, slugify, timestamp_suffix};
    use std::collections::HashSet;
    use time::macros::datetime;

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Hello World", "post"), "hello-world");
        assert_eq!(slugify("  Rust -- and   SQL!  ", "post"), "rust-and-sql");
        assert_eq!(slugify("Crème brûlée", "post"), "creme-brulee");
        assert_eq!(slugify("!!!", "category"), "category");
    }

    #[test]
    fn long_titles_are_cut_without_trailing_dash() {
        let slug = slugify(&"word ".repeat(100), "post");
        assert!(slug.len() <= super::SLUG_BASE_MAX_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn timestamp_suffix_format() {
        assert_eq!(
            timestamp_suffix(datetime!(2025-03-04 05:06:07 UTC)),
            "20250304050607"
        );
        assert_eq!(
            timestamp_suffix(datetime!(2025-03-04 14:06:07 +09:00)),
            "20250304050607"
        );
    }

    #[test]
    fn candidates_for_colliding_titles_are_distinct() {
        let at = datetime!(2025-03-04 05:06:07 UTC);
        let candidates: Vec<_> = SlugCandidates::for_post("Same Title", at).take(4).collect();
        assert_eq!(
            candidates,
            [
                "same-title",
                "same-title-20250304050607",
                "same-title-20250304050607-2",
                "same-title-20250304050607-3",
            ]
        );

        let unique: HashSet<_> = SlugCandidates::for_post("Same Title", at)
            .take(50)
            .collect();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn reserved_slugs_skip_the_bare_candidate() {
        let at = datetime!(2025-03-04 05:06:07 UTC);
        let first = SlugCandidates::for_post("Drafts", at).next().unwrap();
        assert_eq!(first, "drafts-20250304050607");
        let first = SlugCandidates::for_post("Create", at).next().unwrap();
        assert_eq!(first, "create-20250304050607");
    }
}
