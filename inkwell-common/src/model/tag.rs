use crate::{
    model::{Id, text::TagName},
    slug::slugify,
};
use serde::Serialize;

pub const MAX_TAGS_PER_POST: usize = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TagMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Tag {
    pub id: Id<TagMarker>,
    pub name: TagName,
    pub slug: String,
    pub post_count: i64,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub slug: String,
}

/// A tag to attach to a post, created on first use.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct NewTag {
    pub name: TagName,
    pub slug: String,
}

impl NewTag {
    #[must_use]
    pub fn new(name: TagName) -> Self {
        let slug = slugify(name.get(), "tag");
        Self { name, slug }
    }
}

/// Validates submitted tag names, dropping names that slugify to the same tag.
pub fn parse_tag_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<NewTag>, String> {
    let mut tags: Vec<NewTag> = Vec::with_capacity(names.len());
    for name in names {
        let name = TagName::new(name.as_ref()).map_err(|err| err.to_string())?;
        let tag = NewTag::new(name);
        if !tags.iter().any(|existing| existing.slug == tag.slug) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS_PER_POST {
        return Err(format!("A post may have at most {MAX_TAGS_PER_POST} tags."));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use crate::model::tag::parse_tag_names;

    #[test]
    fn deduplicates_by_slug() {
        let tags = parse_tag_names(&["Rust", "rust", " RUST ", "Web Dev"]).unwrap();
        let slugs: Vec<_> = tags.iter().map(|tag| tag.slug.as_str()).collect();
        assert_eq!(slugs, ["rust", "web-dev"]);
        assert_eq!(tags[0].name.get(), "Rust");
    }

    #[test]
    fn rejects_blank_and_too_many() {
        assert!(parse_tag_names(&["ok", "  "]).is_err());
        let many: Vec<String> = (0..11).map(|n| format!("tag{n}")).collect();
        assert!(parse_tag_names(&many).is_err());
        assert!(parse_tag_names::<&str>(&[]).unwrap().is_empty());
    }
}
