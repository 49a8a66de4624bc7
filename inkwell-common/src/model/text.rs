use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidTextError {
    #[error("{name} may not be blank.")]
    Blank { name: &'static str },
    #[error("{name} may be at most {max} characters long.")]
    TooLong { name: &'static str, max: usize },
}

/// Declares a trimmed string newtype with a maximum length in characters.
macro_rules! bounded_text {
    ($(#[$meta:meta])* $name:ident: $label:literal, max = $max:expr, blank = $blank:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const MAX_LEN: usize = $max;

            pub fn new(text: impl Into<String>) -> Result<Self, InvalidTextError> {
                let text = text.into();
                let trimmed = text.trim();
                if !$blank && trimmed.is_empty() {
                    return Err(InvalidTextError::Blank { name: $label });
                }
                if trimmed.chars().count() > Self::MAX_LEN {
                    return Err(InvalidTextError::TooLong {
                        name: $label,
                        max: Self::MAX_LEN,
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = String::deserialize(deserializer)?;
                $name::new(inner).map_err(D::Error::custom)
            }
        }
    };
}

bounded_text!(PostTitle: "Title", max = 200, blank = false);
bounded_text!(CategoryName: "Category name", max = 100, blank = false);
bounded_text!(TagName: "Tag name", max = 50, blank = false);
bounded_text!(SeriesTitle: "Series title", max = 200, blank = false);
bounded_text!(CommentContent: "Comment", max = 1000, blank = false);
bounded_text!(Bio: "Bio", max = 500, blank = true);
bounded_text!(
    /// First or last name.
    PersonName: "Name", max = 150, blank = true
);

#[cfg(test)]
mod tests {
    use crate::model::text::{Bio, CommentContent, InvalidTextError, PostTitle};

    #[test]
    fn trims_and_rejects_blank() {
        assert_eq!(PostTitle::new("  Hello  ").unwrap().get(), "Hello");
        assert_eq!(
            PostTitle::new("   "),
            Err(InvalidTextError::Blank { name: "Title" })
        );
        assert_eq!(Bio::new("  ").unwrap().get(), "");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let korean = "가".repeat(1000);
        assert!(CommentContent::new(korean.clone()).is_ok());
        assert_eq!(
            CommentContent::new(korean + "가"),
            Err(InvalidTextError::TooLong {
                name: "Comment",
                max: 1000
            })
        );
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<PostTitle>("\"ok\"").is_ok());
        assert!(serde_json::from_str::<PostTitle>("\"\"").is_err());
    }
}
