//! Per-field validation errors collected while checking a submitted form.

use serde::Serialize;
use std::{collections::BTreeMap, fmt::Display};

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: &str, message: impl Display) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Display) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.to_string());
    }

    /// Records the error of `result` under `field`, yielding the value on success.
    pub fn check<T, E: Display>(&mut self, field: &str, result: Result<T, E>) -> Option<T> {
        result.map_err(|err| self.add(field, err)).ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Yields `value` when no error was recorded.
    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }

    /// One line per message. Field messages are prefixed with their field.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| {
                    if field == NON_FIELD_ERRORS {
                        message.clone()
                    } else {
                        format!("{field}: {message}")
                    }
                })
            })
            .collect()
    }

    /// All messages, flattened, for a one-line flash message.
    #[must_use]
    pub fn summary(&self) -> String {
        self.0.values().flatten().cloned().collect::<Vec<_>>().join(" ")
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::form::{FieldErrors, NON_FIELD_ERRORS};

    #[test]
    fn collects_multiple_fields() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.check::<_, String>("title", Ok(3)), Some(3));
        assert_eq!(errors.check::<u8, _>("email", Err("Enter a valid email address.")), None);
        errors.add("password", "Too short.");
        errors.add("password", "Entirely numeric.");

        assert!(errors.contains("email"));
        assert_eq!(errors.get("password").len(), 2);
        assert!(errors.get("title").is_empty());
        assert_eq!(
            errors.to_string(),
            "email: Enter a valid email address.; password: Too short.; password: Entirely numeric."
        );
        assert!(errors.finish(|| ()).is_err());
    }

    #[test]
    fn lines_leave_non_field_messages_bare() {
        let mut errors = FieldErrors::single(NON_FIELD_ERRORS, "You cannot follow yourself.");
        errors.add("title", "Title may not be empty.");
        assert_eq!(
            errors.lines(),
            ["You cannot follow yourself.", "title: Title may not be empty."]
        );
    }

    #[test]
    fn empty_errors_finish_ok() {
        assert_eq!(FieldErrors::new().finish(|| 5), Ok(5));
    }
}
