//! Represents an animal record and the form used to create or edit one.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// A persisted animal.
///
/// `signed_url` is never stored. It is filled in on every read from
/// `stored_file_key`, so a record without a key never carries one.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, Default, PartialEq, Eq)]
pub struct Animal {
    /// Assigned by SQLite on insert.
    pub id: i64,

    pub name: String,

    pub age: i32,

    /// Direct media link returned by the storage backend at upload time.
    pub stored_url: Option<String>,

    /// Object key of the current photo in the bucket.
    pub stored_file_key: Option<String>,

    /// Time-limited read URL for the photo.
    #[sqlx(skip)]
    pub signed_url: Option<String>,
}

impl Animal {
    /// The photo key, if one is set and not blank.
    pub fn photo_key(&self) -> Option<&str> {
        non_blank(self.stored_file_key.as_deref())
    }
}

/// An uploaded photo. Only present on create and edit requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

/// Input of the create and edit actions.
///
/// Mirrors the bound form fields. Invalid forms are echoed back as-is, so
/// every submitted value is kept even when it fails validation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, Validate)]
pub struct AnimalForm {
    pub id: Option<i64>,

    #[validate(custom(function = "not_blank"))]
    pub name: String,

    #[validate(required(message = "The Age field is required."))]
    pub age: Option<i32>,

    pub stored_url: Option<String>,

    pub stored_file_key: Option<String>,

    #[serde(skip)]
    pub photo: Option<PhotoUpload>,
}

impl AnimalForm {
    /// Build the record this form describes. Call after validation.
    pub fn to_animal(&self) -> Animal {
        Animal {
            id: self.id.unwrap_or_default(),
            name: self.name.clone(),
            age: self.age.unwrap_or_default(),
            stored_url: self.stored_url.clone(),
            stored_file_key: self.stored_file_key.clone(),
            signed_url: None,
        }
    }
}

/// Required-text rule: whitespace alone does not count as a value.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required")
            .with_message(Cow::Borrowed("The Name field is required.")));
    }
    Ok(())
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_key_ignores_blank_keys() {
        let mut animal = Animal {
            stored_file_key: Some("   ".into()),
            ..Animal::default()
        };
        assert_eq!(animal.photo_key(), None);

        animal.stored_file_key = Some("leo-20240301100005.jpg".into());
        assert_eq!(animal.photo_key(), Some("leo-20240301100005.jpg"));
    }

    #[test]
    fn form_requires_name_and_age() {
        let form = AnimalForm::default();
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("age"));

        let form = AnimalForm {
            name: "Leo".into(),
            age: Some(3),
            ..AnimalForm::default()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn whitespace_name_is_missing_but_padding_is_kept() {
        let blank = AnimalForm {
            name: " \t ".into(),
            age: Some(3),
            ..AnimalForm::default()
        };
        let errors = blank.validate().unwrap_err();
        let name_errors = errors.field_errors()["name"];
        assert_eq!(name_errors[0].code, "required");

        let padded = AnimalForm {
            name: " Leo ".into(),
            age: Some(3),
            ..AnimalForm::default()
        };
        assert!(padded.validate().is_ok());
        assert_eq!(padded.to_animal().name, " Leo ");
    }

    #[test]
    fn to_animal_carries_bound_fields() {
        let form = AnimalForm {
            id: Some(5),
            name: "Leo".into(),
            age: Some(3),
            stored_url: Some("https://example.test/leo".into()),
            stored_file_key: Some("leo.jpg".into()),
            photo: None,
        };
        let animal = form.to_animal();
        assert_eq!(animal.id, 5);
        assert_eq!(animal.stored_file_key.as_deref(), Some("leo.jpg"));
        assert_eq!(animal.signed_url, None);
    }
}
