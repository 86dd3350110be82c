//! Input validation for card drafts and patches.
//!
//! Everything a caller supplies passes through here before the store is
//! touched, so a rejected request never mutates anything.
//!
//! Rules:
//! - Text is trimmed. `name` must be non-empty, at most 100 characters.
//! - `set_name` and `card_type` fall back to `"Unknown"` when blank.
//! - `card_number` at most 20 characters, `rarity` at most 50. An empty value
//!   is kept as-is: absent and empty are different.
//! - A supplied `quantity` lies in `1..=999`.
//! - `grade` is finite and within `0.0..=10.0`; `price` is finite and `>= 0`.
//! - Tags are non-empty, at most 50 characters, free of control characters.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::CardError;
use crate::model::{
    CardDraft, CardPatch, NewCard, DEFAULT_GRADE, DEFAULT_PRICE, DEFAULT_QUANTITY, UNKNOWN,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SET_NAME_LEN: usize = 100;
pub const MAX_CARD_NUMBER_LEN: usize = 20;
pub const MAX_RARITY_LEN: usize = 50;
pub const MAX_CARD_TYPE_LEN: usize = 50;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_QUANTITY_PER_CALL: i64 = 999;
pub const MAX_GRADE: f64 = 10.0;

/// Error type for field validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Card name is empty after trimming
    EmptyName,
    /// A text field exceeds its length limit
    TooLong { field: &'static str, max: usize },
    /// Quantity outside `1..=999`
    QuantityOutOfRange(i64),
    /// Merging would overflow the stored quantity
    QuantityOverflow,
    /// Grade not a number within `0.0..=10.0`
    GradeOutOfRange(f64),
    /// Price negative or not a number
    InvalidPrice(f64),
    /// A tag is empty after trimming
    EmptyTag,
    /// A tag contains a control character
    InvalidTagCharacter(char),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "card name cannot be empty"),
            ValidationError::TooLong { field, max } => {
                write!(f, "{} cannot exceed {} characters", field, max)
            }
            ValidationError::QuantityOutOfRange(q) => write!(
                f,
                "quantity must be between 1 and {}, got {}",
                MAX_QUANTITY_PER_CALL, q
            ),
            ValidationError::QuantityOverflow => write!(f, "quantity is too large to store"),
            ValidationError::GradeOutOfRange(g) => {
                write!(f, "grade must be between 0.0 and {:.1}, got {}", MAX_GRADE, g)
            }
            ValidationError::InvalidPrice(p) => {
                write!(f, "price must be zero or positive, got {}", p)
            }
            ValidationError::EmptyTag => write!(f, "tags cannot be empty"),
            ValidationError::InvalidTagCharacter(c) => {
                write!(f, "tags cannot contain control character {:?}", c)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for CardError {
    fn from(err: ValidationError) -> Self {
        CardError::Validation(err.to_string())
    }
}

type FieldResult<T> = std::result::Result<T, ValidationError>;

fn check_len(value: String, field: &'static str, max: usize) -> FieldResult<String> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value)
}

pub fn validate_name(name: &str) -> FieldResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    check_len(name.to_string(), "name", MAX_NAME_LEN)
}

/// Blank or missing labels collapse to `"Unknown"`.
fn validate_label(value: Option<&str>, field: &'static str, max: usize) -> FieldResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => check_len(v.to_string(), field, max),
        _ => Ok(UNKNOWN.to_string()),
    }
}

fn validate_optional(
    value: Option<&str>,
    field: &'static str,
    max: usize,
) -> FieldResult<Option<String>> {
    value
        .map(|v| check_len(v.trim().to_string(), field, max))
        .transpose()
}

pub fn validate_quantity(quantity: i64) -> FieldResult<i64> {
    if !(1..=MAX_QUANTITY_PER_CALL).contains(&quantity) {
        return Err(ValidationError::QuantityOutOfRange(quantity));
    }
    Ok(quantity)
}

pub fn validate_grade(grade: f64) -> FieldResult<f64> {
    if !grade.is_finite() || !(0.0..=MAX_GRADE).contains(&grade) {
        return Err(ValidationError::GradeOutOfRange(grade));
    }
    Ok(grade)
}

pub fn validate_price(price: f64) -> FieldResult<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::InvalidPrice(price));
    }
    Ok(price)
}

pub fn validate_tag(tag: &str) -> FieldResult<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ValidationError::EmptyTag);
    }
    if let Some(c) = tag.chars().find(|c| c.is_control()) {
        return Err(ValidationError::InvalidTagCharacter(c));
    }
    check_len(tag.to_string(), "tag", MAX_TAG_LEN)
}

pub fn validate_tags<'a, I>(tags: I) -> FieldResult<BTreeSet<String>>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter().map(|t| validate_tag(t)).collect()
}

/// Sum two quantities as a merge would, rejecting overflow.
pub fn merged_quantity(existing: i64, added: i64) -> FieldResult<i64> {
    existing
        .checked_add(added)
        .ok_or(ValidationError::QuantityOverflow)
}

/// Validate a draft and fill in defaults.
pub fn validate_draft(draft: CardDraft) -> Result<NewCard, ValidationError> {
    Ok(NewCard {
        name: validate_name(&draft.name)?,
        set_name: validate_label(draft.set_name.as_deref(), "set name", MAX_SET_NAME_LEN)?,
        card_number: validate_optional(
            draft.card_number.as_deref(),
            "card number",
            MAX_CARD_NUMBER_LEN,
        )?,
        rarity: validate_optional(draft.rarity.as_deref(), "rarity", MAX_RARITY_LEN)?,
        quantity: validate_quantity(draft.quantity.unwrap_or(DEFAULT_QUANTITY))?,
        is_favorite: draft.is_favorite,
        grade: validate_grade(draft.grade.unwrap_or(DEFAULT_GRADE))?,
        price: validate_price(draft.price.unwrap_or(DEFAULT_PRICE))?,
        card_type: validate_label(draft.card_type.as_deref(), "card type", MAX_CARD_TYPE_LEN)?,
        notes: draft.notes.map(|n| n.trim().to_string()),
        image_url: draft.image_url.map(|u| u.trim().to_string()),
        tags: validate_tags(&draft.tags)?,
        owner: draft.owner,
    })
}

/// Validate a patch, returning it with every present field normalized.
pub fn validate_patch(patch: CardPatch) -> Result<CardPatch, ValidationError> {
    let optional = |value: Option<Option<String>>, field, max| {
        value
            .map(|inner| validate_optional(inner.as_deref(), field, max))
            .transpose()
    };

    Ok(CardPatch {
        name: patch.name.as_deref().map(validate_name).transpose()?,
        set_name: patch
            .set_name
            .as_deref()
            .map(|s| validate_label(Some(s), "set name", MAX_SET_NAME_LEN))
            .transpose()?,
        card_number: optional(patch.card_number, "card number", MAX_CARD_NUMBER_LEN)?,
        rarity: optional(patch.rarity, "rarity", MAX_RARITY_LEN)?,
        quantity: patch.quantity.map(validate_quantity).transpose()?,
        is_favorite: patch.is_favorite,
        grade: patch.grade.map(validate_grade).transpose()?,
        price: patch.price.map(validate_price).transpose()?,
        card_type: patch
            .card_type
            .as_deref()
            .map(|t| validate_label(Some(t), "card type", MAX_CARD_TYPE_LEN))
            .transpose()?,
        notes: patch
            .notes
            .map(|n| n.map(|n| n.trim().to_string())),
        image_url: patch
            .image_url
            .map(|u| u.map(|u| u.trim().to_string())),
        tags: patch.tags.as_ref().map(validate_tags).transpose()?,
    })
}
