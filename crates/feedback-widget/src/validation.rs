//! Input validation and spam heuristics for feedback form fields.
//!
//! All checks are pure functions over the raw field text. Lengths are counted
//! in characters after trimming surrounding whitespace.

use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use std::sync::LazyLock;
use thiserror::Error;

pub const MIN_COMMENT_CHARS: usize = 3;
pub const MAX_COMMENT_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 100;

/// A run of this many identical characters marks a comment as spam.
const SPAM_REPEAT_RUN: usize = 11;
/// Minimum length of an all-caps comment to count as shouting.
const SHOUTING_MIN_CHARS: usize = 20;
/// Number of links that marks a comment as spam.
const SPAM_LINK_COUNT: usize = 3;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~\-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("static email pattern")
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-'.]+$").expect("static name pattern"));

static SHOUTING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z\s!]+$").expect("static shouting pattern"));

/// Start of a link. Matches are counted, so links written back to back
/// without whitespace still count separately.
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S").expect("static link pattern"));

/// Form fields the widget collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Comment,
    Name,
    Email,
    /// Hidden field that only bots fill in
    Honeypot,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Comment => "comment",
            Field::Name => "name",
            Field::Email => "email",
            Field::Honeypot => "honeypot",
        }
    }
}

/// Reason a field value was rejected. The display text is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Comment is required.")]
    CommentRequired,
    #[error("Comment must be at least 3 characters long.")]
    CommentTooShort,
    #[error("Comment must be less than 2000 characters.")]
    CommentTooLong,
    #[error("Comment appears to be spam. Please provide genuine feedback.")]
    Spam,
    #[error("Name must be less than 100 characters.")]
    NameTooLong,
    #[error("Name contains invalid characters.")]
    NameInvalidCharacters,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
}

/// Validate the required comment field.
pub fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::CommentRequired);
    }

    let len = trimmed.chars().count();
    if len < MIN_COMMENT_CHARS {
        return Err(ValidationError::CommentTooShort);
    }
    if len > MAX_COMMENT_CHARS {
        return Err(ValidationError::CommentTooLong);
    }

    if has_repeated_run(trimmed) || is_shouting(trimmed, len) || has_many_links(trimmed) {
        return Err(ValidationError::Spam);
    }

    Ok(())
}

/// Validate the optional name field.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }

    if !NAME_PATTERN.is_match(trimmed) {
        return Err(ValidationError::NameInvalidCharacters);
    }

    Ok(())
}

/// Check the optional email field. Empty input is valid.
pub fn validate_email(email: &str) -> bool {
    let trimmed = email.trim();
    trimmed.is_empty() || EMAIL_PATTERN.is_match(trimmed)
}

/// Validate a single field, as done when the user leaves it.
pub fn validate_field(field: Field, value: &str) -> Result<(), ValidationError> {
    match field {
        Field::Comment => validate_comment(value),
        Field::Name => validate_name(value),
        Field::Email if validate_email(value) => Ok(()),
        Field::Email => Err(ValidationError::InvalidEmail),
        Field::Honeypot => Ok(()),
    }
}

/// One character repeated `SPAM_REPEAT_RUN` or more times in a row.
/// Line breaks never count towards a run.
fn has_repeated_run(text: &str) -> bool {
    let mut previous = None;
    let mut run = 0;

    for c in text.chars() {
        if c == '\n' || c == '\r' {
            previous = None;
            run = 0;
            continue;
        }

        if previous == Some(c) {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }

        if run >= SPAM_REPEAT_RUN {
            return true;
        }
    }

    false
}

fn is_shouting(text: &str, len: usize) -> bool {
    len >= SHOUTING_MIN_CHARS && SHOUTING_PATTERN.is_match(text)
}

fn has_many_links(text: &str) -> bool {
    LINK_PATTERN.find_iter(text).count() >= SPAM_LINK_COUNT
}
