use unicode_segmentation::UnicodeSegmentation;

/// Longest accepted task title, in user-perceived characters
pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("task title is too long ({len} characters, max {max})")]
    TitleTooLong { len: usize, max: usize },
}

/// Trim a submitted title and check it before it reaches the store.
pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.graphemes(true).count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(title.to_string())
}
