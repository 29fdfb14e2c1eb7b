//! Key name validation.
//!
//! Valid key names:
//! - Must be non-empty
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `.` or `/`
//! - Components between slashes must be non-empty and not start with `.`
//!
//! Keys map onto relative file paths in [`FsRepo`](crate::FsRepo), so these
//! rules also keep every key inside the repository directory.

use crate::error::{RepoError, Result};

/// Characters that are forbidden anywhere in a key name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RepoError {
    RepoError::InvalidKey {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a key name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cairn_repo::names::validate_key_name;
///
/// assert!(validate_key_name("local/pins").is_ok());
/// assert!(validate_key_name("").is_err());
/// assert!(validate_key_name("../escape").is_err());
/// ```
pub fn validate_key_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "key name must not be empty"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_key_name("pins").is_ok());
        assert!(validate_key_name("local/pins").is_ok());
        assert!(validate_key_name("local/pins-v1.0").is_ok());
        assert!(validate_key_name("a/b/c/d").is_ok());
    }

    #[test]
    fn reject_empty_name() {
        assert!(validate_key_name("").is_err());
    }

    #[test]
    fn reject_parent_traversal() {
        assert!(validate_key_name("..").is_err());
        assert!(validate_key_name("a/../b").is_err());
        assert!(validate_key_name("a..b").is_err());
    }

    #[test]
    fn reject_whitespace_and_control() {
        assert!(validate_key_name("has space").is_err());
        assert!(validate_key_name("has\ttab").is_err());
        assert!(validate_key_name("nul\0byte").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for bad in ["a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_key_name(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn reject_boundaries() {
        assert!(validate_key_name(".hidden").is_err());
        assert!(validate_key_name("trailing.").is_err());
        assert!(validate_key_name("/absolute").is_err());
        assert!(validate_key_name("trailing/").is_err());
        assert!(validate_key_name("a//b").is_err());
        assert!(validate_key_name("a/.hidden").is_err());
    }

    #[test]
    fn error_names_the_key() {
        let err = validate_key_name("bad key").unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }
}
