// ABOUTME: Validated OCI runtime name (e.g. "crun", "runc", "kata").
// ABOUTME: Rejects characters that would change meaning when spliced into a shell script.

use std::fmt;
use thiserror::Error;

/// Longest runtime name accepted; matches the Linux file name limit.
const MAX_LEN: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeNameError {
    #[error("runtime name cannot be empty")]
    Empty,

    #[error("runtime name exceeds maximum length of 255 characters")]
    TooLong,

    #[error("invalid character in runtime name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeName(String);

impl RuntimeName {
    pub fn new(value: &str) -> Result<Self, RuntimeNameError> {
        if value.is_empty() {
            return Err(RuntimeNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(RuntimeNameError::TooLong);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
                return Err(RuntimeNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RuntimeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_runtimes() {
        for name in ["crun", "runc", "kata", "crun-wasm", "high_performance", "runsc.v2"] {
            assert_eq!(RuntimeName::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(RuntimeName::new(""), Err(RuntimeNameError::Empty));
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert_eq!(
            RuntimeName::new("crun; rm"),
            Err(RuntimeNameError::InvalidChar(';'))
        );
        assert_eq!(
            RuntimeName::new("$(id)"),
            Err(RuntimeNameError::InvalidChar('$'))
        );
        assert_eq!(
            RuntimeName::new("a b"),
            Err(RuntimeNameError::InvalidChar(' '))
        );
    }

    #[test]
    fn rejects_overlong_name() {
        let name = "r".repeat(256);
        assert_eq!(RuntimeName::new(&name), Err(RuntimeNameError::TooLong));
        assert!(RuntimeName::new(&"r".repeat(255)).is_ok());
    }
}
