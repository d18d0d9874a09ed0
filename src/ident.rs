//! Identifier allow-list.
//!
//! Table and column names are the only caller text ever spliced into SQL;
//! values always travel as bound parameters.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(Error::invalid(format!("'{name}' is not a valid identifier")))
    }
}

pub(crate) fn validate_all<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().try_for_each(|n| validate_identifier(n).map(|_| ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["person", "_tmp", "Person2", "created_at"] {
            assert!(is_valid_identifier(name), "{name}");
        }
    }

    #[test]
    fn rejects_injection_attempts() {
        for name in ["", "1abc", "name; DROP TABLE x", "a b", "na'me", "a-b", "t.c"] {
            assert!(validate_identifier(name).is_err(), "{name}");
        }
    }
}
