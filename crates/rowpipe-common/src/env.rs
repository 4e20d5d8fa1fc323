//! Typed environment variable lookups
//!
//! Unset and empty variables are treated the same way: both fall back to the
//! default (or fail for [`required`]).

use crate::error::{CommonError, Result};
use std::str::FromStr;

/// Read a variable, returning `None` when it is unset or empty.
pub fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a variable or fall back to `default`.
pub fn var_or(name: &str, default: &str) -> String {
    var_opt(name).unwrap_or_else(|| default.to_string())
}

/// Read a variable that must be present.
pub fn required(name: &str) -> Result<String> {
    var_opt(name).ok_or_else(|| CommonError::MissingVar(name.to_string()))
}

/// Parse a variable into `T`, falling back to `default` when unset.
///
/// A value that is present but does not parse is an error rather than a
/// silent fallback.
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var_opt(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| CommonError::InvalidVar {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
