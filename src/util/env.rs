//! Environment variable helpers

/// Read an environment variable as a boolean.
///
/// `true`, `1` and `yes` (any case) are true; `false`, `0` and `no` are
/// false. Unset or unrecognized values yield `default`.
pub fn env_var_as_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value).unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean-like string.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
