use std::str::FromStr;

/// Read `key` from the environment, falling back to `default` when unset or unparseable.
pub fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    parse_value(std::env::var(key).ok().as_deref(), default)
}

fn parse_value<T: FromStr>(raw: Option<&str>, default: T) -> T {
    match raw.map(str::trim) {
        Some(v) if !v.is_empty() => v.parse().unwrap_or(default),
        _ => default,
    }
}
