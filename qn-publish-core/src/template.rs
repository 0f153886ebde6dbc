//! Expansion of `[hash]` / `[hash:N]` placeholders in the key-prefix template.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PublishError, Result};

/// Default key prefix when none is configured.
pub const DEFAULT_PATH_TEMPLATE: &str = "[hash]";

static HASH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[hash(?::(\d+))?\]").expect("hash token regex is valid")
});

/// Replace every hash token in `template` with `value`.
///
/// `[hash:N]` keeps the first `N` characters of the value when `N` is a
/// positive integer; any other length keeps the whole value. A missing value
/// is an error unless `allow_empty` is set, in which case tokens resolve to
/// the empty string.
pub fn resolve_template(template: &str, value: Option<&str>, allow_empty: bool) -> Result<String> {
    let mut resolved = String::with_capacity(template.len());
    let mut last = 0;

    for caps in HASH_TOKEN.captures_iter(template) {
        let Some(token) = caps.get(0) else { continue };
        resolved.push_str(&template[last..token.start()]);

        let replacement = match value {
            Some(v) => v,
            None if allow_empty => "",
            None => {
                tracing::error!(token = token.as_str(), template, "Unresolved path variable");
                return Err(PublishError::Configuration {
                    token: token.as_str().to_string(),
                    template: template.to_string(),
                });
            }
        };

        let length = caps
            .get(1)
            .and_then(|n| n.as_str().parse::<usize>().ok())
            .filter(|n| *n > 0);
        match length {
            Some(n) => resolved.extend(replacement.chars().take(n)),
            None => resolved.push_str(replacement),
        }

        last = token.end();
    }

    resolved.push_str(&template[last..]);
    Ok(resolved)
}
