//! `$VAR` / `${VAR}` interpolation for config values

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENV_VAR_REGEX: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Replace every variable reference in `value` using `lookup`.
///
/// Returns the name of the first variable `lookup` cannot resolve. Defined but
/// empty variables substitute to an empty string.
pub fn substitute_env_vars<F>(value: &str, lookup: &F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut last = 0;

    for caps in ENV_VAR_REGEX.captures_iter(value) {
        let Some(whole) = caps.get(0) else { continue };
        let name = variable_name(&caps);
        let resolved = lookup(name).ok_or_else(|| name.to_string())?;

        out.push_str(&value[last..whole.start()]);
        out.push_str(&resolved);
        last = whole.end();
    }

    out.push_str(&value[last..]);
    Ok(out)
}

fn variable_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}
