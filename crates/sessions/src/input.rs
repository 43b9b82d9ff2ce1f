//! Parsing of free-text answers collected by sub-flows.
//!
//! Every parser returns [`ActionError::Validation`] on bad input so the
//! caller keeps the sub-flow open for another attempt.

use {
    once_cell::sync::Lazy,
    partyline_common::{ActionError, ActionResult},
    regex::Regex,
};

static IDENTITY_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^(?<name>[^#]{3,16})#(?<tag>[A-Za-z0-9]{3,5})$"));

static COLOR_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^#?(?<hex>[0-9A-Fa-f]{6})$"));

fn compiled(re: &'static Lazy<Result<Regex, regex::Error>>) -> ActionResult<&'static Regex> {
    re.as_ref()
        .map_err(|e| ActionError::Internal(anyhow::anyhow!("bad pattern: {e}")))
}

/// Integer in `min..=max`. `what` names the value in the error message.
pub fn parse_bounded(input: &str, min: u32, max: u32, what: &str) -> ActionResult<u32> {
    let n: u32 = input
        .trim()
        .parse()
        .map_err(|_| ActionError::validation(format!("{what} must be a whole number")))?;
    if !(min..=max).contains(&n) {
        return Err(ActionError::validation(format!(
            "{what} must be between {min} and {max}"
        )));
    }
    Ok(n)
}

/// In-game identity, `Name#TAG`. Returned trimmed.
pub fn parse_identity(input: &str) -> ActionResult<String> {
    let trimmed = input.trim();
    let re = compiled(&IDENTITY_RE)?;
    match re.captures(trimmed) {
        Some(caps) if !caps["name"].trim().is_empty() => Ok(trimmed.to_string()),
        _ => Err(ActionError::validation(
            "use the format Name#TAG (name 3-16 characters, tag 3-5 letters or digits)",
        )),
    }
}

/// Hex color, `#RRGGBB` or `RRGGBB`.
pub fn parse_color(input: &str) -> ActionResult<u32> {
    let re = compiled(&COLOR_RE)?;
    re.captures(input.trim())
        .and_then(|caps| u32::from_str_radix(&caps["hex"], 16).ok())
        .ok_or_else(|| ActionError::validation("color must look like #1E90FF"))
}

/// Non-empty text of at most `max_len` characters, whitespace trimmed.
pub fn clean_text(input: &str, max_len: usize) -> ActionResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ActionError::validation("text cannot be empty"));
    }
    if trimmed.chars().count() > max_len {
        return Err(ActionError::validation(format!(
            "text is limited to {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}
