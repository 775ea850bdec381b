//! Command handlers

pub mod chat;
pub mod config;
pub mod directory;
pub mod link;
pub mod push;
pub mod section;
pub mod status;
pub mod student;
pub mod teacher;
pub mod watch;

use anyhow::Result;

use portal_core::{PendingKind, Portal};

use crate::editor::confirm;
use crate::output::Output;

/// Answer the session's pending confirmation
///
/// With `assume_yes` the action runs without asking. Otherwise the dialog
/// is shown and the operator is prompted; JSON and quiet output never
/// prompt, so the action is cancelled. Returns the confirmed action, or
/// `None` if it was cancelled.
pub fn resolve_pending(
    portal: &mut Portal,
    assume_yes: bool,
    output: &Output,
) -> Result<Option<PendingKind>> {
    let Some(action) = portal.pending().cloned() else {
        return Ok(None);
    };

    let accepted = if assume_yes {
        true
    } else if output.should_prompt() {
        output.print_pending(&action);
        confirm(&format!("{}?", action.confirm_label))?
    } else {
        output.print_pending(&action);
        false
    };

    if accepted {
        Ok(Some(portal.confirm()?))
    } else {
        portal.cancel();
        if output.should_prompt() {
            println!("Cancelled.");
        } else {
            output.message("Cancelled. Pass --yes to confirm without a prompt.");
        }
        Ok(None)
    }
}

/// Parse a `KEY=VALUE` argument
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse a finite score
pub fn parse_score(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        _ => Err(format!("invalid score '{}'", s.trim())),
    }
}

/// Parse a `SUBJECT=SCORE` argument
pub fn parse_mark(s: &str) -> Result<(String, f64), String> {
    let (subject, score) = parse_pair(s)?;
    let score = parse_score(&score).map_err(|e| format!("{} for {}", e, subject))?;
    Ok((subject, score))
}

/// Parse an `INDEX=VALUE` argument
pub fn parse_indexed(s: &str) -> Result<(usize, String), String> {
    let (index, value) = parse_pair(s)?;
    let index = index
        .parse()
        .map_err(|_| format!("invalid index '{}'", index))?;
    Ok((index, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("Instagram=https://instagram.com/a=b").unwrap(),
            ("Instagram".to_string(), "https://instagram.com/a=b".to_string())
        );
        assert!(parse_pair("no-separator").is_err());
        assert!(parse_pair("=value").is_err());
    }

    #[test]
    fn test_parse_mark() {
        assert_eq!(
            parse_mark("Mathematics=95.5").unwrap(),
            ("Mathematics".to_string(), 95.5)
        );
        assert!(parse_mark("Physics=ninety").is_err());
        assert!(parse_mark("Physics=NaN").is_err());
    }

    #[test]
    fn test_parse_score_rejects_non_finite() {
        assert_eq!(parse_score(" 88.5 ").unwrap(), 88.5);
        assert!(parse_score("inf").is_err());
        assert!(parse_score("NaN").is_err());
        assert!(parse_score("1e400").is_err());
        assert!(parse_score("").is_err());
    }

    #[test]
    fn test_parse_indexed() {
        assert_eq!(
            parse_indexed("1=https://youtube.com/@asha").unwrap(),
            (1, "https://youtube.com/@asha".to_string())
        );
        assert!(parse_indexed("first=x").is_err());
    }
}
