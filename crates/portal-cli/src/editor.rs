//! Interactive prompts
//!
//! Line-based prompts for editing records and answering confirmations.
//! Every prompt degrades to "no input" when stdin is not a terminal.

use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !is_interactive() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    Ok(is_yes(&read_line()?))
}

/// Prompt for a value, showing the current one
///
/// Returns `None` when the user just presses enter.
pub fn prompt_with_default(prompt: &str, default: &str) -> Result<Option<String>> {
    if !is_interactive() {
        return Ok(None);
    }

    if default.is_empty() {
        print!("{}: ", prompt);
    } else {
        print!("{} [{}]: ", prompt, default);
    }
    io::stdout().flush()?;

    Ok(non_empty(read_line()?))
}

/// Read one chat line; `None` at end of input
pub fn read_message(prompt: &str) -> Result<Option<String>> {
    print!("{} ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn read_line() -> Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

fn is_yes(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

fn non_empty(input: String) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        None
    } else {
        Some(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  \n".to_string()), None);
        assert_eq!(non_empty(" Class 12\n".to_string()), Some("Class 12".to_string()));
    }
}
