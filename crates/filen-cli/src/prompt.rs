//! Interactive prompts.

use std::io::{self, Write};

use anyhow::{bail, Result};
use rpassword::read_password;

/// Prompt for a visible line of input.
pub fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        bail!("{label} cannot be empty");
    }
    Ok(line.to_string())
}

/// Prompt for the account password. Input is hidden and not echoed.
pub fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;

    let password = read_password()?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Prompt for a 2FA code. Hidden as well - codes are short-lived but still
/// secrets while valid.
pub fn prompt_two_factor() -> Result<String> {
    eprint!("Two-factor code: ");
    io::stderr().flush()?;

    let code = read_password()?;
    if code.is_empty() {
        bail!("Two-factor code cannot be empty");
    }
    Ok(code.trim().to_string())
}

/// Yes/no confirmation for destructive actions. `--force` skips this.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
