use std::io::{self, Write};

use anyhow::{anyhow, Result};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "OBSIDIAN_VAULT_PASSWORD";
pub const PASSWORD_CONFIRM_ENV: &str = "OBSIDIAN_VAULT_PASSWORD_CONFIRM";

fn env_password(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

pub fn password_once(prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(PASSWORD_ENV) {
        return Ok(pw);
    }
    rpassword::prompt_password(format!("{prompt}: "))
        .map(Zeroizing::new)
        .map_err(|e| anyhow!("password prompt: {e}"))
}

/// New passcode plus its confirmation. Validation is left to the session.
pub fn new_password() -> Result<(Zeroizing<String>, Zeroizing<String>)> {
    if let Some(pw) = env_password(PASSWORD_ENV) {
        let confirm = env_password(PASSWORD_CONFIRM_ENV).unwrap_or_else(|| pw.clone());
        return Ok((pw, confirm));
    }
    let first = password_once("New passcode")?;
    let second = rpassword::prompt_password("Confirm passcode: ")
        .map(Zeroizing::new)
        .map_err(|e| anyhow!("password prompt: {e}"))?;
    Ok((first, second))
}

/// Stand-in for the biometric scanner: a yes/no question on the terminal.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}
