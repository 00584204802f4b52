// src/prompts.rs

//! Interactive prompts.
//!
//! Each helper takes the flag that would have supplied the value, so a
//! non-interactive run fails with an actionable message instead of blocking.

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input, Password, Select};

fn require_tty(interactive: bool, flag: &str) -> Result<()> {
    if !interactive {
        bail!("Missing required value; pass {} when running non-interactively", flag);
    }
    Ok(())
}

pub fn text(interactive: bool, prompt: &str, flag: &str) -> Result<String> {
    require_tty(interactive, flag)?;
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .context("Prompt failed")
}

pub fn text_with_default(interactive: bool, prompt: &str, default: &str, flag: &str) -> Result<String> {
    require_tty(interactive, flag)?;
    Input::<String>::new()
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()
        .context("Prompt failed")
}

/// Hidden input for keys and secret values.
pub fn secret(interactive: bool, prompt: &str, flag: &str) -> Result<String> {
    require_tty(interactive, flag)?;
    Password::new()
        .with_prompt(prompt)
        .interact()
        .context("Prompt failed")
}

/// Yes/no confirmation. Non-interactive runs must pass `--yes` (or equivalent).
pub fn confirm(interactive: bool, prompt: &str, flag: &str) -> Result<bool> {
    require_tty(interactive, flag)?;
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Prompt failed")
}

/// Pick one entry from a list; returns its index.
pub fn select<T: ToString>(interactive: bool, prompt: &str, items: &[T], flag: &str) -> Result<usize> {
    require_tty(interactive, flag)?;
    if items.is_empty() {
        bail!("Nothing to choose from for: {}", prompt);
    }
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .context("Prompt failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_prompts_name_the_flag() {
        let err = text(false, "Account name", "--account").unwrap_err();
        assert!(err.to_string().contains("--account"));

        let err = confirm(false, "Delete?", "--yes").unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }
}
