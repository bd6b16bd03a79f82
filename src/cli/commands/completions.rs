//! Shell completions command implementation.

use crate::cli::{Cli, Shell};
use crate::error::Result;
use clap::CommandFactory;
use clap_complete::{generate, shells};
use std::io::{self, Write};

const BIN_NAME: &str = "tally";

/// Write completions for `shell` to `out`.
pub fn write_completions<W: Write>(shell: &Shell, out: &mut W) {
    let mut cmd = Cli::command();

    match shell {
        Shell::Bash => generate(shells::Bash, &mut cmd, BIN_NAME, out),
        Shell::Zsh => generate(shells::Zsh, &mut cmd, BIN_NAME, out),
        Shell::Fish => generate(shells::Fish, &mut cmd, BIN_NAME, out),
        Shell::PowerShell => generate(shells::PowerShell, &mut cmd, BIN_NAME, out),
        Shell::Elvish => generate(shells::Elvish, &mut cmd, BIN_NAME, out),
    }
}

/// Generate shell completions for the specified shell.
pub fn execute(shell: &Shell) -> Result<()> {
    write_completions(shell, &mut io::stdout().lock());
    Ok(())
}
