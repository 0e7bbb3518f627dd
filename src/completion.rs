//! Shell completion generation using clap_complete.

use anyhow::{Context, Result};
use clap::{Command, CommandFactory};
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::io;

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};
use crate::infra::io::ensure_dir;

const BIN_NAME: &str = "phprefix";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let mut cmd: Command = Cli::command();
    let shell: CompletionShell = args.shell.into();

    let Some(dir) = args.out_dir else {
        generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
        return Ok(());
    };

    ensure_dir(&dir).context("create --out-dir")?;
    let path = generate_to(shell, &mut cmd, BIN_NAME, &dir).context("generate completion file")?;

    if !ctx.quiet {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_completion_file() -> Result<()> {
        let dir = TempDir::new()?;
        let args = CompletionsArgs { shell: Shell::Bash, out_dir: Some(dir.path().join("c")) };
        run(args, &AppContext { quiet: true, ..AppContext::default() })?;
        assert!(dir.path().join("c/phprefix.bash").exists());
        Ok(())
    }
}
