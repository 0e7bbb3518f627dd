use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: u8,    // global -v, repeatable
}

#[derive(Parser)]
#[command(name = "phprefix")]
#[command(
    about = "Prefix the namespaces and classes of vendored PHP packages and regenerate their autoloaders"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Compute everything and print diffs, but write nothing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy, prefix and re-autoload the vendored packages
    Prefix(PrefixArgs),

    /// Discover packages and print every rename rule
    Symbols(SymbolsArgs),

    /// Regenerate the autoload files from the target directory only
    Autoload(AutoloadArgs),

    /// Initialize a phprefix.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Project location and the settings most often overridden per run.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Directory holding composer.json
    #[arg(long, short = 'd', default_value = ".")]
    pub working_dir: PathBuf,

    /// Output directory (relative to the working directory)
    #[arg(long)]
    pub target_dir: Option<PathBuf>,

    /// Namespace prefix, e.g. "Acme\Plugin\Vendor"
    #[arg(long)]
    pub namespace_prefix: Option<String>,

    /// Prefix for global classes, e.g. "Acme_Plugin_Vendor_"
    #[arg(long)]
    pub classmap_prefix: Option<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct PrefixArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Do not emit autoload-classmap.php
    #[arg(long)]
    pub no_classmap: bool,

    /// Leave string literals that name classes untouched
    #[arg(long)]
    pub no_strings: bool,

    /// Leave doc comments untouched
    #[arg(long)]
    pub no_docblocks: bool,

    /// Log grammar errors in inputs instead of failing, and skip the check of outputs
    #[arg(long)]
    pub no_validate: bool,

    /// Keep going after per-file failures and report them all at the end
    #[arg(long)]
    pub collect_all: bool,

    /// Rewrite files on a single thread
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct SymbolsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Write rules as JSON lines to this file instead of a table on stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct AutoloadArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Do not emit autoload-classmap.php
    #[arg(long)]
    pub no_classmap: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Clone, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; completions go to stdout when omitted
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}
