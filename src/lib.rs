//! **phprefix** - Prefix the namespaces and classes of vendored PHP packages
//!
//! Copies the Composer packages a project requires into a target directory,
//! rewrites every namespace, global class, import and reference under a
//! configured prefix, and regenerates classmap and files autoloaders for the
//! result. Rewrites are computed in memory in parallel and committed
//! atomically.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - discovery, rename table, rewriting, commit and autoload
pub mod core {
    /// Error type shared by every phase
    pub mod error;
    pub use error::PrefixError;

    /// Symbol records and the `symbols` subcommand
    pub mod symbols;
    pub use symbols::{Symbol, SymbolKind, run as symbols_run};

    /// Finalized rename table: original name -> target name
    pub mod table;
    pub use table::{Eligibility, PassThrough, RenameRules, Rule, TableConfig};

    /// Package discovery from the vendor directory
    pub mod locate;
    pub use locate::{Discovery, Package, SourceFile};

    /// Per-file source rewriting
    pub mod rewrite;
    pub use rewrite::{FileContext, RewriteOptions, Rewritten, rewrite_source};

    /// Atomic writes and dry-run diffs
    pub mod commit;
    pub use commit::{CommitPlan, CommitReport};

    /// Classmap, files autoloader and bootstrap generation
    pub mod autoload;
    pub use autoload::run as autoload_run;

    /// End-to-end `prefix` run
    pub mod pipeline;
    pub use pipeline::{RunReport, analyze, prefix, run as prefix_run};
}

/// Language processing - tree-sitter PHP parse, structural model and grammar errors
pub mod parsers {
    pub mod php;
}

/// Infrastructure - configuration, I/O, walking and logging
pub mod infra {
    /// Layered configuration (composer.json, phprefix.toml, env, CLI)
    pub mod config;
    pub use config::{PrefixSettings, init as config_init, load as load_settings};

    /// Memory-mapped reads and atomic writes
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// CRLF/LF-robust line indexing for byte -> position mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Deterministic package-tree walking
    pub mod walk;
    pub use walk::FileWalker;

    /// tracing-subscriber setup
    pub mod logging;
}

pub use cli::{AppContext, Cli, Commands};
pub use core::{PrefixError, RenameRules, Symbol, SymbolKind, autoload_run, prefix_run, symbols_run};
pub use infra::{FileWalker, PrefixSettings, load_settings};
