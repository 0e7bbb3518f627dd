//! Filepath: src/infra/logging.rs
//! Subscriber setup. Events go to stderr so stdout stays for summaries,
//! rule listings and dry-run diffs.

use tracing_subscriber::EnvFilter;

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "PHPREFIX_LOG";

/// Default directive for a `-v` count.
pub fn default_level(verbose: u8) -> &'static str
{
    match verbose
    {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter from `PHPREFIX_LOG`, then `RUST_LOG`, else the verbosity default.
pub fn filter(verbose: u8) -> EnvFilter
{
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level(verbose)))
}

/// Install the global subscriber once per process; later calls are no-ops.
pub fn init(verbose: u8)
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .try_init();
}
