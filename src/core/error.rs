//! Error type for the prefixing pipeline.
//!
//! Every failure a run can end with is a `PrefixError`. Per-file failures
//! (`Parse`, `Io`) are recoverable under the collect-all policy and end up
//! inside `Aggregate`; the rest always stop the run.

use std::path::PathBuf;

use miette::Diagnostic;

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum PrefixError
{
    #[error("malformed symbol name `{name}`")]
    #[diagnostic(
        code(phprefix::malformed_symbol),
        help("every namespace segment must be a valid PHP identifier")
    )]
    MalformedSymbolName
    {
        name: String
    },

    #[error("`{first}` and `{second}` would both be renamed to `{target}`")]
    #[diagnostic(
        code(phprefix::rename_collision),
        help("add an override for one of them or exclude it from prefixing")
    )]
    RenameCollision
    {
        first: String,
        second: String,
        target: String,
    },

    #[error("{}:{line}:{column}: {message}", .file.display())]
    #[diagnostic(code(phprefix::parse))]
    Parse
    {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("I/O error on {}", .path.display())]
    #[diagnostic(code(phprefix::io))]
    Io
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(phprefix::configuration))]
    Configuration(String),

    #[error("{} file(s) failed; no autoload files were generated", .failures.len())]
    #[diagnostic(code(phprefix::aggregate))]
    Aggregate
    {
        #[related]
        failures: Vec<PrefixError>,
    },
}

impl PrefixError
{
    pub fn config(message: impl Into<String>) -> Self
    {
        Self::Configuration(message.into())
    }

    pub fn io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self
    {
        Self::Io { path: path.into(), source }
    }

    /// Per-file failures that the collect-all policy may defer.
    pub fn is_recoverable(&self) -> bool
    {
        matches!(self, Self::Parse { .. } | Self::Io { .. })
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32
    {
        match self
        {
            Self::Configuration(_) => 2,
            Self::MalformedSymbolName { .. } | Self::RenameCollision { .. } => 3,
            Self::Parse { .. } => 4,
            Self::Io { .. } => 5,
            Self::Aggregate { .. } => 6,
        }
    }
}

/// Map an `anyhow` chain from the infra layer onto an I/O failure for `path`.
pub fn io_from_anyhow(
    path: impl Into<PathBuf>,
    err: anyhow::Error,
) -> PrefixError
{
    let path = path.into();
    match err.downcast::<std::io::Error>()
    {
        Ok(source) => PrefixError::Io { path, source },
        Err(other) =>
        {
            let kind = other
                .chain()
                .find_map(|cause| cause.downcast_ref::<std::io::Error>())
                .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
            PrefixError::Io { path, source: std::io::Error::new(kind, format!("{other:#}")) }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn exit_codes_by_category()
    {
        assert_eq!(PrefixError::config("bad").exit_code(), 2);
        assert_eq!(
            PrefixError::RenameCollision { first: "A".into(), second: "B".into(), target: "P\\A".into() }
                .exit_code(),
            3
        );
        let parse = PrefixError::Parse {
            file: "a.php".into(),
            line: 1,
            column: 2,
            message: "unterminated comment".into(),
        };
        assert!(parse.is_recoverable());
        assert_eq!(parse.to_string(), "a.php:1:2: unterminated comment");
        assert_eq!(PrefixError::Aggregate { failures: vec![parse] }.exit_code(), 6);
    }

    #[test]
    fn anyhow_io_errors_keep_their_kind()
    {
        let err = anyhow::Error::new(std::io::Error::from(std::io::ErrorKind::NotFound))
            .context("Failed to read file x.php");
        match io_from_anyhow("x.php", err)
        {
            PrefixError::Io { source, .. } => assert_eq!(source.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
