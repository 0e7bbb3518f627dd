//! PHP front end: tree-sitter parse into a structural model, grammar error
//! scan and the string literal codec.

pub mod literal;
pub mod model;
pub mod parser;
pub mod validate;

pub use model::{
    DeclKind, Declaration, FileModel, Import, ImportTable, NameKind, NamespaceRegion, Reference,
    Span, UseStatement,
};
pub use parser::{ParsedFile, check, parse};
pub use validate::SyntaxError;
