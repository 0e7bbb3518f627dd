//! Filepath: src/parsers/php/model.rs
//! What the rewrite engine knows about one PHP file: namespace regions,
//! imports, declarations and every edit candidate as a byte span.

use std::collections::HashMap;

use super::literal::Quote;

/// Half-open byte range into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span
{
    pub start: usize,
    pub end: usize,
}

/// The three PHP symbol tables a name can be looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind
{
    Class,
    Function,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind
{
    Class,
    Interface,
    Trait,
    Enum,
    Function,
    Constant,
}

impl DeclKind
{
    pub fn is_class_like(self) -> bool
    {
        matches!(self, Self::Class | Self::Interface | Self::Trait | Self::Enum)
    }

    pub fn name_kind(self) -> NameKind
    {
        match self
        {
            Self::Function => NameKind::Function,
            Self::Constant => NameKind::Constant,
            _ => NameKind::Class,
        }
    }
}

/// One imported name inside a `use` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseItem
{
    pub kind: NameKind,
    /// Span of the name as written (relative to the group prefix if any)
    pub span: Span,
    pub text: String,
    pub alias: Option<String>,
}

/// A top-level `use` statement, plain or grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseStatement
{
    /// From the `use` keyword through the terminating `;`
    pub span: Span,
    /// Group prefix span (trailing separator included) and text without it
    pub prefix: Option<(Span, String)>,
    pub items: Vec<UseItem>,
}

/// A resolved import: fully-qualified name plus the alias it is known by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import
{
    pub kind: NameKind,
    pub name: String,
    pub alias: String,
    pub explicit_alias: bool,
}

impl UseStatement
{
    pub fn imports(&self) -> impl Iterator<Item = Import> + '_
    {
        self.items.iter().map(|item| {
            let relative = item.text.trim_start_matches('\\');
            let name = match &self.prefix
            {
                Some((_, prefix)) => format!("{}\\{}", prefix.trim_start_matches('\\'), relative),
                None => relative.to_string(),
            };
            let alias = item
                .alias
                .clone()
                .unwrap_or_else(|| last_segment(&name).to_string());
            Import { kind: item.kind, name, alias, explicit_alias: item.alias.is_some() }
        })
    }
}

/// A `namespace` region: from its declaration to the next one (or EOF).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamespaceRegion
{
    /// Namespace name, empty for the global namespace
    pub name: String,
    pub name_span: Option<Span>,
    pub uses: Vec<UseStatement>,
}

impl NamespaceRegion
{
    pub fn imports(&self) -> impl Iterator<Item = Import> + '_
    {
        self.uses
            .iter()
            .flat_map(UseStatement::imports)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration
{
    pub kind: DeclKind,
    /// Fully-qualified name without a leading separator
    pub name: String,
    /// Span of the declared short name; `None` for `define()` constants
    pub span: Option<Span>,
    pub region: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference
{
    pub kind: NameKind,
    pub span: Span,
    pub text: String,
    pub region: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral
{
    /// Quotes included, `b` prefix excluded
    pub span: Span,
    pub quote: Quote,
    pub region: usize,
    /// First argument of `define`, `defined` or `constant`
    pub define_arg: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocComment
{
    pub span: Span,
    pub region: usize,
}

/// Everything the rewrite engine needs to know about one file.
#[derive(Debug, Clone, Default)]
pub struct FileModel
{
    pub regions: Vec<NamespaceRegion>,
    pub declarations: Vec<Declaration>,
    pub references: Vec<Reference>,
    pub strings: Vec<StringLiteral>,
    pub doc_comments: Vec<DocComment>,
}

impl FileModel
{
    /// Class-like declarations, in source order.
    pub fn class_like(&self) -> impl Iterator<Item = &Declaration>
    {
        self.declarations
            .iter()
            .filter(|d| d.kind.is_class_like())
    }
}

/// Imports of one region keyed the way PHP looks them up: class and
/// function aliases case-insensitively, constants exactly.
#[derive(Debug, Clone, Default)]
pub struct ImportTable
{
    pub classes: HashMap<String, String>,
    pub functions: HashMap<String, String>,
    pub constants: HashMap<String, String>,
}

impl ImportTable
{
    pub fn insert(
        &mut self,
        kind: NameKind,
        alias: &str,
        name: String,
    )
    {
        match kind
        {
            NameKind::Class =>
            {
                self.classes
                    .insert(alias.to_ascii_lowercase(), name);
            }
            NameKind::Function =>
            {
                self.functions
                    .insert(alias.to_ascii_lowercase(), name);
            }
            NameKind::Constant =>
            {
                self.constants
                    .insert(alias.to_string(), name);
            }
        }
    }

    pub fn lookup(
        &self,
        kind: NameKind,
        alias: &str,
    ) -> Option<&str>
    {
        match kind
        {
            NameKind::Class => self.classes.get(&alias.to_ascii_lowercase()),
            NameKind::Function => self.functions.get(&alias.to_ascii_lowercase()),
            NameKind::Constant => self.constants.get(alias),
        }
        .map(String::as_str)
    }
}

pub fn last_segment(name: &str) -> &str
{
    name.rsplit('\\')
        .next()
        .unwrap_or(name)
}

pub fn is_ident_start(b: u8) -> bool
{
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

pub fn is_ident_char(b: u8) -> bool
{
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

const BUILTIN_TYPES: &[&str] = &[
    "array", "callable", "bool", "float", "int", "string", "iterable", "object", "mixed", "void",
    "null", "never", "false", "true", "self", "static", "parent",
];

/// Type keywords that never name a class.
pub fn is_builtin_type(name: &str) -> bool
{
    BUILTIN_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name))
}

pub fn is_special_class(name: &str) -> bool
{
    ["self", "static", "parent"]
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name))
}
