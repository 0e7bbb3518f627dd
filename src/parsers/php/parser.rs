//! Filepath: src/parsers/php/parser.rs
//! Builds the `FileModel` of a PHP file from a tree-sitter-php parse.
//!
//! One query captures every node the rewrite engine cares about: namespace
//! and `use` statements, declared names, names in code, string literals and
//! comments. Each capture is then classified by its place in the tree.

use std::{borrow::Cow, cell::RefCell, collections::HashMap};

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use super::{
    literal::{self, Quote},
    model::{
        DeclKind, Declaration, DocComment, FileModel, NameKind, NamespaceRegion, Reference, Span,
        StringLiteral, UseItem, UseStatement, is_builtin_type, is_ident_char,
    },
    validate::{self, SyntaxError},
};

const MODEL_QUERY: &str = r#"
    (namespace_definition) @namespace
    (namespace_use_declaration) @use

    (class_declaration name: (name) @class)
    (interface_declaration name: (name) @interface)
    (trait_declaration name: (name) @trait)
    (enum_declaration name: (name) @enum)
    (function_definition name: (name) @function)
    (const_declaration (const_element . (name) @constant))

    (function_call_expression function: [(name) (qualified_name)] @call)
    [(name) (qualified_name)] @name

    [(string) (encapsed_string)] @string
    (comment) @comment
"#;

/// Reserved words that can sit where a function or constant name would.
const KEYWORDS: &[&str] = &[
    "array", "die", "echo", "empty", "eval", "exit", "include", "include_once", "isset", "list",
    "print", "require", "require_once", "unset", "__class__", "__dir__", "__file__",
    "__function__", "__line__", "__method__", "__namespace__", "__trait__", "__halt_compiler",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture
{
    Namespace,
    Use,
    Declared(DeclKind),
    Call,
    Name,
    Literal,
    Comment,
}

impl Capture
{
    fn from_name(name: &str) -> Option<Self>
    {
        Some(match name
        {
            "namespace" => Self::Namespace,
            "use" => Self::Use,
            "class" => Self::Declared(DeclKind::Class),
            "interface" => Self::Declared(DeclKind::Interface),
            "trait" => Self::Declared(DeclKind::Trait),
            "enum" => Self::Declared(DeclKind::Enum),
            "function" => Self::Declared(DeclKind::Function),
            "constant" => Self::Declared(DeclKind::Constant),
            "call" => Self::Call,
            "name" => Self::Name,
            "string" => Self::Literal,
            "comment" => Self::Comment,
            _ => return None,
        })
    }
}

/// Model plus every grammar error found before `__halt_compiler();`.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile
{
    pub model: FileModel,
    pub errors: Vec<SyntaxError>,
}

impl ParsedFile
{
    /// First error that fails the file. In `strict` mode that is any grammar
    /// error; otherwise only a construct the grammar had to close itself.
    pub fn fatal(
        &self,
        strict: bool,
    ) -> Option<&SyntaxError>
    {
        self.errors
            .iter()
            .find(|e| strict || e.missing)
    }
}

pub struct PhpParser
{
    parser: Parser,
    model_query: Query,
}

impl PhpParser
{
    pub fn new() -> Result<Self>
    {
        let language: Language = tree_sitter_php::LANGUAGE_PHP.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("set PHP language")?;
        let model_query = Query::new(&language, MODEL_QUERY).context("create PHP model query")?;
        Ok(Self { parser, model_query })
    }

    /// Model `src` and collect its grammar errors.
    pub fn parse(
        &mut self,
        src: &[u8],
    ) -> Result<ParsedFile>
    {
        let tree = self.tree(src)?;
        let root = tree.root_node();
        let halt = halt_offset(root, src);
        let errors = validate::errors(root, src, halt);
        let captures = collect_captures(&self.model_query, root, src, halt);
        let model = Builder::new(src).run(&captures);
        Ok(ParsedFile { model, errors })
    }

    /// First grammar error in `src`, if any.
    pub fn check(
        &mut self,
        src: &[u8],
    ) -> Result<Option<SyntaxError>>
    {
        let tree = self.tree(src)?;
        let root = tree.root_node();
        let halt = halt_offset(root, src);
        Ok(validate::errors(root, src, halt)
            .into_iter()
            .next())
    }

    fn tree(
        &mut self,
        src: &[u8],
    ) -> Result<Tree>
    {
        let masked = mask_relative_names(src);
        self.parser
            .parse(masked.as_ref(), None)
            .ok_or_else(|| anyhow!("Failed to parse PHP source"))
    }
}

thread_local! {
    static PARSER: RefCell<Option<PhpParser>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's parser, so rayon workers never contend.
pub fn with_parser<T>(f: impl FnOnce(&mut PhpParser) -> Result<T>) -> Result<T>
{
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none()
        {
            *slot = Some(PhpParser::new()?);
        }
        let parser = slot
            .as_mut()
            .ok_or_else(|| anyhow!("PHP parser unavailable"))?;
        f(parser)
    })
}

pub fn parse(src: &[u8]) -> Result<ParsedFile>
{
    with_parser(|p| p.parse(src))
}

pub fn check(src: &[u8]) -> Result<Option<SyntaxError>>
{
    with_parser(|p| p.check(src))
}

/// PHP lexes `namespace\foo` as one relative name, but the grammar takes
/// the keyword at statement start for a namespace declaration. The tree is
/// built from a copy where that keyword is a plain identifier of the same
/// length, so every byte offset still matches `src`.
fn mask_relative_names(src: &[u8]) -> Cow<'_, [u8]>
{
    const KEYWORD: &[u8] = b"namespace";
    let mut masked: Option<Vec<u8>> = None;
    for sep in memchr::memchr_iter(b'\\', src)
    {
        let Some(start) = sep.checked_sub(KEYWORD.len())
        else
        {
            continue;
        };
        if !src[start..sep].eq_ignore_ascii_case(KEYWORD)
        {
            continue;
        }
        let standalone = start == 0 || (!matches!(src[start - 1], b'\\' | b'$') && !is_ident_char(src[start - 1]));
        if standalone
        {
            masked.get_or_insert_with(|| src.to_vec())[start..sep].copy_from_slice(b"namespac_");
        }
    }
    match masked
    {
        Some(bytes) => Cow::Owned(bytes),
        None => Cow::Borrowed(src),
    }
}

/// End of the `__halt_compiler();` statement; the rest of the file is data.
fn halt_offset(
    root: Node<'_>,
    src: &[u8],
) -> usize
{
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| n.kind() == "expression_statement")
        .find(|stmt| {
            stmt.named_child(0)
                .filter(|call| call.kind() == "function_call_expression")
                .and_then(|call| call.child_by_field_name("function"))
                .is_some_and(|f| src[f.byte_range()].eq_ignore_ascii_case(b"__halt_compiler"))
        })
        .map_or(src.len(), |stmt| stmt.end_byte())
}

fn collect_captures<'t>(
    query: &Query,
    root: Node<'t>,
    src: &[u8],
    halt: usize,
) -> Vec<(Capture, Node<'t>)>
{
    let names = query.capture_names();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, root, src);
    let mut out = Vec::new();

    while let Some(m) = matches.next()
    {
        for cap in m.captures
        {
            let Some(capture) = Capture::from_name(names[cap.index as usize])
            else
            {
                continue;
            };
            if cap
                .node
                .start_byte()
                < halt
            {
                out.push((capture, cap.node));
            }
        }
    }

    out.sort_by_key(|(_, node)| node.start_byte());
    out
}

/// Field name under which `node` hangs off its parent.
fn field_of<'t>(
    node: Node<'t>,
    parent: Node<'t>,
) -> Option<&'static str>
{
    let mut cursor = parent.walk();
    let index = parent
        .children(&mut cursor)
        .position(|child| child.id() == node.id())?;
    parent.field_name_for_child(index as u32)
}

fn is_first_named(
    node: Node<'_>,
    parent: Node<'_>,
) -> bool
{
    parent
        .named_child(0)
        .is_some_and(|first| first.id() == node.id())
}

/// Which symbol table a name in code is looked up in, if any.
fn classify(node: Node<'_>) -> Option<NameKind>
{
    let parent = node.parent()?;
    let field = field_of(node, parent);
    match field
    {
        Some("name" | "alias" | "function") => return None,
        Some("scope") => return Some(NameKind::Class),
        _ =>
        {}
    }

    match parent.kind()
    {
        "qualified_name" | "namespace_name" | "namespace_use_clause" | "namespace_use_declaration"
        | "namespace_definition" | "variable_name" | "named_label_statement" | "goto_statement"
        | "use_as_clause" | "declare_directive" | "ERROR" => None,
        "named_type" | "base_clause" | "class_interface_clause" | "object_creation_expression"
        | "attribute" | "use_declaration" | "use_instead_of_clause" => Some(NameKind::Class),
        "class_constant_access_expression" => is_first_named(node, parent).then_some(NameKind::Class),
        "const_element" => (!is_first_named(node, parent)).then_some(NameKind::Constant),
        "binary_expression" =>
        {
            let instanceof = parent
                .child_by_field_name("operator")
                .is_some_and(|op| op.kind() == "instanceof");
            if instanceof && field == Some("right")
            {
                Some(NameKind::Class)
            }
            else
            {
                Some(NameKind::Constant)
            }
        }
        _ => Some(NameKind::Constant),
    }
}

/// A literal used as a dynamic member or variable name: `${'x'}`,
/// `$o->{'x'}`, `A::{'x'}`.
fn is_dynamic_name(node: Node<'_>) -> bool
{
    let Some(parent) = node.parent()
    else
    {
        return false;
    };
    matches!(parent.kind(), "dynamic_variable_name" | "name") || field_of(node, parent) == Some("name")
}

fn span(node: Node<'_>) -> Span
{
    Span { start: node.start_byte(), end: node.end_byte() }
}

struct Builder<'s>
{
    src: &'s [u8],
    model: FileModel,
    region_starts: Vec<usize>,
    /// String node id to whether the call is `define`
    define_args: HashMap<usize, bool>,
}

impl<'s> Builder<'s>
{
    fn new(src: &'s [u8]) -> Self
    {
        Self {
            src,
            model: FileModel { regions: vec![NamespaceRegion::default()], ..FileModel::default() },
            region_starts: vec![0],
            define_args: HashMap::new(),
        }
    }

    fn text(
        &self,
        node: Node<'_>,
    ) -> Cow<'s, str>
    {
        let src: &'s [u8] = self.src;
        String::from_utf8_lossy(&src[node.byte_range()])
    }

    fn region_for(
        &self,
        offset: usize,
    ) -> usize
    {
        self.region_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn qualify(
        &self,
        region: usize,
        name: &str,
    ) -> String
    {
        let namespace = &self.model.regions[region].name;
        if namespace.is_empty()
        {
            name.to_string()
        }
        else
        {
            format!("{namespace}\\{name}")
        }
    }

    fn run(
        mut self,
        captures: &[(Capture, Node<'_>)],
    ) -> FileModel
    {
        // Regions and define() arguments first; everything else looks them up
        for &(capture, node) in captures
        {
            match capture
            {
                Capture::Namespace => self.namespace(node),
                Capture::Call => self.mark_define_arg(node),
                _ =>
                {}
            }
        }

        for &(capture, node) in captures
        {
            match capture
            {
                Capture::Namespace =>
                {}
                Capture::Use =>
                {
                    let region = self.region_for(node.start_byte());
                    let stmt = self.use_statement(node);
                    self.model.regions[region]
                        .uses
                        .push(stmt);
                }
                Capture::Declared(kind) => self.declaration(kind, node),
                Capture::Call => self.reference(node, NameKind::Function),
                Capture::Name =>
                {
                    if let Some(kind) = classify(node)
                    {
                        self.reference(node, kind);
                    }
                }
                Capture::Literal => self.literal(node),
                Capture::Comment => self.comment(node),
            }
        }

        self.model
    }

    fn namespace(
        &mut self,
        node: Node<'_>,
    )
    {
        let name = node.child_by_field_name("name");
        let region = NamespaceRegion {
            name: name
                .map(|n| {
                    self.text(n)
                        .trim_start_matches('\\')
                        .to_string()
                })
                .unwrap_or_default(),
            name_span: name.map(span),
            uses: Vec::new(),
        };
        self.model
            .regions
            .push(region);
        self.region_starts
            .push(node.start_byte());
    }

    fn mark_define_arg(
        &mut self,
        callee: Node<'_>,
    )
    {
        let bare = self
            .text(callee)
            .trim_start_matches('\\')
            .to_ascii_lowercase();
        if !matches!(bare.as_str(), "define" | "defined" | "constant")
        {
            return;
        }
        let Some(args) = callee
            .parent()
            .and_then(|call| call.child_by_field_name("arguments"))
        else
        {
            return;
        };
        let mut cursor = args.walk();
        let first = args
            .named_children(&mut cursor)
            .find(|arg| arg.kind() == "argument")
            .filter(|arg| arg.child_by_field_name("name").is_none())
            .and_then(|arg| arg.named_child(0))
            .filter(|value| matches!(value.kind(), "string" | "encapsed_string"));
        if let Some(value) = first
        {
            self.define_args
                .insert(value.id(), bare == "define");
        }
    }

    fn use_statement(
        &self,
        node: Node<'_>,
    ) -> UseStatement
    {
        let body = node.child_by_field_name("body");
        let mut cursor = node.walk();

        let prefix = body.and_then(|_| {
            let name = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "namespace_name")?;
            let end = name
                .next_sibling()
                .filter(|sep| sep.kind() == "\\")
                .map_or(name.end_byte(), |sep| sep.end_byte());
            Some((Span { start: name.start_byte(), end }, self.text(name).into_owned()))
        });

        let clauses: Vec<Node<'_>> = match body
        {
            Some(group) => group
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "namespace_use_clause")
                .collect(),
            None => node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "namespace_use_clause")
                .collect(),
        };

        let type_of = |n: Node<'_>| {
            n.child_by_field_name("type")
                .map(|t| match t.kind()
                {
                    "function" => NameKind::Function,
                    "const" => NameKind::Constant,
                    _ => NameKind::Class,
                })
        };
        // `use function A, B;` marks only the first clause
        let shared = match body
        {
            Some(_) => type_of(node),
            None => clauses
                .first()
                .and_then(|c| type_of(*c)),
        };

        let items = clauses
            .iter()
            .filter_map(|&clause| {
                let mut inner = clause.walk();
                let name = clause
                    .named_children(&mut inner)
                    .find(|c| matches!(c.kind(), "name" | "qualified_name"))?;
                let kind = type_of(clause)
                    .or(shared)
                    .unwrap_or(NameKind::Class);
                Some(UseItem {
                    kind,
                    span: span(name),
                    text: self.text(name).into_owned(),
                    alias: clause
                        .child_by_field_name("alias")
                        .map(|a| self.text(a).into_owned()),
                })
            })
            .collect();

        UseStatement { span: span(node), prefix, items }
    }

    fn declaration(
        &mut self,
        kind: DeclKind,
        name: Node<'_>,
    )
    {
        if kind == DeclKind::Constant
        {
            // Class and enum constants live in their class, not the namespace
            let in_class = name
                .parent()
                .and_then(|element| element.parent())
                .and_then(|decl| decl.parent())
                .is_some_and(|owner| matches!(owner.kind(), "declaration_list" | "enum_declaration_list"));
            if in_class
            {
                return;
            }
        }
        let region = self.region_for(name.start_byte());
        let text = self.text(name);
        let declaration = Declaration { kind, name: self.qualify(region, &text), span: Some(span(name)), region };
        self.model
            .declarations
            .push(declaration);
    }

    fn reference(
        &mut self,
        node: Node<'_>,
        kind: NameKind,
    )
    {
        let text = self.text(node);
        if !text.contains('\\')
        {
            let reserved = match kind
            {
                NameKind::Class => is_builtin_type(&text),
                NameKind::Function | NameKind::Constant => KEYWORDS.contains(&text.to_ascii_lowercase().as_str()),
            };
            if reserved
            {
                return;
            }
        }
        let region = self.region_for(node.start_byte());
        self.model
            .references
            .push(Reference { kind, span: span(node), text: text.into_owned(), region });
    }

    fn literal(
        &mut self,
        node: Node<'_>,
    )
    {
        if is_dynamic_name(node)
        {
            return;
        }
        let mut start = node.start_byte();
        if matches!(self.src.get(start), Some(b'b' | b'B'))
        {
            start += 1;
        }
        let quote = match (node.kind(), self.src.get(start))
        {
            ("string", Some(b'\'')) => Quote::Single,
            ("encapsed_string", Some(b'"')) => Quote::Double,
            _ => return,
        };
        let span = Span { start, end: node.end_byte() };
        let region = self.region_for(start);
        let define = self
            .define_args
            .get(&node.id())
            .copied();

        let declared = define
            .filter(|is_define| *is_define)
            .and_then(|_| literal::decode(&self.src[span.start..span.end], quote));
        if let Some(value) = declared
        {
            self.model
                .declarations
                .push(Declaration {
                    kind: DeclKind::Constant,
                    name: value
                        .trim_start_matches('\\')
                        .to_string(),
                    span: None,
                    region,
                });
        }
        self.model
            .strings
            .push(StringLiteral { span, quote, region, define_arg: define.is_some() });
    }

    fn comment(
        &mut self,
        node: Node<'_>,
    )
    {
        // `/**/` is an ordinary comment, `/** ` opens a doc comment
        let bytes = &self.src[node.byte_range()];
        let is_doc = bytes.starts_with(b"/**")
            && bytes
                .get(3)
                .is_some_and(|c| c.is_ascii_whitespace());
        if is_doc
        {
            let region = self.region_for(node.start_byte());
            self.model
                .doc_comments
                .push(DocComment { span: span(node), region });
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn model(src: &[u8]) -> FileModel
    {
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.errors, vec![], "unexpected grammar errors");
        parsed.model
    }

    fn refs(
        model: &FileModel,
        kind: NameKind,
    ) -> Vec<&str>
    {
        model
            .references
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.text.as_str())
            .collect()
    }

    #[test]
    fn namespaces_imports_and_declarations()
    {
        let src = br#"<?php
namespace Psr\Log;

use Other\Thing;
use Other\Helper as H;
use function Other\fmt;

interface LoggerInterface extends Thing {}
abstract class AbstractLogger implements LoggerInterface {}
function helper() {}
const LEVEL = 1, OTHER = 2;
"#;
        let model = model(src);
        assert_eq!(model.regions.len(), 2);
        let region = &model.regions[1];
        assert_eq!(region.name, "Psr\\Log");
        let imports: Vec<_> = region.imports().collect();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[1].alias, "H");
        assert!(imports[1].explicit_alias);
        assert_eq!(imports[2].name, "Other\\fmt");
        assert_eq!(imports[2].kind, NameKind::Function);

        let decls: Vec<_> = model
            .declarations
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            decls,
            vec![
                (DeclKind::Interface, "Psr\\Log\\LoggerInterface"),
                (DeclKind::Class, "Psr\\Log\\AbstractLogger"),
                (DeclKind::Function, "Psr\\Log\\helper"),
                (DeclKind::Constant, "Psr\\Log\\LEVEL"),
                (DeclKind::Constant, "Psr\\Log\\OTHER"),
            ]
        );
        assert_eq!(refs(&model, NameKind::Class), vec!["Thing", "LoggerInterface"]);
    }

    #[test]
    fn group_use_with_mixed_kinds()
    {
        let src = b"<?php use A\\B\\{C, D as E, function f, const G};";
        let model = model(src);
        let stmt = &model.regions[0].uses[0];
        let (prefix_span, prefix) = stmt.prefix.as_ref().unwrap();
        assert_eq!(prefix, "A\\B");
        assert_eq!(&src[prefix_span.start..prefix_span.end], b"A\\B\\");
        assert_eq!(&src[stmt.span.start..stmt.span.end], &src[6..]);
        let imports: Vec<_> = stmt
            .imports()
            .map(|i| (i.kind, i.name, i.alias))
            .collect();
        assert_eq!(
            imports,
            vec![
                (NameKind::Class, "A\\B\\C".into(), "C".into()),
                (NameKind::Class, "A\\B\\D".into(), "E".into()),
                (NameKind::Function, "A\\B\\f".into(), "f".into()),
                (NameKind::Constant, "A\\B\\G".into(), "G".into()),
            ]
        );
    }

    #[test]
    fn use_function_applies_to_every_clause()
    {
        let model = model(b"<?php use function A\\x, B\\y as z;");
        let kinds: Vec<_> = model.regions[0]
            .imports()
            .map(|i| (i.kind, i.alias))
            .collect();
        assert_eq!(kinds, vec![(NameKind::Function, "x".into()), (NameKind::Function, "z".into())]);
    }

    #[test]
    fn type_positions_are_class_references()
    {
        let src = br#"<?php
class A {
    use T1, T2 { T1::hello insteadof T2; }
    public ?Foo $a;
    private static Bar|Baz $b;
    public const Qux TYPED = 1;
    #[Attr(Inner::X)]
    public function m(Param $p, int $i, (X&Y)|null $z = new Dflt()): ?Ret {
        try { } catch (E1 | E2 $e) { }
        $f = fn(Arrow $a): ArrowRet => $a instanceof Check;
        $c = function (Closure $c) use ($f): static {};
        return new Made(Stat::call(), CONST_REF, \Fully\Qualified::class);
    }
}
"#;
        let model = model(src);
        let classes = refs(&model, NameKind::Class);
        for expected in [
            "T1", "T2", "Foo", "Bar", "Baz", "Qux", "Attr", "Inner", "Param", "X", "Y", "Dflt",
            "Ret", "E1", "E2", "Arrow", "ArrowRet", "Check", "Closure", "Made", "Stat",
            "\\Fully\\Qualified",
        ]
        {
            assert!(classes.contains(&expected), "missing {expected} in {classes:?}");
        }
        assert!(!classes.contains(&"int"));
        assert!(!classes.contains(&"static"));
        assert!(!classes.contains(&"hello"));
        assert_eq!(refs(&model, NameKind::Constant), vec!["CONST_REF"]);
        // Method names and class constants are not declarations
        assert_eq!(model.declarations.len(), 1);
    }

    #[test]
    fn functions_and_define_constants()
    {
        let src = br#"<?php
if (!function_exists('helper')) {
    function helper() { return strlen('x'); }
}
define('MY_CONST', 1);
echo \Some\func(named: 1), MY_CONST;
"#;
        let model = model(src);
        assert!(
            model
                .declarations
                .iter()
                .any(|d| d.kind == DeclKind::Function && d.name == "helper")
        );
        assert!(
            model
                .declarations
                .iter()
                .any(|d| d.kind == DeclKind::Constant && d.name == "MY_CONST" && d.span.is_none())
        );
        let functions = refs(&model, NameKind::Function);
        assert!(functions.contains(&"function_exists"));
        assert!(functions.contains(&"\\Some\\func"));
        assert!(!refs(&model, NameKind::Constant).contains(&"named"));
        assert!(refs(&model, NameKind::Constant).contains(&"MY_CONST"));
        assert_eq!(
            model
                .strings
                .iter()
                .filter(|s| s.define_arg)
                .count(),
            1
        );
    }

    #[test]
    fn enums_and_anonymous_classes()
    {
        let src = br#"<?php
namespace App;
enum Suit: string implements HasLabel {
    case Hearts = 'H';
    public function label(): string { return Label::for($this); }
}
$x = new class(1) extends Base { public function run() {} };
"#;
        let model = model(src);
        assert!(
            model
                .declarations
                .iter()
                .any(|d| d.kind == DeclKind::Enum && d.name == "App\\Suit")
        );
        // `run` and `label` are methods
        assert!(
            !model
                .declarations
                .iter()
                .any(|d| d.kind == DeclKind::Function)
        );
        let classes = refs(&model, NameKind::Class);
        assert!(classes.contains(&"HasLabel"));
        assert!(classes.contains(&"Label"));
        assert!(classes.contains(&"Base"));
        assert!(!classes.contains(&"Hearts"));
    }

    #[test]
    fn bracketed_namespaces_and_doc_comment_regions()
    {
        let src = b"<?php\n/** @var \\X */\nnamespace A { /** @var Y */ class C {} }\nnamespace { new \\A\\C; }\n";
        let model = model(src);
        assert_eq!(model.regions.len(), 3);
        assert_eq!(model.regions[1].name, "A");
        assert_eq!(model.regions[2].name, "");
        assert_eq!(model.doc_comments[0].region, 0);
        assert_eq!(model.doc_comments[1].region, 1);
        assert_eq!(model.references[0].region, 2);
    }

    #[test]
    fn relative_names_are_references_not_namespaces()
    {
        let src = b"<?php\nnamespace Lib;\nnamespace\\helper();\nnamespace\\Foo::bar();\n$x = new namespace\\Foo(namespace\\F::G);\n";
        let model = model(src);
        assert_eq!(model.regions.len(), 2);
        assert_eq!(refs(&model, NameKind::Function), vec!["namespace\\helper"]);
        let classes = refs(&model, NameKind::Class);
        assert_eq!(classes, vec!["namespace\\Foo", "namespace\\Foo", "namespace\\F"]);
    }

    #[test]
    fn dynamic_member_names_are_not_string_literals()
    {
        let src = b"<?php ${'Pimple'}; A::{'Pimple'}; $o->{\"Pimple\"}(); echo 'Pimple';";
        let model = model(src);
        assert_eq!(model.strings.len(), 1);
        assert_eq!(&src[model.strings[0].span.start..model.strings[0].span.end], b"'Pimple'");
    }

    #[test]
    fn binary_prefix_is_outside_the_literal()
    {
        let src = b"<?php $a = b'Pimple';";
        let model = model(src);
        let string = &model.strings[0];
        assert_eq!(string.quote, Quote::Single);
        assert_eq!(&src[string.span.start..string.span.end], b"'Pimple'");
    }

    #[test]
    fn nothing_after_halt_compiler_is_modelled()
    {
        let src = b"<?php\nnamespace App;\nnew \\Pimple;\n__halt_compiler();\nnew Other; class Data {";
        let parsed = parse(src).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(refs(&parsed.model, NameKind::Class), vec!["\\Pimple"]);
        assert!(parsed.model.declarations.is_empty());
    }

    #[test]
    fn unclosed_brace_is_fatal_even_when_lenient()
    {
        let parsed = parse(b"<?php class A { function f() { }").unwrap();
        assert!(parsed.fatal(false).is_some());
        let parsed = parse(b"<?php }").unwrap();
        assert_eq!(parsed.fatal(true).map(|e| e.offset), Some(6));
        assert!(parsed.fatal(false).is_none());
    }
}
