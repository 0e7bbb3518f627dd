//! Name resolution, the way PHP resolves names at compile time.
//!
//! A `NameScope` is one namespace region seen either before or after the
//! rewrite. Resolving the same written text in both scopes tells the engine
//! whether the text still means the right symbol once namespaces and
//! imports have been renamed.

use crate::{
    core::table::{RenameRules, split_name},
    parsers::php::{ImportTable, NameKind, NamespaceRegion},
};

/// Namespace plus imports of one region.
#[derive(Debug, Clone, Default)]
pub struct NameScope
{
    pub namespace: String,
    pub imports: ImportTable,
}

/// Which side of the rewrite a scope describes; decides which symbol set the
/// function and constant global fallback consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side
{
    Original,
    Rewritten,
}

impl NameScope
{
    /// Scope of `region` as written.
    pub fn original(region: &NamespaceRegion) -> Self
    {
        let mut imports = ImportTable::default();
        for import in region.imports()
        {
            imports.insert(import.kind, &import.alias, import.name);
        }
        Self { namespace: region.name.clone(), imports }
    }

    /// Scope of `region` after renaming. Aliases are unchanged (the rewrite
    /// adds `as Alias` wherever the last segment changes).
    pub fn rewritten(
        region: &NamespaceRegion,
        rules: &RenameRules,
        keep_namespace: bool,
    ) -> Self
    {
        let namespace = if keep_namespace || region.name.is_empty()
        {
            region.name.clone()
        }
        else
        {
            rules
                .map_namespace(&region.name)
                .unwrap_or_else(|| region.name.clone())
        };
        let mut imports = ImportTable::default();
        for import in region.imports()
        {
            let target = map_name(rules, import.kind, &import.name).unwrap_or(import.name);
            imports.insert(import.kind, &import.alias, target);
        }
        Self { namespace, imports }
    }

    fn qualify(
        &self,
        name: &str,
    ) -> String
    {
        if self
            .namespace
            .is_empty()
        {
            name.to_string()
        }
        else
        {
            format!("{}\\{name}", self.namespace)
        }
    }

    /// Fully-qualified name (no leading separator) that `text` denotes here.
    pub fn resolve(
        &self,
        kind: NameKind,
        text: &str,
        rules: &RenameRules,
        side: Side,
    ) -> String
    {
        if let Some(fq) = text.strip_prefix('\\')
        {
            return fq.to_string();
        }
        if text
            .get(..10)
            .is_some_and(|head| head.eq_ignore_ascii_case("namespace\\"))
        {
            return self.qualify(&text[10..]);
        }

        if let Some((first, rest)) = text.split_once('\\')
        {
            // Qualified names resolve their first segment through class imports
            return match self
                .imports
                .lookup(NameKind::Class, first)
            {
                Some(import) => format!("{import}\\{rest}"),
                None => self.qualify(text),
            };
        }

        if let Some(import) = self
            .imports
            .lookup(kind, text)
        {
            return import.to_string();
        }
        if kind == NameKind::Class
            || self
                .namespace
                .is_empty()
        {
            return self.qualify(text);
        }

        // Unqualified functions and constants fall back to the global name
        let local = self.qualify(text);
        let known = match (kind, side)
        {
            (NameKind::Function, Side::Original) => rules.is_declared_function(&local),
            (NameKind::Function, Side::Rewritten) => rules.is_target_function(&local),
            (_, Side::Original) => rules.is_declared_constant(&local),
            (_, Side::Rewritten) => rules.is_target_constant(&local),
        };
        if known { local } else { text.to_string() }
    }
}

/// Target of a fully-qualified name, `None` when it is not renamed.
pub fn map_name(
    rules: &RenameRules,
    kind: NameKind,
    name: &str,
) -> Option<String>
{
    match kind
    {
        NameKind::Class => rules.map_class(name),
        NameKind::Function => rules.map_function(name),
        NameKind::Constant => rules.map_constant(name),
    }
}

/// Same symbol under PHP's case rules for `kind`.
pub fn same_name(
    kind: NameKind,
    a: &str,
    b: &str,
) -> bool
{
    let (a, b) = (a.trim_start_matches('\\'), b.trim_start_matches('\\'));
    match kind
    {
        NameKind::Constant =>
        {
            let ((ans, ashort), (bns, bshort)) = (split_name(a), split_name(b));
            ashort == bshort && ans.eq_ignore_ascii_case(bns)
        }
        _ => a.eq_ignore_ascii_case(b),
    }
}

/// Replacement text for a reference written as `text`, or `None` when the
/// text already resolves to the renamed symbol in the rewritten scope.
///
/// Fully-qualified references stay fully qualified. Others take the
/// same-namespace relative form when it resolves, else the fully-qualified
/// form.
pub fn plan_reference(
    kind: NameKind,
    text: &str,
    original: &NameScope,
    rewritten: &NameScope,
    rules: &RenameRules,
) -> Option<String>
{
    let resolved = original.resolve(kind, text, rules, Side::Original);
    let target = map_name(rules, kind, &resolved).unwrap_or(resolved);
    let now = rewritten.resolve(kind, text, rules, Side::Rewritten);
    if same_name(kind, &now, &target)
    {
        return None;
    }

    if !text.starts_with('\\')
    {
        let relative = if rewritten
            .namespace
            .is_empty()
        {
            Some(target.clone())
        }
        else
        {
            let ns_len = rewritten
                .namespace
                .len();
            target
                .get(..ns_len)
                .filter(|head| head.eq_ignore_ascii_case(&rewritten.namespace))
                .and_then(|_| target.get(ns_len..))
                .and_then(|rest| rest.strip_prefix('\\'))
                .map(str::to_string)
        };
        if let Some(rel) = relative.filter(|rel| {
            let back = rewritten.resolve(kind, rel, rules, Side::Rewritten);
            same_name(kind, &back, &target)
        })
        {
            return Some(rel);
        }
    }
    Some(format!("\\{target}"))
}
