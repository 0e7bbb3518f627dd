//! Rename table: every discovered symbol mapped to its prefixed name.
//!
//! Built once per run, before any file is rewritten, and shared read-only by
//! every rewrite task. Lookups follow PHP's own case rules: namespaces,
//! classes and functions are case-insensitive, constant names are not.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::LazyLock,
};

use globset::GlobSet;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::{
    core::{
        error::PrefixError,
        symbols::{Symbol, SymbolKind},
    },
    infra::{config::PrefixSettings, walk::compile_globs},
};

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*$")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Why a symbol keeps its original name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassThrough
{
    ExcludedNamespace,
    ExcludedPackage,
    ExcludedFilePattern,
    AlreadyPrefixed,
    NoPrefixConfigured,
}

impl fmt::Display for PassThrough
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        let text = match self
        {
            Self::ExcludedNamespace => "excluded namespace",
            Self::ExcludedPackage => "excluded package",
            Self::ExcludedFilePattern => "excluded file pattern",
            Self::AlreadyPrefixed => "already prefixed",
            Self::NoPrefixConfigured => "no prefix configured",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility
{
    Prefixed,
    PassThrough(PassThrough),
}

/// One reported mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule
{
    pub kind: SymbolKind,
    pub original: String,
    pub target: String,
    pub eligibility: Eligibility,
}

/// Inputs of the table that come from configuration.
#[derive(Debug, Clone, Default)]
pub struct TableConfig
{
    pub namespace_prefix: String,
    pub classmap_prefix: String,
    pub functions_prefix: Option<String>,
    pub constants_prefix: Option<String>,
    pub exclude_namespaces: Vec<String>,
    pub exclude_packages: Vec<String>,
    pub exclude_file_patterns: Vec<String>,
    pub overrides: BTreeMap<String, String>,
}

impl From<&PrefixSettings> for TableConfig
{
    fn from(s: &PrefixSettings) -> Self
    {
        Self {
            namespace_prefix: s
                .namespace_prefix
                .clone(),
            classmap_prefix: s
                .classmap_prefix
                .clone(),
            functions_prefix: s
                .functions_prefix
                .clone(),
            constants_prefix: s
                .constants_prefix
                .clone(),
            exclude_namespaces: s
                .exclude_from_prefix
                .namespaces
                .clone(),
            exclude_packages: s
                .exclude_from_prefix
                .packages
                .clone(),
            exclude_file_patterns: s
                .exclude_from_prefix
                .file_patterns
                .clone(),
            overrides: s
                .overrides
                .clone(),
        }
    }
}

impl TableConfig
{
    /// Package- or file-level exclusion for a declaring file.
    pub fn file_exclusion(
        &self,
        patterns: &GlobSet,
        package: &str,
        file: &str,
    ) -> Option<PassThrough>
    {
        if self
            .exclude_packages
            .iter()
            .any(|p| p.eq_ignore_ascii_case(package))
        {
            return Some(PassThrough::ExcludedPackage);
        }
        if patterns.is_match(file)
        {
            return Some(PassThrough::ExcludedFilePattern);
        }
        None
    }
}

/// Case-insensitive lookup key for namespaces, classes and functions.
fn fold(name: &str) -> String
{
    name.to_ascii_lowercase()
}

/// `prefix` is a whole-segment prefix of `name` (case-insensitive).
pub fn has_segment_prefix(
    name: &str,
    prefix: &str,
) -> bool
{
    if prefix.is_empty()
    {
        return false;
    }
    let (n, p) = (fold(name), fold(prefix));
    n == p || (n.starts_with(&p) && n.as_bytes().get(p.len()) == Some(&b'\\'))
}

/// Split `A\B\C` into (`A\B`, `C`); global names have an empty namespace.
pub fn split_name(name: &str) -> (&str, &str)
{
    match name.rfind('\\')
    {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

#[derive(Debug, Default)]
pub struct RenameRules
{
    /// folded namespace -> target
    namespaces: HashMap<String, String>,
    /// folded global class -> target
    global_classes: HashMap<String, String>,
    /// folded global function -> target
    global_functions: HashMap<String, String>,
    /// exact global constant -> target
    global_constants: HashMap<String, String>,
    /// folded FQN of namespaced symbols that keep their name inside a
    /// prefixed namespace (declared by excluded packages or files)
    pinned: HashSet<(SymbolKind, String)>,
    known_classes: HashSet<String>,
    declared_functions: HashSet<String>,
    target_functions: HashSet<String>,
    declared_constants: HashSet<String>,
    target_constants: HashSet<String>,
    rules: Vec<Rule>,
}

/// Pinned-set key: classes share one symbol table in PHP.
fn pin_key(
    kind: SymbolKind,
    name: &str,
) -> (SymbolKind, String)
{
    match kind
    {
        SymbolKind::Constant => (kind, constant_key(name)),
        k if k.is_class_like() => (SymbolKind::Class, fold(name)),
        k => (k, fold(name)),
    }
}

/// Constants: namespace part folded, short name exact.
fn constant_key(name: &str) -> String
{
    let (ns, short) = split_name(name);
    if ns.is_empty() { short.to_string() } else { format!("{}\\{short}", fold(ns)) }
}

pub fn validate_name(name: &str) -> Result<(), PrefixError>
{
    let ok = !name.is_empty()
        && name
            .split('\\')
            .all(|seg| SEGMENT.is_match(seg));
    if ok { Ok(()) } else { Err(PrefixError::MalformedSymbolName { name: name.to_string() }) }
}

impl RenameRules
{
    /// Build the table from every discovered symbol.
    pub fn build(
        symbols: &[Symbol],
        cfg: &TableConfig,
    ) -> Result<Self, PrefixError>
    {
        let patterns = compile_globs(&cfg.exclude_file_patterns)
            .map_err(|e| PrefixError::config(format!("invalid file pattern: {e}")))?;
        for target in cfg
            .overrides
            .values()
        {
            validate_name(target).map_err(|_| PrefixError::config(format!("invalid override target `{target}`")))?;
        }

        let mut table = Self::default();
        let mut checker = CollisionChecker::default();

        // Namespaces first: every other namespaced symbol follows them
        let mut ns_decls: BTreeMap<String, (String, bool)> = BTreeMap::new();
        for sym in symbols
        {
            validate_name(&sym.name)?;
            let ns = match sym.kind
            {
                SymbolKind::Namespace => sym.name.as_str(),
                _ => split_name(&sym.name).0,
            };
            if ns.is_empty()
            {
                continue;
            }
            let excluded = cfg
                .file_exclusion(&patterns, &sym.package, &sym.file)
                .is_some();
            let entry = ns_decls
                .entry(fold(ns))
                .or_insert_with(|| (ns.to_string(), true));
            // A namespace stays untouched only if every declarant is excluded
            entry.1 &= excluded;
        }

        for (key, (original, all_excluded)) in ns_decls
        {
            let (target, eligibility) = namespace_target(&original, all_excluded, cfg);
            checker.check(SymbolKind::Namespace, &original, &target)?;
            table
                .rules
                .push(Rule { kind: SymbolKind::Namespace, original, target: target.clone(), eligibility });
            table
                .namespaces
                .insert(key, target);
        }

        for sym in symbols
            .iter()
            .filter(|s| s.kind != SymbolKind::Namespace)
        {
            let exclusion = cfg.file_exclusion(&patterns, &sym.package, &sym.file);
            let (target, eligibility) = if sym.is_global()
            {
                table.global_target(sym, exclusion, cfg)?
            }
            else if let Some(reason) = exclusion
            {
                table
                    .pinned
                    .insert(pin_key(sym.kind, &sym.name));
                (sym.name.clone(), Eligibility::PassThrough(reason))
            }
            else
            {
                let target = table
                    .map_qualified(&sym.name)
                    .unwrap_or_else(|| sym.name.clone());
                let eligibility = if target == sym.name
                {
                    Eligibility::PassThrough(PassThrough::AlreadyPrefixed)
                }
                else
                {
                    Eligibility::Prefixed
                };
                (target, eligibility)
            };

            checker.check(sym.kind, &sym.name, &target)?;

            match sym.kind
            {
                k if k.is_class_like() =>
                {
                    table
                        .known_classes
                        .insert(sym.name.clone());
                    if sym.is_global()
                    {
                        table
                            .global_classes
                            .insert(fold(&sym.name), target.clone());
                    }
                }
                SymbolKind::Function =>
                {
                    table
                        .declared_functions
                        .insert(fold(&sym.name));
                    table
                        .target_functions
                        .insert(fold(&target));
                    if sym.is_global()
                    {
                        table
                            .global_functions
                            .insert(fold(&sym.name), target.clone());
                    }
                }
                SymbolKind::Constant =>
                {
                    table
                        .declared_constants
                        .insert(constant_key(&sym.name));
                    table
                        .target_constants
                        .insert(constant_key(&target));
                    if sym.is_global()
                    {
                        table
                            .global_constants
                            .insert(sym.name.clone(), target.clone());
                    }
                }
                _ => {}
            }

            if checker.first_rule(sym.kind, &sym.name)
            {
                table
                    .rules
                    .push(Rule { kind: sym.kind, original: sym.name.clone(), target, eligibility });
            }
        }

        table
            .rules
            .sort_by(|a, b| (a.kind, &a.original).cmp(&(b.kind, &b.original)));
        debug!(rules = table.rules.len(), "rename table built");
        Ok(table)
    }

    fn global_target(
        &self,
        sym: &Symbol,
        exclusion: Option<PassThrough>,
        cfg: &TableConfig,
    ) -> Result<(String, Eligibility), PrefixError>
    {
        if let Some(reason) = exclusion
        {
            return Ok((sym.name.clone(), Eligibility::PassThrough(reason)));
        }

        let prefix = match sym.kind
        {
            k if k.is_class_like() =>
            {
                if let Some(target) = cfg
                    .overrides
                    .iter()
                    .find(|(from, _)| from.eq_ignore_ascii_case(&sym.name))
                    .map(|(_, to)| to)
                {
                    if target.contains('\\')
                    {
                        return Err(PrefixError::config(format!(
                            "override for global class `{}` must not contain a namespace",
                            sym.name
                        )));
                    }
                    let eligibility = if *target == sym.name
                    {
                        Eligibility::PassThrough(PassThrough::AlreadyPrefixed)
                    }
                    else
                    {
                        Eligibility::Prefixed
                    };
                    return Ok((target.clone(), eligibility));
                }
                Some(cfg.classmap_prefix.as_str())
            }
            SymbolKind::Function => cfg.functions_prefix.as_deref(),
            SymbolKind::Constant => cfg.constants_prefix.as_deref(),
            _ => None,
        };

        let Some(prefix) = prefix.filter(|p| !p.is_empty())
        else
        {
            return Ok((sym.name.clone(), Eligibility::PassThrough(PassThrough::NoPrefixConfigured)));
        };

        let already = match sym.kind
        {
            SymbolKind::Constant => sym.name.starts_with(prefix),
            _ => fold(&sym.name).starts_with(&fold(prefix)),
        };
        if already
        {
            return Ok((sym.name.clone(), Eligibility::PassThrough(PassThrough::AlreadyPrefixed)));
        }
        Ok((format!("{prefix}{}", sym.name), Eligibility::Prefixed))
    }

    /// Map a qualified name through the longest declared namespace that is a
    /// whole-segment prefix of it. `None` when no declared namespace covers it.
    fn map_qualified(
        &self,
        name: &str,
    ) -> Option<String>
    {
        let name = name.trim_start_matches('\\');
        let folded = fold(name);
        let mut end = folded.len();
        loop
        {
            if let Some(target) = self
                .namespaces
                .get(&folded[..end])
            {
                return Some(format!("{target}{}", &name[end..]));
            }
            end = folded[..end].rfind('\\')?;
        }
    }

    /// Target of a namespace (or any name below a declared namespace).
    pub fn map_namespace(
        &self,
        ns: &str,
    ) -> Option<String>
    {
        self.map_qualified(ns)
    }

    pub fn map_class(
        &self,
        name: &str,
    ) -> Option<String>
    {
        let name = name.trim_start_matches('\\');
        if !name.contains('\\')
        {
            return self
                .global_classes
                .get(&fold(name))
                .cloned();
        }
        if self
            .pinned
            .contains(&(SymbolKind::Class, fold(name)))
        {
            return Some(name.to_string());
        }
        self.map_qualified(name)
    }

    pub fn map_function(
        &self,
        name: &str,
    ) -> Option<String>
    {
        let name = name.trim_start_matches('\\');
        if !name.contains('\\')
        {
            return self
                .global_functions
                .get(&fold(name))
                .cloned();
        }
        if self
            .pinned
            .contains(&(SymbolKind::Function, fold(name)))
        {
            return Some(name.to_string());
        }
        self.map_qualified(name)
    }

    pub fn map_constant(
        &self,
        name: &str,
    ) -> Option<String>
    {
        let name = name.trim_start_matches('\\');
        if !name.contains('\\')
        {
            return self
                .global_constants
                .get(name)
                .cloned();
        }
        if self
            .pinned
            .contains(&(SymbolKind::Constant, constant_key(name)))
        {
            return Some(name.to_string());
        }
        self.map_qualified(name)
    }

    /// Exact, case-sensitive match against a declared class-like name.
    pub fn is_known_class(
        &self,
        name: &str,
    ) -> bool
    {
        self.known_classes
            .contains(name)
    }

    pub fn is_declared_function(
        &self,
        name: &str,
    ) -> bool
    {
        self.declared_functions
            .contains(&fold(name))
    }

    pub fn is_target_function(
        &self,
        name: &str,
    ) -> bool
    {
        self.target_functions
            .contains(&fold(name))
    }

    pub fn is_declared_constant(
        &self,
        name: &str,
    ) -> bool
    {
        self.declared_constants
            .contains(&constant_key(name))
    }

    pub fn is_target_constant(
        &self,
        name: &str,
    ) -> bool
    {
        self.target_constants
            .contains(&constant_key(name))
    }

    /// Every rule, sorted by kind then original name.
    pub fn rules(&self) -> &[Rule]
    {
        &self.rules
    }
}

fn namespace_target(
    ns: &str,
    all_excluded: bool,
    cfg: &TableConfig,
) -> (String, Eligibility)
{
    if cfg
        .exclude_namespaces
        .iter()
        .any(|ex| has_segment_prefix(ns, ex.trim_matches('\\')))
    {
        return (ns.to_string(), Eligibility::PassThrough(PassThrough::ExcludedNamespace));
    }
    if all_excluded
    {
        return (ns.to_string(), Eligibility::PassThrough(PassThrough::ExcludedPackage));
    }

    let already = has_segment_prefix(ns, &cfg.namespace_prefix)
        || cfg
            .overrides
            .values()
            .any(|target| target.contains('\\') && has_segment_prefix(ns, target));
    if already
    {
        return (ns.to_string(), Eligibility::PassThrough(PassThrough::AlreadyPrefixed));
    }

    // Longest override covering this namespace wins
    let matched = cfg
        .overrides
        .iter()
        .filter(|(from, _)| has_segment_prefix(ns, from))
        .max_by_key(|(from, _)| from.len());
    let target = match matched
    {
        Some((from, to)) => format!("{to}{}", &ns[from.len()..]),
        None => format!("{}\\{ns}", cfg.namespace_prefix),
    };
    (target, Eligibility::Prefixed)
}

/// Detects two distinct originals that map to the same target.
#[derive(Default)]
struct CollisionChecker
{
    /// (kind group, target key) -> original
    targets: HashMap<(u8, String), String>,
    seen: HashSet<(u8, String)>,
}

impl CollisionChecker
{
    fn group(kind: SymbolKind) -> u8
    {
        match kind
        {
            SymbolKind::Namespace => 0,
            SymbolKind::Function => 2,
            SymbolKind::Constant => 3,
            _ => 1,
        }
    }

    fn key(
        kind: SymbolKind,
        name: &str,
    ) -> String
    {
        match kind
        {
            SymbolKind::Constant => constant_key(name),
            _ => fold(name),
        }
    }

    fn check(
        &mut self,
        kind: SymbolKind,
        original: &str,
        target: &str,
    ) -> Result<(), PrefixError>
    {
        let slot = (Self::group(kind), Self::key(kind, target));
        match self
            .targets
            .get(&slot)
        {
            Some(first) if Self::key(kind, first) != Self::key(kind, original) =>
            {
                Err(PrefixError::RenameCollision {
                    first: first.clone(),
                    second: original.to_string(),
                    target: target.to_string(),
                })
            }
            Some(_) => Ok(()),
            None =>
            {
                self.targets
                    .insert(slot, original.to_string());
                Ok(())
            }
        }
    }

    /// True the first time an original is reported.
    fn first_rule(
        &mut self,
        kind: SymbolKind,
        original: &str,
    ) -> bool
    {
        self.seen
            .insert((Self::group(kind), Self::key(kind, original)))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn cfg() -> TableConfig
    {
        TableConfig {
            namespace_prefix: "Acme\\Vendor".into(),
            classmap_prefix: "Acme_Vendor_".into(),
            ..TableConfig::default()
        }
    }

    fn sym(
        name: &str,
        kind: SymbolKind,
    ) -> Symbol
    {
        Symbol::new(name, kind, "psr/log", "src/File.php")
    }

    #[test]
    fn namespaces_match_whole_segments_only() -> Result<(), PrefixError>
    {
        let rules = RenameRules::build(
            &[sym("Psr\\Log", SymbolKind::Namespace), sym("Psr\\Log\\LoggerInterface", SymbolKind::Interface)],
            &cfg(),
        )?;
        assert_eq!(rules.map_namespace("Psr\\Log").as_deref(), Some("Acme\\Vendor\\Psr\\Log"));
        assert_eq!(
            rules
                .map_class("\\psr\\log\\LoggerInterface")
                .as_deref(),
            Some("Acme\\Vendor\\Psr\\Log\\LoggerInterface")
        );
        assert_eq!(rules.map_class("Psr\\LogExtra\\Thing"), None);
        assert_eq!(rules.map_namespace("Psr"), None);
        assert!(rules.is_known_class("Psr\\Log\\LoggerInterface"));
        assert!(!rules.is_known_class("psr\\log\\LoggerInterface"));
        Ok(())
    }

    #[test]
    fn longest_declared_namespace_wins_with_overrides() -> Result<(), PrefixError>
    {
        let mut config = cfg();
        config
            .overrides
            .insert("Psr\\Log\\Test".into(), "Acme\\LogTest".into());
        let rules = RenameRules::build(
            &[sym("Psr\\Log", SymbolKind::Namespace), sym("Psr\\Log\\Test", SymbolKind::Namespace)],
            &config,
        )?;
        assert_eq!(rules.map_class("Psr\\Log\\Test\\Dummy").as_deref(), Some("Acme\\LogTest\\Dummy"));
        assert_eq!(rules.map_class("Psr\\Log\\Other").as_deref(), Some("Acme\\Vendor\\Psr\\Log\\Other"));
        Ok(())
    }

    #[test]
    fn global_symbols_follow_their_prefixes() -> Result<(), PrefixError>
    {
        let mut config = cfg();
        config.functions_prefix = Some("acme_".into());
        let rules = RenameRules::build(
            &[
                sym("Pimple", SymbolKind::Class),
                sym("Acme_Vendor_Done", SymbolKind::Class),
                sym("helper", SymbolKind::Function),
                sym("HELPER_CONST", SymbolKind::Constant),
            ],
            &config,
        )?;
        assert_eq!(rules.map_class("pimple").as_deref(), Some("Acme_Vendor_Pimple"));
        assert_eq!(rules.map_class("Acme_Vendor_Done").as_deref(), Some("Acme_Vendor_Done"));
        assert_eq!(rules.map_function("Helper").as_deref(), Some("acme_helper"));
        assert_eq!(rules.map_constant("HELPER_CONST").as_deref(), Some("HELPER_CONST"));
        assert_eq!(rules.map_constant("helper_const"), None);
        assert!(rules.is_target_function("ACME_HELPER"));
        assert!(rules.is_declared_constant("HELPER_CONST"));

        let reasons: Vec<_> = rules
            .rules()
            .iter()
            .map(|r| (r.original.as_str(), r.eligibility))
            .collect();
        assert!(reasons.contains(&("Acme_Vendor_Done", Eligibility::PassThrough(PassThrough::AlreadyPrefixed))));
        assert!(reasons.contains(&("HELPER_CONST", Eligibility::PassThrough(PassThrough::NoPrefixConfigured))));
        Ok(())
    }

    #[test]
    fn already_prefixed_namespaces_are_identity()
    {
        let rules = RenameRules::build(
            &[sym("Acme\\Vendor\\Psr\\Log", SymbolKind::Namespace)],
            &cfg(),
        )
        .unwrap();
        assert_eq!(
            rules
                .map_namespace("Acme\\Vendor\\Psr\\Log")
                .as_deref(),
            Some("Acme\\Vendor\\Psr\\Log")
        );
    }

    #[test]
    fn exclusions_pass_through()
    {
        let mut config = cfg();
        config.exclude_namespaces = vec!["Psr\\Container".into()];
        config.exclude_packages = vec!["pimple/pimple".into()];
        config.exclude_file_patterns = vec!["src/Legacy/**".into()];
        let symbols = vec![
            sym("Psr\\Container", SymbolKind::Namespace),
            Symbol::new("Pimple", SymbolKind::Namespace, "pimple/pimple", "src/Container.php"),
            Symbol::new("Pimple\\Container", SymbolKind::Class, "pimple/pimple", "src/Container.php"),
            sym("Psr\\Log", SymbolKind::Namespace),
            Symbol::new("Psr\\Log\\Old", SymbolKind::Class, "psr/log", "src/Legacy/Old.php"),
        ];
        let rules = RenameRules::build(&symbols, &config).unwrap();
        assert_eq!(rules.map_namespace("Psr\\Container\\X").as_deref(), Some("Psr\\Container\\X"));
        assert_eq!(rules.map_class("Pimple\\Container").as_deref(), Some("Pimple\\Container"));
        assert_eq!(rules.map_class("Psr\\Log\\Old").as_deref(), Some("Psr\\Log\\Old"));
        assert_eq!(rules.map_class("Psr\\Log\\New").as_deref(), Some("Acme\\Vendor\\Psr\\Log\\New"));
    }

    #[test]
    fn collisions_are_reported()
    {
        let err = RenameRules::build(
            &[sym("Foo", SymbolKind::Class), sym("Acme_Vendor_Foo", SymbolKind::Class)],
            &cfg(),
        )
        .unwrap_err();
        match err
        {
            PrefixError::RenameCollision { target, .. } => assert_eq!(target, "Acme_Vendor_Foo"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_declarations_are_not_collisions()
    {
        let rules = RenameRules::build(
            &[sym("Foo", SymbolKind::Class), Symbol::new("Foo", SymbolKind::Class, "other/pkg", "Foo.php")],
            &cfg(),
        )
        .unwrap();
        assert_eq!(rules.rules().len(), 1);
    }

    #[test]
    fn malformed_names_abort()
    {
        let err = RenameRules::build(&[sym("Bad\\9Name", SymbolKind::Class)], &cfg()).unwrap_err();
        assert!(matches!(err, PrefixError::MalformedSymbolName { .. }));
        assert!(validate_name("Ünïcode\\Name").is_ok());
    }
}
