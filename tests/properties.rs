//! Property tests for the rename table and the rewrite engine.

use std::{collections::BTreeSet, path::Path};

use phprefix::core::{
    rewrite::{FileContext, RewriteOptions, rewrite_source},
    symbols::{Symbol, SymbolKind},
    table::{RenameRules, TableConfig},
};
use proptest::prelude::*;

fn config() -> TableConfig
{
    TableConfig {
        namespace_prefix: "Zz\\Pre".into(),
        classmap_prefix: "Zz_Pre_".into(),
        ..TableConfig::default()
    }
}

/// Segments never start with `Z`, so no generated name is already prefixed,
/// and end in a digit, so none is a PHP keyword.
fn segment() -> impl Strategy<Value = String>
{
    "[A-Y][a-z]{1,5}[0-9]"
}

fn namespace() -> impl Strategy<Value = String>
{
    prop::collection::vec(segment(), 1..4).prop_map(|segs| segs.join("\\"))
}

fn options() -> RewriteOptions
{
    RewriteOptions { validate_syntax: false, ..RewriteOptions::default() }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn distinct_names_get_distinct_targets(
        namespaces in prop::collection::btree_set(namespace(), 1..12),
        classes in prop::collection::btree_set(segment(), 0..6),
    )
    {
        let mut symbols: Vec<Symbol> = namespaces
            .iter()
            .map(|ns| Symbol::new(ns, SymbolKind::Namespace, "v/pkg", "a.php"))
            .collect();
        symbols.extend(classes.iter().map(|c| Symbol::new(c, SymbolKind::Class, "v/pkg", "b.php")));

        let rules = RenameRules::build(&symbols, &config()).expect("no collisions");
        let targets: BTreeSet<String> = rules
            .rules()
            .iter()
            .map(|r| r.target.to_ascii_lowercase())
            .collect();
        prop_assert_eq!(targets.len(), rules.rules().len());
        prop_assert_eq!(rules.rules().len(), namespaces.len() + classes.len());

        for ns in &namespaces
        {
            let target = rules.map_namespace(ns).expect("declared namespace");
            prop_assert_eq!(target, format!("Zz\\Pre\\{ns}"));
        }
    }

    #[test]
    fn rewriting_is_idempotent(
        own in namespace(),
        dep in namespace(),
        class in segment(),
        parent in segment(),
        global in segment(),
    )
    {
        prop_assume!(own != dep && class != parent && global != class && global != parent);

        let symbols = [
            Symbol::new(&own, SymbolKind::Namespace, "v/own", "src/A.php"),
            Symbol::new(format!("{own}\\{class}"), SymbolKind::Class, "v/own", "src/A.php"),
            Symbol::new(&dep, SymbolKind::Namespace, "v/dep", "src/B.php"),
            Symbol::new(format!("{dep}\\{parent}"), SymbolKind::Class, "v/dep", "src/B.php"),
            Symbol::new(&global, SymbolKind::Class, "v/dep", "src/C.php"),
        ];
        let rules = RenameRules::build(&symbols, &config()).expect("table");

        let src = format!(
            "<?php\nnamespace {own};\n\nuse {dep}\\{parent};\n\nclass {class} extends {parent}\n{{\n    public function make()\n    {{\n        return new \\{global}('{own}\\{class}');\n    }}\n}}\n"
        );
        let once = rewrite_source(Path::new("a.php"), src.as_bytes(), &rules, &options(), FileContext::default())
            .expect("first pass");
        prop_assert!(once.changed());

        let twice = rewrite_source(Path::new("a.php"), &once.content, &rules, &options(), FileContext::default())
            .expect("second pass");
        prop_assert_eq!(twice.edits, 0);
        prop_assert_eq!(twice.content, once.content);
    }
}
