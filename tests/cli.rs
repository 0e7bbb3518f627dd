//! Binary smoke tests: argument parsing, exit codes and the subcommands that
//! only print.

mod util;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use clap::Parser;
use phprefix::cli::{Cli, Commands};
use predicates::prelude::*;
use std::process::Command;
use util::plugin_fixture;

fn phprefix() -> Command {
    Command::cargo_bin("phprefix").expect("phprefix binary")
}

#[test]
fn autoload_flags_parse() {
    let cli = Cli::parse_from(["phprefix", "--quiet", "autoload", "-d", "plugin", "--no-classmap"]);
    assert!(cli.quiet);
    match cli.command {
        Commands::Autoload(args) => {
            assert!(args.no_classmap);
            assert!(args.project.working_dir.ends_with("plugin"));
        }
        _ => panic!("expected Autoload command"),
    }
}

#[test]
fn help_lists_subcommands() {
    phprefix()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prefix").and(predicate::str::contains("autoload")));
}

#[test]
fn prefix_then_autoload_regenerates_outputs() {
    let tmp = plugin_fixture();

    phprefix()
        .args(["--no-color", "prefix", "-d"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Prefixed 3 packages"));

    tmp.child("vendor-prefixed/pimple/pimple/src/Pimple.php")
        .assert(predicate::str::contains("class Acme_Plugin_Vendor_Pimple"));

    // Drop the generated files and rebuild them from the target alone
    std::fs::remove_file(tmp.path().join("vendor-prefixed/autoload-classmap.php")).expect("remove classmap");
    std::fs::remove_file(tmp.path().join("vendor-prefixed/autoload-files.php")).expect("remove files");

    phprefix()
        .args(["--quiet", "autoload", "-d"])
        .arg(tmp.path())
        .assert()
        .success();

    tmp.child("vendor-prefixed/autoload-classmap.php")
        .assert(predicate::str::contains("'Acme_Plugin_Vendor_Pimple' => $phprefix_src . '/pimple/pimple/src/Pimple.php',"));
    tmp.child("vendor-prefixed/autoload-files.php")
        .assert(predicate::str::contains("require_once __DIR__ . '/pimple/pimple/src/functions.php';"));
}

#[test]
fn dry_run_prints_diffs_only() {
    let tmp = plugin_fixture();

    phprefix()
        .args(["--no-color", "--dry-run", "prefix", "-d"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("+++ b/psr/log/Psr/Log/NullLogger.php"))
        .stdout(predicate::str::contains("+namespace Acme\\Plugin\\Vendor\\Psr\\Log;"));

    tmp.child("vendor-prefixed")
        .assert(predicate::path::missing());
}

#[test]
fn symbols_lists_rules() {
    let tmp = plugin_fixture();

    phprefix()
        .args(["--no-color", "symbols", "-d"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Psr\\Log -> Acme\\Plugin\\Vendor\\Psr\\Log"))
        .stdout(predicate::str::contains("Pimple -> Acme_Plugin_Vendor_Pimple"))
        .stdout(predicate::str::contains("pimple_container (unchanged: no prefix configured)"));
}

#[test]
fn configuration_errors_exit_with_code_two() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("composer.json")
        .write_str(r#"{"require": {"psr/log": "^1"}}"#)
        .expect("write manifest");

    phprefix()
        .args(["prefix", "-d"])
        .arg(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("namespace_prefix"));
}

#[test]
fn parse_errors_exit_with_code_four() {
    let tmp = plugin_fixture();
    tmp.child("vendor/psr/log/Psr/Log/Broken.php")
        .write_str("<?php\nclass Broken {\n")
        .expect("write broken file");

    phprefix()
        .args(["--quiet", "prefix", "-d"])
        .arg(tmp.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Broken.php:2:"));
}

#[test]
fn init_refuses_to_overwrite() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    phprefix()
        .arg("init")
        .arg(tmp.path())
        .assert()
        .success();
    tmp.child("phprefix.toml")
        .assert(predicate::str::contains("target_directory = \"vendor-prefixed\""));

    phprefix()
        .arg("init")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn completions_go_to_stdout() {
    phprefix()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("phprefix"));
}
