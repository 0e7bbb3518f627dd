//! Shared test utilities for integration tests
//!
//! Builds a small Composer project with three vendored packages:
//! - `psr/log`: namespaced interface, abstract class and class
//! - `psr/container`: pulled in transitively through `pimple/pimple`
//! - `pimple/pimple`: a global class, an `autoload.files` entry and an
//!   executable script

#![allow(dead_code)]

use assert_fs::prelude::*;
use phprefix::{
    AppContext, PrefixSettings,
    infra::config::{self, Overrides},
};

pub const ROOT_MANIFEST: &str = r#"{
    "name": "acme/plugin",
    "require": {
        "php": ">=7.4",
        "psr/log": "^1.0",
        "pimple/pimple": "^3.0"
    },
    "extra": {
        "phprefix": {
            "namespace_prefix": "Acme\\Plugin\\Vendor",
            "classmap_prefix": "Acme_Plugin_Vendor_"
        }
    }
}
"#;

const INSTALLED: &str = r#"{
    "packages": [
        {
            "name": "psr/log",
            "require": {"php": ">=5.3.0"},
            "install-path": "../psr/log",
            "autoload": {"psr-4": {"Psr\\Log\\": "Psr/Log/"}}
        },
        {
            "name": "pimple/pimple",
            "require": {"php": ">=7.2.5", "psr/container": "^1.1"},
            "install-path": "../pimple/pimple",
            "autoload": {"psr-0": {"Pimple": "src/"}, "files": ["src/functions.php"]}
        },
        {
            "name": "psr/container",
            "require": {"php": ">=7.4.0"},
            "install-path": "../psr/container",
            "autoload": {"psr-4": {"Psr\\Container\\": "src/"}}
        }
    ],
    "dev": false
}
"#;

pub const LOGGER_INTERFACE: &str = r#"<?php

namespace Psr\Log;

interface LoggerInterface
{
    public function log($level, $message, array $context = array());
}
"#;

pub const ABSTRACT_LOGGER: &str = r#"<?php

namespace Psr\Log;

abstract class AbstractLogger implements LoggerInterface
{
}
"#;

pub const NULL_LOGGER: &str = r#"<?php

namespace Psr\Log;

/**
 * @see LoggerInterface
 */
class NullLogger extends AbstractLogger
{
    public function log($level, $message, array $context = array())
    {
    }
}
"#;

pub const CONTAINER_INTERFACE: &str = r#"<?php

namespace Psr\Container;

interface ContainerInterface
{
    public function get(string $id);
}
"#;

pub const PIMPLE: &str = r#"<?php

use Psr\Container\ContainerInterface;

class Pimple implements ContainerInterface
{
    public function get(string $id)
    {
        return new \Psr\Log\NullLogger();
    }
}
"#;

pub const FUNCTIONS: &str = r#"<?php

function pimple_container()
{
    return new Pimple();
}
"#;

/// Create the fixture project; returns its root.
pub fn plugin_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    let files = [
        ("composer.json", ROOT_MANIFEST),
        ("vendor/composer/installed.json", INSTALLED),
        ("vendor/psr/log/composer.json", r#"{"name": "psr/log"}"#),
        ("vendor/psr/log/LICENSE", "Copyright (c) 2012 PHP Framework Interoperability Group\n"),
        ("vendor/psr/log/Psr/Log/LoggerInterface.php", LOGGER_INTERFACE),
        ("vendor/psr/log/Psr/Log/AbstractLogger.php", ABSTRACT_LOGGER),
        ("vendor/psr/log/Psr/Log/NullLogger.php", NULL_LOGGER),
        ("vendor/psr/container/composer.json", r#"{"name": "psr/container"}"#),
        ("vendor/psr/container/src/ContainerInterface.php", CONTAINER_INTERFACE),
        (
            "vendor/pimple/pimple/composer.json",
            r#"{"name": "pimple/pimple", "autoload": {"files": ["src/functions.php"]}}"#,
        ),
        ("vendor/pimple/pimple/src/Pimple.php", PIMPLE),
        ("vendor/pimple/pimple/src/functions.php", FUNCTIONS),
        ("vendor/pimple/pimple/bin/pimple", "#!/bin/sh\necho pimple\n"),
    ];
    for (path, body) in files
    {
        tmp.child(path)
            .write_str(body)
            .expect("write fixture file");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let script = tmp
            .child("vendor/pimple/pimple/bin/pimple")
            .to_path_buf();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    }

    tmp
}

/// Give `psr/log` an `autoload.files` entry of its own. It is selected
/// before `pimple/pimple` but sorts after it.
pub fn add_log_functions(root: &std::path::Path)
{
    let installed = INSTALLED.replace(
        r#""autoload": {"psr-4": {"Psr\\Log\\": "Psr/Log/"}}"#,
        r#""autoload": {"psr-4": {"Psr\\Log\\": "Psr/Log/"}, "files": ["Psr/Log/functions.php"]}"#,
    );
    assert_ne!(installed, INSTALLED, "psr/log autoload entry not found");
    std::fs::write(root.join("vendor/composer/installed.json"), installed).expect("write installed.json");
    std::fs::write(
        root.join("vendor/psr/log/Psr/Log/functions.php"),
        "<?php\n\nnamespace Psr\\Log;\n\nfunction null_logger()\n{\n    return new NullLogger();\n}\n",
    )
    .expect("write functions.php");
}

/// Settings for `root` with every layer applied and no CLI overrides.
pub fn settings(root: &std::path::Path) -> PrefixSettings
{
    config::load(&Overrides { working_dir: root.to_path_buf(), ..Overrides::default() }).expect("settings")
}

/// Context for library-driven runs: no progress bars, no summaries.
pub fn quiet() -> AppContext
{
    AppContext { quiet: true, no_color: true, ..AppContext::default() }
}

/// Read a file below `root` as UTF-8.
pub fn read(
    root: &std::path::Path,
    rel: &str,
) -> String
{
    std::fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("read {rel}: {e}"))
}
