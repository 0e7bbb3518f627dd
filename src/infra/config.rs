//! Filepath: src/infra/config.rs
//! Layered settings for a prefixing run.
//!
//! Precedence, lowest first:
//!   1) built-in defaults (serde `default`)
//!   2) `composer.json` -> `extra.phprefix`
//!   3) `phprefix.toml` next to composer.json
//!   4) `PHPREFIX_*` environment variables (`__` separates nested keys)
//!   5) command-line flags
//!
//! The merged `Settings` are then resolved against the working directory into
//! an immutable `PrefixSettings` that every later phase borrows.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cli::{AppContext, AutoloadArgs, InitArgs, PrefixArgs, ProjectArgs, SymbolsArgs},
    core::error::PrefixError,
};

pub const CONFIG_FILE: &str = "phprefix.toml";
pub const MANIFEST_FILE: &str = "composer.json";
pub const ENV_PREFIX: &str = "PHPREFIX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy
{
    #[default]
    FailFast,
    CollectAll,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeFromPrefix
{
    pub namespaces: Vec<String>,
    pub packages: Vec<String>,
    pub file_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeFromCopy
{
    pub packages: Vec<String>,
}

/// Merged, not yet validated settings as written by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings
{
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classmap_prefix: Option<String>,

    /// Prefix for global functions; global functions pass through when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions_prefix: Option<String>,

    /// Prefix for global constants; global constants pass through when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constants_prefix: Option<String>,

    pub target_directory: String,

    /// Defaults to composer's `config.vendor-dir`, then `vendor`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_directory: Option<String>,

    pub classmap_output: bool,

    /// Root packages to copy; defaults to the manifest's `require` list
    pub packages: Vec<String>,

    pub rewrite_strings: bool,
    pub rewrite_docblocks: bool,
    pub validate_syntax: bool,
    pub parallel: bool,
    pub failure_policy: FailurePolicy,

    // Tables last so the TOML serializer emits plain keys first
    pub exclude_from_prefix: ExcludeFromPrefix,
    pub exclude_from_copy: ExcludeFromCopy,

    /// Original namespace or global class -> explicit target
    pub overrides: BTreeMap<String, String>,
}

impl Default for Settings
{
    fn default() -> Self
    {
        Self {
            namespace_prefix: None,
            classmap_prefix: None,
            functions_prefix: None,
            constants_prefix: None,
            target_directory: "vendor-prefixed".to_string(),
            vendor_directory: None,
            classmap_output: true,
            packages: Vec::new(),
            exclude_from_prefix: ExcludeFromPrefix::default(),
            exclude_from_copy: ExcludeFromCopy::default(),
            overrides: BTreeMap::new(),
            rewrite_strings: true,
            rewrite_docblocks: true,
            validate_syntax: true,
            parallel: true,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposerConfig
{
    #[serde(rename = "vendor-dir")]
    pub vendor_dir: Option<String>,
}

/// The parts of the root `composer.json` a run reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComposerManifest
{
    pub name: Option<String>,
    pub require: IndexMap<String, serde_json::Value>,
    pub config: ComposerConfig,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ComposerManifest
{
    /// Read `composer.json` from `dir`; a missing file is an empty manifest.
    pub fn load(dir: &Path) -> Result<Self, PrefixError>
    {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file()
        {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| PrefixError::io(&path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| PrefixError::config(format!("{}: {e}", path.display())))
    }
}

/// Command-line values layered on top of every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides
{
    pub working_dir: PathBuf,
    pub target_dir: Option<PathBuf>,
    pub namespace_prefix: Option<String>,
    pub classmap_prefix: Option<String>,
    pub no_classmap: bool,
    pub no_strings: bool,
    pub no_docblocks: bool,
    pub no_validate: bool,
    pub collect_all: bool,
    pub sequential: bool,
}

impl From<&ProjectArgs> for Overrides
{
    fn from(p: &ProjectArgs) -> Self
    {
        Self {
            working_dir: p.working_dir.clone(),
            target_dir: p.target_dir.clone(),
            namespace_prefix: p.namespace_prefix.clone(),
            classmap_prefix: p.classmap_prefix.clone(),
            ..Self::default()
        }
    }
}

impl From<&PrefixArgs> for Overrides
{
    fn from(a: &PrefixArgs) -> Self
    {
        Self {
            no_classmap: a.no_classmap,
            no_strings: a.no_strings,
            no_docblocks: a.no_docblocks,
            no_validate: a.no_validate,
            collect_all: a.collect_all,
            sequential: a.sequential,
            ..Self::from(&a.project)
        }
    }
}

impl From<&SymbolsArgs> for Overrides
{
    fn from(a: &SymbolsArgs) -> Self
    {
        Self::from(&a.project)
    }
}

impl From<&AutoloadArgs> for Overrides
{
    fn from(a: &AutoloadArgs) -> Self
    {
        Self { no_classmap: a.no_classmap, ..Self::from(&a.project) }
    }
}

/// Fully resolved, validated settings for one run.
#[derive(Debug, Clone)]
pub struct PrefixSettings
{
    pub working_dir: PathBuf,
    pub vendor_dir: PathBuf,
    pub target_dir: PathBuf,
    /// Without leading or trailing separator, e.g. `Acme\Vendor`
    pub namespace_prefix: String,
    pub classmap_prefix: String,
    pub functions_prefix: Option<String>,
    pub constants_prefix: Option<String>,
    pub packages: Vec<String>,
    /// Root manifest `require` keys, used when `packages` is empty
    pub root_requires: Vec<String>,
    pub exclude_from_prefix: ExcludeFromPrefix,
    pub exclude_from_copy: Vec<String>,
    pub overrides: BTreeMap<String, String>,
    pub classmap_output: bool,
    pub rewrite_strings: bool,
    pub rewrite_docblocks: bool,
    pub validate_syntax: bool,
    pub parallel: bool,
    pub failure_policy: FailurePolicy,
}

impl PrefixSettings
{
    /// Target and vendor directories resolve to the same place.
    pub fn target_is_vendor(&self) -> bool
    {
        let canon = |p: &Path| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
        canon(&self.target_dir) == canon(&self.vendor_dir)
    }
}

/// Merge every configuration layer for the project in `overrides.working_dir`.
pub fn load_settings(overrides: &Overrides) -> Result<(Settings, ComposerManifest), PrefixError>
{
    let dir = &overrides.working_dir;
    let manifest = ComposerManifest::load(dir)?;
    let layered = layer(dir, &manifest, overrides)
        .map_err(|e| PrefixError::config(format!("{e:#}")))?;
    Ok((layered, manifest))
}

fn layer(
    dir: &Path,
    manifest: &ComposerManifest,
    o: &Overrides,
) -> Result<Settings>
{
    let mut builder = config::Config::builder();

    if let Some(extra) = manifest
        .extra
        .get("phprefix")
    {
        let json = serde_json::to_string(extra).context("serialize extra.phprefix")?;
        builder = builder.add_source(config::File::from_str(&json, config::FileFormat::Json));
    }

    let file = dir.join(CONFIG_FILE);
    if file.is_file()
    {
        debug!(path = %file.display(), "loading config file");
        builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    builder = builder
        .set_override_option("namespace_prefix", o.namespace_prefix.clone())?
        .set_override_option("classmap_prefix", o.classmap_prefix.clone())?
        .set_override_option(
            "target_directory",
            o.target_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option("classmap_output", o.no_classmap.then_some(false))?
        .set_override_option("rewrite_strings", o.no_strings.then_some(false))?
        .set_override_option("rewrite_docblocks", o.no_docblocks.then_some(false))?
        .set_override_option("validate_syntax", o.no_validate.then_some(false))?
        .set_override_option("parallel", o.sequential.then_some(false))?
        .set_override_option("failure_policy", o.collect_all.then_some("collect_all"))?;

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Settings = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;
    Ok(parsed)
}

/// Resolve paths and defaults, and validate every prefix.
pub fn resolve(
    settings: Settings,
    manifest: &ComposerManifest,
    working_dir: &Path,
) -> Result<PrefixSettings, PrefixError>
{
    let working_dir = dunce::canonicalize(working_dir).map_err(|e| {
        PrefixError::config(format!("working directory {}: {e}", working_dir.display()))
    })?;

    let vendor_rel = settings
        .vendor_directory
        .clone()
        .or_else(|| {
            manifest
                .config
                .vendor_dir
                .clone()
        })
        .unwrap_or_else(|| "vendor".to_string());
    let vendor_dir = working_dir.join(vendor_rel.trim_end_matches(['/', '\\']));

    let target_rel = settings
        .target_directory
        .trim_end_matches(['/', '\\']);
    if target_rel.is_empty() || target_rel == "."
    {
        return Err(PrefixError::config("target_directory must name a directory"));
    }
    let target_dir = working_dir.join(target_rel);
    if target_dir == working_dir
    {
        return Err(PrefixError::config("target_directory must not be the project root"));
    }

    let namespace_prefix = match settings.namespace_prefix
    {
        Some(p) => p
            .trim_matches('\\')
            .to_string(),
        None => manifest
            .name
            .as_deref()
            .map(prefix_from_package_name)
            .ok_or_else(|| {
                PrefixError::config("no namespace_prefix configured and composer.json has no name")
            })?,
    };
    if !is_valid_qualified_name(&namespace_prefix)
    {
        return Err(PrefixError::config(format!("invalid namespace_prefix `{namespace_prefix}`")));
    }

    let classmap_prefix = settings
        .classmap_prefix
        .unwrap_or_else(|| format!("{}_", namespace_prefix.replace('\\', "_")));
    if !is_valid_identifier(&classmap_prefix)
    {
        return Err(PrefixError::config(format!("invalid classmap_prefix `{classmap_prefix}`")));
    }

    for (key, prefix) in [
        ("functions_prefix", &settings.functions_prefix),
        ("constants_prefix", &settings.constants_prefix),
    ]
    {
        if let Some(p) = prefix.as_deref().filter(|p| !is_valid_identifier(p))
        {
            return Err(PrefixError::config(format!("invalid {key} `{p}`")));
        }
    }

    let mut overrides = BTreeMap::new();
    for (from, to) in settings.overrides
    {
        let from = from
            .trim_matches('\\')
            .to_string();
        let to = to
            .trim_matches('\\')
            .to_string();
        if !is_valid_qualified_name(&from) || !is_valid_qualified_name(&to)
        {
            return Err(PrefixError::config(format!("invalid override `{from}` -> `{to}`")));
        }
        overrides.insert(from, to);
    }

    for pattern in &settings
        .exclude_from_prefix
        .file_patterns
    {
        globset::Glob::new(pattern)
            .map_err(|e| PrefixError::config(format!("invalid file pattern `{pattern}`: {e}")))?;
    }

    Ok(PrefixSettings {
        vendor_dir,
        target_dir,
        namespace_prefix,
        classmap_prefix,
        functions_prefix: settings.functions_prefix,
        constants_prefix: settings.constants_prefix,
        packages: settings.packages,
        root_requires: manifest
            .require
            .keys()
            .cloned()
            .collect(),
        exclude_from_prefix: settings.exclude_from_prefix,
        exclude_from_copy: settings
            .exclude_from_copy
            .packages,
        overrides,
        classmap_output: settings.classmap_output,
        rewrite_strings: settings.rewrite_strings,
        rewrite_docblocks: settings.rewrite_docblocks,
        validate_syntax: settings.validate_syntax,
        parallel: settings.parallel,
        failure_policy: settings.failure_policy,
        working_dir,
    })
}

/// Load and resolve in one step.
pub fn load(overrides: &Overrides) -> Result<PrefixSettings, PrefixError>
{
    let (settings, manifest) = load_settings(overrides)?;
    resolve(settings, &manifest, &overrides.working_dir)
}

/// `acme/my-plugin` -> `Acme\MyPlugin`
pub fn prefix_from_package_name(name: &str) -> String
{
    name.split('/')
        .map(|part| {
            part.split(['-', '_', '.'])
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next()
                    {
                        Some(first) => first
                            .to_uppercase()
                            .chain(chars)
                            .collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<String>()
        })
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

pub fn is_valid_identifier(s: &str) -> bool
{
    let mut bytes = s.bytes();
    bytes
        .next()
        .is_some_and(crate::parsers::php::model::is_ident_start)
        && bytes.all(crate::parsers::php::model::is_ident_char)
}

pub fn is_valid_qualified_name(s: &str) -> bool
{
    !s.is_empty() && s.split('\\').all(is_valid_identifier)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILE);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Settings::default()).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("DRY RUN: would write {}\n{toml_string}", config_path.display());
        return Ok(());
    }

    crate::infra::io::write_atomic(&config_path, toml_string.as_bytes(), None)
        .context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
