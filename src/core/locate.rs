//! Filepath: src/core/locate.rs
//! Package discovery: which vendored packages to copy and which files they
//! contribute.
//!
//! Installed metadata comes from `<vendor>/composer/installed.json` (both the
//! Composer 1 array and the Composer 2 `{"packages": [...]}` layouts). When
//! that file is absent every `<vendor>/*/*/composer.json` is read instead.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    core::{autoload::FilesRegistry, error::PrefixError},
    infra::{config::PrefixSettings, walk::FileWalker},
};

/// A vendored package selected for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package
{
    pub name: String,
    pub install_path: PathBuf,
    /// `autoload.files` in manifest order
    pub autoload_files: Vec<String>,
    pub requires: Vec<String>,
}

/// One file of a selected package.
#[derive(Debug, Clone)]
pub struct SourceFile
{
    pub package: String,
    /// Path relative to the package directory, `/`-separated
    pub rel: String,
    pub abs: PathBuf,
    pub is_php: bool,
}

impl SourceFile
{
    /// Path relative to the target directory.
    pub fn target_rel(&self) -> String
    {
        format!("{}/{}", self.package, self.rel)
    }
}

#[derive(Debug, Default)]
pub struct Discovery
{
    pub packages: Vec<Package>,
    pub files: Vec<SourceFile>,
    pub registry: FilesRegistry,
}

#[derive(Debug, Deserialize)]
struct InstalledPackage
{
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    require: IndexMap<String, serde_json::Value>,

    #[serde(default, rename = "install-path")]
    install_path: Option<String>,

    #[serde(default)]
    autoload: AutoloadSection,
}

#[derive(Debug, Default, Deserialize)]
struct AutoloadSection
{
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Installed
{
    Composer2 { packages: Vec<InstalledPackage> },
    Composer1(Vec<InstalledPackage>),
}

/// Requirements Composer satisfies from the platform, never from vendor.
pub fn is_platform_requirement(name: &str) -> bool
{
    let name = name.to_ascii_lowercase();
    name == "php"
        || name.starts_with("php-")
        || name.starts_with("ext-")
        || name.starts_with("lib-")
        || name == "composer-plugin-api"
        || name == "composer-runtime-api"
        || name == "composer"
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PrefixError>
{
    let text = fs::read_to_string(path).map_err(|e| PrefixError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| PrefixError::config(format!("{}: {e}", path.display())))
}

/// Every package installed under `vendor_dir`, keyed by lowercase name.
pub fn installed_packages(vendor_dir: &Path) -> Result<HashMap<String, Package>, PrefixError>
{
    let installed_json = vendor_dir.join("composer/installed.json");
    let mut out = HashMap::new();

    if installed_json.is_file()
    {
        debug!(path = %installed_json.display(), "reading installed.json");
        let entries = match read_json::<Installed>(&installed_json)?
        {
            Installed::Composer2 { packages } => packages,
            Installed::Composer1(packages) => packages,
        };
        for entry in entries
        {
            let Some(name) = entry
                .name
                .clone()
            else
            {
                continue;
            };
            let install_path = match &entry.install_path
            {
                Some(p) => vendor_dir
                    .join("composer")
                    .join(p),
                None => vendor_dir.join(&name),
            };
            out.insert(name.to_ascii_lowercase(), package_from(name, install_path, entry));
        }
        return Ok(out);
    }

    for manifest in package_manifests(vendor_dir)?
    {
        let dir = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let entry: InstalledPackage = read_json(&manifest)?;
        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| dir_package_name(vendor_dir, &dir));
        out.insert(name.to_ascii_lowercase(), package_from(name, dir, entry));
    }
    Ok(out)
}

fn package_from(
    name: String,
    install_path: PathBuf,
    entry: InstalledPackage,
) -> Package
{
    let install_path = dunce::canonicalize(&install_path).unwrap_or(install_path);
    Package {
        name,
        install_path,
        autoload_files: entry
            .autoload
            .files,
        requires: entry
            .require
            .into_keys()
            .collect(),
    }
}

/// `<root>/*/*/composer.json`, sorted.
pub fn package_manifests(root: &Path) -> Result<Vec<PathBuf>, PrefixError>
{
    let mut out = Vec::new();
    if !root.is_dir()
    {
        return Ok(out);
    }
    for vendor in subdirs(root)?
    {
        if vendor
            .file_name()
            .is_some_and(|n| n == "composer" || n == "bin")
        {
            continue;
        }
        for package in subdirs(&vendor)?
        {
            let manifest = package.join("composer.json");
            if manifest.is_file()
            {
                out.push(manifest);
            }
        }
    }
    out.sort();
    Ok(out)
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, PrefixError>
{
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PrefixError::io(dir, e))?
    {
        let entry = entry.map_err(|e| PrefixError::io(dir, e))?;
        if entry
            .file_type()
            .is_ok_and(|t| t.is_dir())
        {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_package_name(
    root: &Path,
    dir: &Path,
) -> String
{
    dir.strip_prefix(root)
        .map(crate::infra::walk::slash_path)
        .unwrap_or_default()
}

/// Packages reachable from `roots` through `require`, in breadth-first order.
///
/// Packages in `exclude_from_copy` are not selected, but their own
/// requirements are still followed.
pub fn select_packages(
    installed: &HashMap<String, Package>,
    roots: &[String],
    exclude_from_copy: &[String],
) -> Vec<Package>
{
    let excluded: HashSet<String> = exclude_from_copy
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .collect();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<String> = roots
        .iter()
        .cloned()
        .collect();
    let mut selected = Vec::new();

    while let Some(name) = queue.pop_front()
    {
        let key = name.to_ascii_lowercase();
        if is_platform_requirement(&key) || !seen.insert(key.clone())
        {
            continue;
        }
        let Some(package) = installed.get(&key)
        else
        {
            warn!(package = %name, "required package is not installed; skipping");
            continue;
        };
        queue.extend(
            package
                .requires
                .iter()
                .cloned(),
        );
        if excluded.contains(&key)
        {
            debug!(package = %name, "excluded from copy");
            continue;
        }
        selected.push(package.clone());
    }
    selected
}

/// Installed packages selected by `settings`, in breadth-first `require`
/// order from the root packages.
pub fn selected_packages(settings: &PrefixSettings) -> Result<Vec<Package>, PrefixError>
{
    if !settings
        .vendor_dir
        .is_dir()
    {
        return Err(PrefixError::config(format!(
            "vendor directory {} does not exist",
            settings
                .vendor_dir
                .display()
        )));
    }

    let installed = installed_packages(&settings.vendor_dir)?;
    let roots = if settings
        .packages
        .is_empty()
    {
        &settings.root_requires
    }
    else
    {
        &settings.packages
    };
    Ok(select_packages(&installed, roots, &settings.exclude_from_copy))
}

/// `autoload.files` of `packages`: package order first, manifest order
/// within a package.
pub fn files_registry(packages: &[Package]) -> FilesRegistry
{
    let mut registry = FilesRegistry::default();
    for package in packages
    {
        for file in &package.autoload_files
        {
            registry.push(&package.name, file.trim_start_matches("./"));
        }
    }
    registry
}

/// Resolve the packages to copy and list every file they contain.
pub fn discover(settings: &PrefixSettings) -> Result<Discovery, PrefixError>
{
    let packages = selected_packages(settings)?;
    let walker = FileWalker::new(&[]).map_err(|e| PrefixError::config(format!("{e:#}")))?;
    let mut discovery = Discovery { registry: files_registry(&packages), ..Discovery::default() };
    for package in packages
    {
        let files = walker.walk(&package.install_path);
        debug!(package = %package.name, files = files.len(), "package walked");
        for file in files
        {
            discovery
                .files
                .push(SourceFile {
                    package: package
                        .name
                        .clone(),
                    is_php: file.is_php(),
                    rel: file.rel,
                    abs: file.abs,
                });
        }
        discovery
            .packages
            .push(package);
    }

    info!(packages = discovery.packages.len(), files = discovery.files.len(), "discovery complete");
    Ok(discovery)
}
