//! In-memory probe doubles for tests.
//!
//! Kept in the library proper so downstream crates (bootstrap, CLI) can
//! drive the pipeline against a scripted environment in their own tests.

use crate::error::ProbeError;
use crate::fix::PackageInstaller;
use crate::probe::{
    AssetInspector, AssetKind, ExecutableLocator, ImportProbe, PortInspector, ProbeOutput,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Locator backed by a fixed name → path table.
#[derive(Default)]
pub struct FakeLocator {
    programs: HashMap<String, PathBuf>,
    outputs: HashMap<String, ProbeOutput>,
}

impl FakeLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.programs.insert(name.to_string(), path.into());
        self
    }

    /// Script the output of invoking `program` (matched by file name).
    pub fn with_output(mut self, program: &str, output: ProbeOutput) -> Self {
        self.outputs.insert(program.to_string(), output);
        self
    }
}

#[async_trait]
impl ExecutableLocator for FakeLocator {
    fn find_on_path(&self, name: &str) -> Option<PathBuf> {
        self.programs.get(name).cloned()
    }

    async fn invoke(
        &self,
        program: &Path,
        _args: &[&str],
        _timeout: Duration,
    ) -> Result<ProbeOutput, ProbeError> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match self.outputs.get(&name) {
            Some(output) => Ok(output.clone()),
            None => Ok(ProbeOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

/// Import probe with a fixed set of importable modules.
#[derive(Default)]
pub struct FakeImports {
    available: HashSet<String>,
}

impl FakeImports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.available.insert(module.to_string());
        self
    }
}

#[async_trait]
impl ImportProbe for FakeImports {
    async fn try_import(&self, module: &str, _timeout: Duration) -> Result<(), ProbeError> {
        if self.available.contains(module) {
            Ok(())
        } else {
            Err(ProbeError::Import {
                module: module.to_string(),
                reason: format!("ModuleNotFoundError: No module named '{module}'"),
            })
        }
    }
}

/// Asset inspector over a scripted filesystem view.
#[derive(Default)]
pub struct FakeAssets {
    existing: HashSet<PathBuf>,
    malformed: HashSet<PathBuf>,
    unwritable: HashSet<PathBuf>,
    unreadable: HashSet<PathBuf>,
}

impl FakeAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.existing.insert(path.into());
        self
    }

    /// Present but fails validation for any kind.
    pub fn with_malformed(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.existing.insert(path.clone());
        self.malformed.insert(path);
        self
    }

    pub fn with_unwritable(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unwritable.insert(dir.into());
        self
    }

    pub fn with_unreadable(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(dir.into());
        self
    }
}

impl AssetInspector for FakeAssets {
    fn exists(&self, path: &Path) -> bool {
        self.existing.contains(path)
    }

    fn validate(&self, path: &Path, _kind: AssetKind) -> Result<(), ProbeError> {
        if !self.existing.contains(path) {
            return Err(ProbeError::Missing(path.display().to_string()));
        }
        if self.malformed.contains(path) {
            return Err(ProbeError::Validation {
                path: path.display().to_string(),
                reason: "malformed".to_string(),
            });
        }
        Ok(())
    }

    fn is_writable(&self, dir: &Path) -> bool {
        !self.unwritable.contains(dir)
    }

    fn is_readable(&self, dir: &Path) -> bool {
        !self.unreadable.contains(dir)
    }
}

/// Port inspector with a scripted bound-port set.
#[derive(Default)]
pub struct FakePorts {
    in_use: HashSet<u16>,
}

impl FakePorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound_port(mut self, port: u16) -> Self {
        self.in_use.insert(port);
        self
    }
}

impl PortInspector for FakePorts {
    fn is_port_in_use(&self, port: u16) -> bool {
        self.in_use.contains(&port)
    }
}

/// Installer recording every request, optionally failing.
#[derive(Default)]
pub struct FakeInstaller {
    pub installed: Mutex<Vec<String>>,
    pub manifest_installs: Mutex<u32>,
    fail_packages: HashSet<String>,
    fail_manifest: bool,
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_package(mut self, name: &str) -> Self {
        self.fail_packages.insert(name.to_string());
        self
    }

    pub fn failing_manifest(mut self) -> Self {
        self.fail_manifest = true;
        self
    }
}

#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn install_packages(&self, packages: &[String]) -> anyhow::Result<()> {
        for package in packages {
            if self.fail_packages.contains(package) {
                anyhow::bail!("no distribution found for {package}");
            }
        }
        self.installed
            .lock()
            .unwrap()
            .extend(packages.iter().cloned());
        Ok(())
    }

    async fn install_from_manifest(&self, manifest: &Path) -> anyhow::Result<()> {
        if self.fail_manifest {
            anyhow::bail!("{} not found", manifest.display());
        }
        *self.manifest_installs.lock().unwrap() += 1;
        Ok(())
    }
}
