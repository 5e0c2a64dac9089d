//! The GLIDE diagnostic check catalogue.
//!
//! Builds the fixed, phase-ordered pipeline both `doctor` and the
//! bootstrap preflight run. Checks capture their collaborators at
//! construction; nothing here mutates the host.

use crate::check::{Check, CheckOutcome, Criticality, Phase, Remedy};
use crate::pipeline::PipelineConfig;
use crate::probe::{
    AssetInspector, AssetKind, ExecutableLocator, FsAssetInspector, ImportProbe, PortInspector,
    ProbeOutput, PythonImportProbe, SystemLocator, TcpPortInspector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Vendor download page, referenced by recommendations and `--download`.
pub const SUMO_DOWNLOAD_URL: &str = "https://sumo.dlr.de/docs/Downloads.php";

/// Core imports the backend cannot start without.
pub const REQUIRED_MODULES: [&str; 4] = ["fastapi", "uvicorn", "numpy", "pydantic"];

/// SUMO python bindings; the backend degrades to the analytic model
/// without them.
pub const OPTIONAL_MODULES: [&str; 2] = ["traci", "sumolib"];

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const IMPORT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Well-known locations inside a GLIDE-Lite checkout.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectPaths { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.root.join("backend")
    }

    pub fn app_entrypoint(&self) -> PathBuf {
        self.backend_dir().join("app_glide.py")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.backend_dir().join("assets")
    }

    pub fn corridor_config(&self) -> PathBuf {
        self.assets_dir().join("corridor.sumocfg")
    }

    pub fn requirements(&self) -> PathBuf {
        self.backend_dir().join("requirements.txt")
    }

    pub fn env_dir(&self) -> PathBuf {
        self.root.join(".venv")
    }

    pub fn env_python(&self) -> PathBuf {
        self.env_dir().join("bin").join("python")
    }
}

/// Everything the suite needs to build its checks.
pub struct SuiteContext {
    pub paths: ProjectPaths,
    pub port: u16,
    /// Captured at construction so checks stay free of ambient reads.
    pub sumo_home: Option<PathBuf>,
    pub active_env: Option<PathBuf>,
    pub locator: Arc<dyn ExecutableLocator>,
    pub imports: Arc<dyn ImportProbe>,
    pub assets: Arc<dyn AssetInspector>,
    pub ports: Arc<dyn PortInspector>,
}

impl SuiteContext {
    /// Build a context over the real host environment.
    ///
    /// Import probes run through the managed environment's interpreter
    /// when it exists, falling back to whatever `python3` is on PATH.
    pub fn detect(root: impl Into<PathBuf>, port: u16) -> Self {
        let paths = ProjectPaths::new(root);
        let locator: Arc<dyn ExecutableLocator> = Arc::new(SystemLocator);

        let interpreter = if paths.env_python().is_file() {
            paths.env_python()
        } else {
            locator
                .find_on_path("python3")
                .unwrap_or_else(|| PathBuf::from("python3"))
        };

        SuiteContext {
            paths,
            port,
            sumo_home: std::env::var_os("SUMO_HOME").map(PathBuf::from),
            active_env: std::env::var_os("VIRTUAL_ENV").map(PathBuf::from),
            locator,
            imports: Arc::new(PythonImportProbe::new(interpreter)),
            assets: Arc::new(FsAssetInspector),
            ports: Arc::new(TcpPortInspector),
        }
    }
}

/// The full diagnostic pipeline, phase-grouped in report order.
pub fn diagnostic_suite(ctx: &SuiteContext) -> PipelineConfig {
    let mut checks = Vec::new();
    checks.extend(environment_checks(ctx));
    checks.extend(executable_checks(ctx));
    checks.extend(library_checks(ctx));
    checks.extend(asset_checks(ctx));
    checks.extend(permission_checks(ctx));
    checks.extend(network_checks(ctx));
    PipelineConfig::new(checks)
}

pub fn environment_checks(ctx: &SuiteContext) -> Vec<Check> {
    let sumo_home = ctx.sumo_home.clone();
    let assets = ctx.assets.clone();
    let sumo_home_check = Check::new(
        "SUMO_HOME",
        Phase::Environment,
        Criticality::Advisory,
        move || {
            let sumo_home = sumo_home.clone();
            let assets = assets.clone();
            async move {
                let outcome = match sumo_home {
                    None => CheckOutcome::warn()
                        .with_detail("SUMO_HOME is not set")
                        .with_remedy(Remedy::SetSumoHome),
                    Some(dir) if !assets.exists(&dir) => CheckOutcome::fail()
                        .with_detail(format!("SUMO_HOME={} does not exist", dir.display()))
                        .with_remedy(Remedy::FixSumoHome),
                    Some(dir) => CheckOutcome::pass().with_detail(dir.display().to_string()),
                };
                Ok(outcome)
            }
        },
    )
    .with_description("SUMO installation directory variable");

    let active_env = ctx.active_env.clone();
    let env_dir = ctx.paths.env_dir();
    let venv_check = Check::new(
        "virtualenv",
        Phase::Environment,
        Criticality::Advisory,
        move || {
            let active_env = active_env.clone();
            let env_dir = env_dir.clone();
            async move {
                let outcome = match active_env {
                    Some(dir) if dir == env_dir => {
                        CheckOutcome::pass().with_detail("managed environment active")
                    }
                    Some(dir) => CheckOutcome::pass()
                        .with_detail(format!("external environment: {}", dir.display())),
                    None => CheckOutcome::warn()
                        .with_detail("no virtualenv active")
                        .with_remedy(Remedy::ActivateEnvironment),
                };
                Ok(outcome)
            }
        },
    )
    .with_description("active Python virtual environment");

    vec![sumo_home_check, venv_check]
}

pub fn executable_checks(ctx: &SuiteContext) -> Vec<Check> {
    let locator = ctx.locator.clone();
    let python_check = Check::new(
        "python3",
        Phase::Executables,
        Criticality::Blocking,
        move || {
            let locator = locator.clone();
            async move {
                let Some(python) = locator.find_on_path("python3") else {
                    return Ok(CheckOutcome::fail()
                        .with_detail("python3 not found on PATH")
                        .with_remedy(Remedy::InstallPython));
                };
                let detail = match locator
                    .invoke(&python, &["--version"], VERSION_PROBE_TIMEOUT)
                    .await
                {
                    Ok(output) => version_line(&output, &python),
                    Err(_) => python.display().to_string(),
                };
                Ok(CheckOutcome::pass().with_detail(detail))
            }
        },
    )
    .with_description("Python interpreter for the backend");

    let locator = ctx.locator.clone();
    let pip_check = Check::new(
        "pip",
        Phase::Executables,
        Criticality::Advisory,
        move || {
            let locator = locator.clone();
            async move {
                let Some(python) = locator.find_on_path("python3") else {
                    return Ok(CheckOutcome::fail()
                        .with_detail("python3 not found on PATH")
                        .with_remedy(Remedy::InstallPython));
                };
                let outcome = match locator
                    .invoke(&python, &["-m", "pip", "--version"], VERSION_PROBE_TIMEOUT)
                    .await
                {
                    Ok(output) if output.success() => {
                        CheckOutcome::pass().with_detail(version_line(&output, &python))
                    }
                    Ok(output) => CheckOutcome::fail()
                        .with_detail(
                            output
                                .stderr
                                .lines()
                                .last()
                                .unwrap_or("pip is not available")
                                .trim()
                                .to_string(),
                        )
                        .with_remedy(Remedy::EnsurePip),
                    Err(err) => CheckOutcome::fail()
                        .with_detail(err.to_string())
                        .with_remedy(Remedy::EnsurePip),
                };
                Ok(outcome)
            }
        },
    )
    .with_description("pip module of the backend interpreter");

    vec![
        python_check,
        pip_check,
        sumo_tool_check(ctx, "sumo", "SUMO command-line simulator"),
        sumo_tool_check(ctx, "sumo-gui", "SUMO GUI (optional for headless runs)"),
    ]
}

/// PATH first, then `$SUMO_HOME/bin`, mirroring how the backend resolves
/// the tools.
fn sumo_tool_check(ctx: &SuiteContext, tool: &'static str, description: &str) -> Check {
    let locator = ctx.locator.clone();
    let assets = ctx.assets.clone();
    let sumo_home = ctx.sumo_home.clone();
    Check::new(tool, Phase::Executables, Criticality::Advisory, move || {
        let locator = locator.clone();
        let assets = assets.clone();
        let sumo_home = sumo_home.clone();
        async move {
            let resolved = locator.find_on_path(tool).or_else(|| {
                sumo_home
                    .map(|home| home.join("bin").join(tool))
                    .filter(|candidate| assets.exists(candidate))
            });
            let Some(path) = resolved else {
                return Ok(CheckOutcome::warn()
                    .with_detail(format!("{tool} not found on PATH or under SUMO_HOME"))
                    .with_remedy(Remedy::InstallSumo));
            };
            let detail = match locator
                .invoke(&path, &["--version"], VERSION_PROBE_TIMEOUT)
                .await
            {
                Ok(output) if output.success() => version_line(&output, &path),
                _ => path.display().to_string(),
            };
            Ok(CheckOutcome::pass().with_detail(detail))
        }
    })
    .with_description(description)
}

pub fn library_checks(ctx: &SuiteContext) -> Vec<Check> {
    let mut checks = Vec::new();
    for module in REQUIRED_MODULES {
        checks.push(import_check(ctx, module, true));
    }
    for module in OPTIONAL_MODULES {
        checks.push(import_check(ctx, module, false));
    }
    checks
}

fn import_check(ctx: &SuiteContext, module: &'static str, required: bool) -> Check {
    let imports = ctx.imports.clone();
    Check::new(module, Phase::Libraries, Criticality::Advisory, move || {
        let imports = imports.clone();
        async move {
            let outcome = match imports.try_import(module, IMPORT_PROBE_TIMEOUT).await {
                Ok(()) => CheckOutcome::pass(),
                Err(err) if required => CheckOutcome::fail()
                    .with_detail(err.to_string())
                    .with_remedy(Remedy::InstallRequirements),
                Err(err) => CheckOutcome::warn()
                    .with_detail(err.to_string())
                    .with_remedy(Remedy::InstallPackage(module.to_string())),
            };
            Ok(outcome)
        }
    })
    .with_timeout(IMPORT_PROBE_TIMEOUT + Duration::from_secs(5))
    .with_description(if required {
        "required backend import"
    } else {
        "SUMO python bindings import"
    })
}

pub fn asset_checks(ctx: &SuiteContext) -> Vec<Check> {
    let assets = ctx.assets.clone();
    let entrypoint = ctx.paths.app_entrypoint();
    let entrypoint_check = Check::new(
        "backend entrypoint",
        Phase::Assets,
        Criticality::Blocking,
        move || {
            let assets = assets.clone();
            let entrypoint = entrypoint.clone();
            async move {
                if !assets.exists(&entrypoint) {
                    return Ok(CheckOutcome::fail()
                        .with_detail(format!("{} not found", entrypoint.display()))
                        .with_remedy(Remedy::RestoreBackendSources));
                }
                let outcome = match assets.validate(&entrypoint, AssetKind::PythonSource) {
                    Ok(()) => CheckOutcome::pass(),
                    Err(err) => CheckOutcome::fail()
                        .with_detail(err.to_string())
                        .with_remedy(Remedy::RestoreBackendSources),
                };
                Ok(outcome)
            }
        },
    )
    .with_description("FastAPI application module");

    let assets = ctx.assets.clone();
    let config = ctx.paths.corridor_config();
    let corridor_check = Check::new(
        "corridor config",
        Phase::Assets,
        Criticality::Advisory,
        move || {
            let assets = assets.clone();
            let config = config.clone();
            async move {
                if !assets.exists(&config) {
                    return Ok(CheckOutcome::warn().with_detail(format!(
                        "{} not found; SUMO-backed runs disabled",
                        config.display()
                    )));
                }
                let outcome = match assets.validate(&config, AssetKind::Xml) {
                    Ok(()) => CheckOutcome::pass(),
                    Err(err) => CheckOutcome::fail()
                        .with_detail(err.to_string())
                        .with_remedy(Remedy::RepairCorridorConfig),
                };
                Ok(outcome)
            }
        },
    )
    .with_description("SUMO corridor configuration");

    let assets = ctx.assets.clone();
    let manifest = ctx.paths.requirements();
    let manifest_check = Check::new(
        "requirements manifest",
        Phase::Assets,
        Criticality::Advisory,
        move || {
            let assets = assets.clone();
            let manifest = manifest.clone();
            async move {
                let outcome = if assets.exists(&manifest) {
                    match assets.validate(&manifest, AssetKind::Manifest) {
                        Ok(()) => CheckOutcome::pass(),
                        Err(err) => CheckOutcome::warn().with_detail(err.to_string()),
                    }
                } else {
                    CheckOutcome::warn().with_detail(format!(
                        "{} not found; installer falls back to the minimal package set",
                        manifest.display()
                    ))
                };
                Ok(outcome)
            }
        },
    )
    .with_description("declared backend dependencies");

    vec![entrypoint_check, corridor_check, manifest_check]
}

pub fn permission_checks(ctx: &SuiteContext) -> Vec<Check> {
    let assets = ctx.assets.clone();
    let root = ctx.paths.root().clone();
    let root_check = Check::new(
        "project dir writable",
        Phase::Permissions,
        Criticality::Blocking,
        move || {
            let assets = assets.clone();
            let root = root.clone();
            async move {
                let outcome = if assets.is_writable(&root) {
                    CheckOutcome::pass()
                } else {
                    CheckOutcome::fail()
                        .with_detail(format!("cannot write under {}", root.display()))
                        .with_remedy(Remedy::FixPermissions)
                };
                Ok(outcome)
            }
        },
    )
    .with_description("environment creation target");

    let assets = ctx.assets.clone();
    let backend = ctx.paths.backend_dir();
    let backend_check = Check::new(
        "backend dir readable",
        Phase::Permissions,
        Criticality::Advisory,
        move || {
            let assets = assets.clone();
            let backend = backend.clone();
            async move {
                let outcome = if assets.is_readable(&backend) {
                    CheckOutcome::pass()
                } else {
                    CheckOutcome::fail()
                        .with_detail(format!("cannot read {}", backend.display()))
                        .with_remedy(Remedy::FixPermissions)
                };
                Ok(outcome)
            }
        },
    )
    .with_description("backend sources and assets");

    vec![root_check, backend_check]
}

pub fn network_checks(ctx: &SuiteContext) -> Vec<Check> {
    let ports = ctx.ports.clone();
    let port = ctx.port;
    let port_check = Check::new(
        format!("port {port}"),
        Phase::Network,
        Criticality::Advisory,
        move || {
            let ports = ports.clone();
            async move {
                // Advisory by design: the server owns the authoritative
                // bind outcome.
                let outcome = if ports.is_port_in_use(port) {
                    CheckOutcome::warn()
                        .with_detail(format!("port {port} is already bound"))
                        .with_remedy(Remedy::FreePort(port))
                } else {
                    CheckOutcome::pass()
                };
                Ok(outcome)
            }
        },
    )
    .with_description("backend listen port availability");

    vec![port_check]
}

fn version_line(output: &ProbeOutput, fallback: &std::path::Path) -> String {
    let line = output.first_line();
    if !line.is_empty() {
        return line.to_string();
    }
    let err_line = output.stderr.lines().next().unwrap_or("").trim();
    if !err_line.is_empty() {
        return err_line.to_string();
    }
    fallback.display().to_string()
}
