//! glidectl - operator tooling for the GLIDE-Lite corridor demo
//!
//! ## Commands
//!
//! - `up`: prepare the managed environment and launch the backend
//! - `doctor`: run read-only environment diagnostics
//!
//! Exit codes: `0` clean, `1` blocking failure, `2` advisory warnings
//! (doctor only). `up` exits non-zero only when a blocking step fails
//! before handoff.

mod output;
mod telemetry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use glide_bootstrap::{
    BootstrapOptions, BootstrapSequence, LaunchSpec, SystemEnv, UvicornLauncher,
};
use glide_envman::{PipInstaller, VirtualEnv};
use glide_preflight::probe::PythonImportProbe;
use glide_preflight::suite::SUMO_DOWNLOAD_URL;
use glide_preflight::{
    diagnostic_suite, ExecutableLocator, ExitDecision, FixRunner, PipelineRunner, SuiteContext,
};
use glide_preflight::probe::SystemLocator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "glidectl")]
#[command(author = "GLIDE-Lite Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator tooling for the GLIDE-Lite corridor demo", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the environment and launch the backend server
    Up {
        /// Destroy and recreate the managed environment first
        #[arg(long)]
        clean: bool,

        /// Skip dependency installation
        #[arg(long = "no-deps")]
        no_deps: bool,

        /// Backend listen port
        #[arg(short, long, default_value = "8001")]
        port: u16,

        /// Project checkout root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Run read-only environment diagnostics
    Doctor {
        /// Show per-check descriptions and timings
        #[arg(long)]
        detailed: bool,

        /// Attempt remediation for fixable findings
        #[arg(long)]
        fix: bool,

        /// Open the SUMO download page
        #[arg(long)]
        download: bool,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        report_json: bool,

        /// Backend listen port the checks should probe
        #[arg(short, long, default_value = "8001")]
        port: u16,

        /// Project checkout root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Up {
            clean,
            no_deps,
            port,
            root,
        } => cmd_up(clean, no_deps, port, &root).await?,
        Commands::Doctor {
            detailed,
            fix,
            download,
            report_json,
            port,
            root,
        } => cmd_doctor(detailed, fix, download, report_json, port, &root).await?,
    };

    std::process::exit(code);
}

/// Bootstrap the environment and hand off to the backend.
async fn cmd_up(clean: bool, no_deps: bool, port: u16, root: &PathBuf) -> Result<i32> {
    let paths = glide_preflight::ProjectPaths::new(root.clone());

    let system_python = SystemLocator
        .find_on_path("python3")
        .unwrap_or_else(|| PathBuf::from("python3"));

    let env = Arc::new(SystemEnv::new(
        paths.env_dir(),
        system_python,
        paths.requirements(),
    ));
    let launcher = Arc::new(UvicornLauncher::new(LaunchSpec::new(
        paths.backend_dir(),
        port,
    )));

    let preflight_root = root.clone();
    let sequence = BootstrapSequence::new(
        env.clone(),
        env,
        launcher,
        Box::new(move |interpreter| {
            // Probe imports through the activated interpreter, not
            // whatever python happens to be on PATH.
            let mut ctx = SuiteContext::detect(preflight_root.clone(), port);
            ctx.imports = Arc::new(PythonImportProbe::new(interpreter.to_path_buf()));
            diagnostic_suite(&ctx)
        }),
    );

    let run = sequence
        .run(&BootstrapOptions {
            clean,
            skip_deps: no_deps,
            port,
        })
        .await;

    print!("{}", output::render_report(&run.report, false));
    Ok(run.exit_code())
}

/// Run the diagnostic scan and optionally attempt fixes.
async fn cmd_doctor(
    detailed: bool,
    fix: bool,
    download: bool,
    report_json: bool,
    port: u16,
    root: &PathBuf,
) -> Result<i32> {
    if download {
        open_download_page();
    }

    let ctx = SuiteContext::detect(root.clone(), port);
    let config = diagnostic_suite(&ctx);
    let mut report = PipelineRunner::run(&config).await;

    if fix {
        apply_fixes(&ctx, &mut report).await;
    }

    let decision = ExitDecision::from_tally(&report.tally());
    if report_json {
        println!("{}", output::render_json(&report, decision)?);
    } else {
        print!("{}", output::render_report(&report, detailed));
        println!();
        println!("environment is {}", output::status_word(decision));
    }

    Ok(decision.code())
}

/// Attempt remediation through the managed environment's pip; results
/// land as notes on the report, never as new outcomes.
async fn apply_fixes(ctx: &SuiteContext, report: &mut glide_preflight::RunReport) {
    let venv = VirtualEnv::new(ctx.paths.env_dir());
    let active = match venv.activate() {
        Ok(active) => active,
        Err(err) => {
            warn!(error = %err, "cannot fix without a managed environment");
            report.append_note(format!("fixes skipped: {err}"));
            return;
        }
    };

    let pip = PipInstaller::new(&active);
    let fixer = FixRunner::new(&pip, ctx.paths.requirements());
    let notes = fixer.run(report).await;

    if notes.is_empty() {
        return;
    }
    for note in notes {
        let prefix = if note.applied { "fix applied" } else { "fix failed" };
        report.append_note(format!("{prefix}: {}", note.note));
    }
    report.append_note("re-run `glidectl doctor` to confirm the fixes");
}

/// Best-effort: hand the vendor download page to the desktop opener.
fn open_download_page() {
    for opener in ["xdg-open", "open"] {
        let Some(path) = SystemLocator.find_on_path(opener) else {
            continue;
        };
        match std::process::Command::new(path).arg(SUMO_DOWNLOAD_URL).spawn() {
            Ok(_) => {
                info!(url = SUMO_DOWNLOAD_URL, "opened download page");
                return;
            }
            Err(_) => continue,
        }
    }
    warn!("no desktop opener found; visit {SUMO_DOWNLOAD_URL} manually");
}
