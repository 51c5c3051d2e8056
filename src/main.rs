//! opa-gate: pipeline compliance gate.
//!
//! Evaluates each input document against a directory of OPA policies and exits
//! `0` when every rule is compliant, `1` on any violation, and `2` when the
//! gate could not reach a verdict (configuration, engine, or output error).
//!
//! The engine executable comes from `$OPA_BINARY_PATH`.

use std::path::{Path, PathBuf};

use clap::Parser;
use opa_gate::config::Config;
use opa_gate::error::GateError;
use opa_gate::gate::GateReport;
use opa_gate::logging;
use opa_gate::rules::RuleBundle;

#[derive(Parser, Debug)]
#[command(
    name = "opa-gate",
    version,
    about = "Fail a pipeline step when any OPA policy is non-compliant"
)]
struct Cli {
    /// Directory of policy files passed to the engine as one bundle.
    rule_dir: PathBuf,

    /// Input documents, evaluated in the order given.
    documents: Vec<PathBuf>,

    /// Gate config TOML (default: ~/.config/opa-gate/config.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-document engine timeout in seconds (0 disables it).
    #[arg(long)]
    timeout: Option<u64>,

    /// Write a JSON report of the run to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log engine command lines and raw engine output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let code = match run(&cli) {
        Ok(report) => {
            log::info!(
                "Gate verdict {}: {} rule result(s) across {} input file(s)",
                report.verdict.label(),
                report.result_count(),
                report.documents.len()
            );
            report.exit_code()
        }
        Err(e) => {
            // Errors raised before config resolution arrive with no logger installed.
            logging::init(cli.verbose, None);
            log::error!("opa-gate aborted: {e}");
            e.exit_code()
        }
    };
    log::logger().flush();
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<GateReport, GateError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.engine.timeout_secs = secs;
    }
    let gate_config = config.resolve(|key| std::env::var(key).ok())?;
    logging::init(cli.verbose, gate_config.log_file.as_deref());
    if let Some(path) = &config.source {
        log::debug!("applied config overlay from {}", path.display());
    }

    let bundle = RuleBundle::open(&cli.rule_dir)?;
    let report = opa_gate::check(&gate_config, &bundle, &cli.documents)?;

    if let Some(path) = &cli.report {
        write_report(path, &report)?;
    }
    Ok(report)
}

fn write_report(path: &Path, report: &GateReport) -> Result<(), GateError> {
    let report_error = |source: std::io::Error| GateError::Report {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(report_error)?;
    }
    let data = serde_json::to_string_pretty(report)
        .map_err(|e| report_error(std::io::Error::other(e)))?;
    std::fs::write(path, data + "\n").map_err(report_error)
}
