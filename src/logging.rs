use std::fs::{File, OpenOptions};
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Install the process logger: stderr always, plus `log_file` when configured.
///
/// Best-effort: a log file that cannot be opened is reported and skipped, and
/// a second call is a no-op (logging must never block the gate).
pub fn init(verbose: bool, log_file: Option<&Path>) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let term_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        term_config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        match open_append(path) {
            Ok(file) => {
                let file_config = ConfigBuilder::new()
                    .set_time_format_rfc3339()
                    .set_thread_level(LevelFilter::Off)
                    .set_target_level(LevelFilter::Off)
                    .build();
                loggers.push(WriteLogger::new(level, file_config, file));
            }
            Err(e) => eprintln!("opa-gate: cannot open log file {}: {e}", path.display()),
        }
    }

    let _ = CombinedLogger::init(loggers);
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
