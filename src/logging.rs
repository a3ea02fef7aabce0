use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{EvalError, Result};

/// File log at `level` under `log_dir/<bin>_<timestamp>.log`, warnings also on stderr.
pub fn init(log_dir: &Path, bin: &str, level: LevelFilter) -> Result<PathBuf> {
    let io_err = |source| EvalError::Io {
        path: log_dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(log_dir).map_err(io_err)?;

    let ts = Local::now().format("%Y%m%d-%H%M%S");
    let log_path = log_dir.join(format!("{bin}_{ts}.log"));
    let file = fs::File::create(&log_path).map_err(io_err)?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Warn,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, Config::default(), file),
    ])
    .map_err(|e| EvalError::Config(format!("logger already initialised: {e}")))?;

    Ok(log_path)
}
