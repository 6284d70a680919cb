use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use itertools::Itertools;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{reload, EnvFilter};

/// Where [`configure_logging`] reads its filter from and writes its logs to.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub conf_file: PathBuf,
    pub log_dir: PathBuf,
}

pub fn configure_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let LoggingConfig { conf_file, log_dir } = config;
    let filter = parse_from_file(&conf_file);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(rolling::daily(log_dir, "trackwrite.log")))
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_env_filter(filter);

    // Use this to change log levels at runtime.
    // Bump a module to `debug` or `trace` in the config file while chasing
    // an issue, and turn it off again once you are done.
    if cfg!(debug_assertions) {
        let builder = builder.with_filter_reloading();
        let reload_handle = builder.reload_handle();
        std::thread::spawn(move || reload_config(&conf_file, &reload_handle));
        builder.try_init().map_err(|e| anyhow!(e))
    } else {
        builder.try_init().map_err(|e| anyhow!(e))
    }
}

/// Turn a config file into an [`EnvFilter`]: one directive per line, `#`
/// starts a comment. A missing file yields an empty filter.
pub fn parse_from_file(file: &Path) -> EnvFilter {
    EnvFilter::new(directives(&std::fs::read_to_string(file).unwrap_or_default()))
}

fn directives(conf: &str) -> String {
    conf.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .join(",")
}

const RELOAD_INTERVAL: Duration = Duration::from_secs(5);
fn reload_config<S>(conf_file: &Path, reload_handle: &reload::Handle<EnvFilter, S>) {
    let mut prev_time = conf_file.metadata().and_then(|m| m.modified()).ok();
    loop {
        std::thread::sleep(RELOAD_INTERVAL);
        if let Ok(modified) = conf_file.metadata().and_then(|m| m.modified()) {
            if prev_time.is_none_or(|prev| modified > prev) {
                eprintln!("reloading log config...");
                prev_time = Some(modified);
                if reload_handle.reload(parse_from_file(conf_file)).is_err() {
                    break;
                }
            }
        }
    }
}
