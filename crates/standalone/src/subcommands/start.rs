use std::path::PathBuf;

use anyhow::Context as _;
use tokio::net::TcpListener;

use crate::routes::router;
use crate::startup::{self, LoggingConfig};
use crate::util::{create_dir_or_err, create_file_with_contents};
use crate::StandaloneEnv;

#[derive(clap::Args, Debug, Clone)]
#[command(
    about = "Starts a standalone trackwrite node",
    after_help = "If a value is set both on the command line and in the environment, the command line wins."
)]
pub struct StartArgs {
    /// The address and port to listen for connections on.
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    pub listen_addr: String,

    /// Number of partitions of every index.
    #[arg(long, env = "TRACKWRITE_PARTITIONS", default_value_t = 1)]
    pub partitions: u32,

    /// The path of the file that contains the log configuration.
    ///
    /// Created with the default configuration if missing.
    #[arg(long, env = "TRACKWRITE_LOG_CONFIG", default_value = "log.conf")]
    pub log_conf_path: PathBuf,

    /// The directory that should contain the log files.
    #[arg(long, env = "TRACKWRITE_LOGS_PATH", default_value = "logs")]
    pub log_dir_path: PathBuf,
}

pub async fn exec(args: StartArgs) -> anyhow::Result<()> {
    let StartArgs {
        listen_addr,
        partitions,
        log_conf_path,
        log_dir_path,
    } = args;
    anyhow::ensure!(partitions > 0, "an index needs at least one partition");

    create_file_with_contents(&log_conf_path, include_str!("../../log.conf"))?;
    create_dir_or_err(&log_dir_path)?;
    startup::configure_logging(LoggingConfig {
        conf_file: log_conf_path,
        log_dir: log_dir_path,
    })?;

    let ctx = StandaloneEnv::init(partitions);
    let service = router().with_state(ctx);

    let tcp = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    log::info!("Starting trackwrite listening on {}", tcp.local_addr()?);
    axum::serve(tcp, service).await?;
    Ok(())
}
