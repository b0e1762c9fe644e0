use anyhow::Result;
use clap::Parser;

use autoheal_daemon::cli::DaemonCli;
use autoheal_daemon::logging;
use autoheal_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 (기본값 -> 파일 -> 환경변수 -> CLI)
    let loaded = orchestrator::load_config(&cli).await?;

    if cli.validate {
        for rejected in &loaded.rejected_env {
            eprintln!("warning: {rejected}");
        }
        println!("configuration is valid");
        return Ok(());
    }

    let config = loaded.config;
    logging::init_tracing(&config.general)?;
    // 구독자 설치 전에 거부된 환경변수는 여기서 보고
    orchestrator::report_rejected_env(&loaded.rejected_env);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = config.watchdog.interval_secs,
        timeout_secs = config.watchdog.timeout_secs,
        unhealthy_count = config.watchdog.unhealthy_count,
        socket = %config.watchdog.socket,
        filter = %config.watchdog.filter,
        "autoheal-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    Ok(())
}
