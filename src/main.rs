use std::sync::Arc;

use mc_server_pinger::config::ConfigManager;
use mc_server_pinger::metrics::{inc_failure, initialize_metrics, observe_status, serve_metrics};
use mc_server_pinger::pinger::ServerPinger;
use mc_server_pinger::scheduler::Scheduler;
use tokio::time::Duration;
use tracing::{info, warn};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config_mgr = Arc::new(ConfigManager::start().await?);
    let (log_level, enable_latency_history, metrics_port, ping_interval_ms) = {
        let config = config_mgr.config.read().await;
        (
            config.get_tracing_level()?,
            config.enable_latency_history,
            config.metrics_port,
            config.ping_interval_ms,
        )
    };

    println!("Starting mc-server-pinger");

    initialize_metrics(enable_latency_history);

    // Init tracing with configured log level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mc_server_pinger={}", log_level.as_str().to_lowercase()).parse()?),
        )
        .init();

    let metrics_addr = ([0, 0, 0, 0], metrics_port).into();
    tokio::spawn(serve_metrics(metrics_addr));

    let scheduler = Scheduler::new(Duration::from_millis(ping_interval_ms))?;

    scheduler
        .run(move |_tick| {
            let config_mgr = config_mgr.clone();
            async move {
                let (targets, timeout) = {
                    let config = config_mgr.config.read().await;
                    (config.targets(), config.timeout())
                };
                for address in targets {
                    tokio::spawn(async move {
                        let server = address.to_string();
                        let pinger = ServerPinger::new(address).with_timeout(timeout);
                        match pinger.ping().await {
                            Ok(status) => {
                                info!(
                                    "{} via {} in {:?}",
                                    status.response.summary(&server),
                                    status.resolved.socket_addr(),
                                    status.latency
                                );
                                observe_status(&server, &status);
                            }
                            Err(e) => {
                                warn!("ping {} failed: {}", server, e);
                                inc_failure(&server, e.reason());
                            }
                        }
                    });
                }
            }
        })
        .await?;

    Ok(())
}
