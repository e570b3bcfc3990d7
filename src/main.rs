use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use dentefeliz::clock::SystemClock;
use dentefeliz::compactor;
use dentefeliz::config::Config;
use dentefeliz::identity::IdentityStore;
use dentefeliz::ledger::Ledger;
use dentefeliz::notify::NotifyHub;
use dentefeliz::shell::{Reply, Shell};
use dentefeliz::store::{DurableStore, Repository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the shell
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    dentefeliz::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(DurableStore::open(&config.store_path())?);
    info!("dentefeliz starting");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  daily_limit: {}", config.daily_limit);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let notify = Arc::new(NotifyHub::new());
    let compactor_store = store.clone();
    let compactor_notify = notify.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_store, compactor_notify, threshold).await;
    });

    let repo = Repository::new(store);
    let identity = Arc::new(IdentityStore::new(repo.clone(), config.admin.clone()));
    let ledger = Arc::new(Ledger::new(repo.clone(), Arc::new(SystemClock), notify, config.daily_limit));
    let shell = Shell::new(identity, ledger, repo);

    // Stop on SIGTERM/ctrl-c as well as on `quit` or end of input
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Dente Feliz. Type `help` for commands.\n").await?;
    stdout.flush().await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let reply = shell.execute_line(&line).await;
                if reply != Reply::Nothing {
                    stdout.write_all(format!("{reply}\n").as_bytes()).await?;
                    stdout.flush().await?;
                }
                if reply == Reply::Quit {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("dentefeliz stopped");
    Ok(())
}
