use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt; // <- needed for .try_init()
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod crawl;
mod error;
mod health;
mod schedule;
mod scrape;
mod store;
mod types;

use crate::config::Config;
use crate::crawl::Crawler;
use crate::schedule::{Scheduler, POLL_PERIOD};
use crate::scrape::{ScrapeClient, USER_AGENT};
use crate::store::{LocalStore, PersistenceManager, RemoteTarget, RestStore};
use crate::types::ServiceInfo;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .finish()
        .try_init();

    // Config
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(
        url = %cfg.scrape_url,
        interval_hours = cfg.schedule.interval_hours,
        environment = %cfg.environment,
        remote = cfg.remote.is_some(),
        "starting web scraper"
    );

    // Init subsystems
    let local = LocalStore::new(&cfg.data_dir);
    local
        .ensure_dir()
        .with_context(|| format!("cannot create data dir {}", local.dir().display()))?;

    let sc = ScrapeClient::new(USER_AGENT).context("http client init failed")?;

    let remote: Option<Arc<dyn RemoteTarget>> = match &cfg.remote {
        Some(rc) => {
            info!(table = %rc.table, "remote store configured");
            Some(Arc::new(RestStore::new(sc.http.clone(), rc)))
        }
        None => {
            info!("no remote store credentials, batches go to {}", local.dir().display());
            None
        }
    };
    let store = PersistenceManager::new(remote, local);

    // Health runs on its own worker thread for the life of the process.
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    health::spawn(
        addr,
        ServiceInfo {
            service: cfg.service_name.clone(),
            environment: cfg.environment.clone(),
        },
    )
    .with_context(|| format!("cannot bind health server on {addr}"))?;

    let crawler = Crawler::new(sc, cfg.scrape_url.as_str(), cfg.selectors.clone(), store);
    Scheduler::new(cfg.schedule, POLL_PERIOD).run(&crawler).await;
    Ok(())
}
