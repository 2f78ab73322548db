use anyhow::{Context, Result};
use product_gallery::api::ApiServer;
use product_gallery::logging::init_tracing;
use product_gallery::util::env as env_util;
use product_gallery::{mount, GalleryConfig, GalleryServices, SessionReport};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // --- env + logging -------------------------------------------------------
    env_util::init_env();
    init_tracing("info,product_gallery=debug,actix_web=info")?;
    env_util::bootstrap_cli("gallery");

    let config = GalleryConfig::from_env().context("gallery configuration")?;
    let services = GalleryServices::from_config(&config)?;

    // --- mount: background load + preview resolution -------------------------
    let mut handle = mount(&config, services);
    let store = handle.store().clone();
    let server = ApiServer::from_config(&config);

    // --- serve until Ctrl-C ---------------------------------------------------
    let serve = server.run(store);
    tokio::pin!(serve);
    let mut settled = false;
    loop {
        tokio::select! {
            res = &mut serve => {
                if let Err(e) = res {
                    warn!(error = %e, "API server stopped");
                }
                break;
            }
            report = handle.settled(), if !settled => {
                settled = true;
                match report {
                    Some(SessionReport::Settled { products, resolution }) => info!(
                        products,
                        resolved = resolution.resolved,
                        "catalog settled"
                    ),
                    Some(other) => warn!(report = ?other, "catalog did not settle"),
                    None => warn!("session ended early"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    handle.unmount();
    info!("gallery unmounted");
    Ok(())
}
