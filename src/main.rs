use std::sync::Arc;

use rsslay_bridge::bus::EventBus;
use rsslay_bridge::cache::{FeedCache, MemoryCache, RedisCache};
use rsslay_bridge::catalog::FeedCatalog;
use rsslay_bridge::feed::FeedFetcher;
use rsslay_bridge::relay_adapter::{RelayAdapter, RelayAdapterConfig};
use rsslay_bridge::replayer::{Replayer, ReplayerConfig};
use rsslay_bridge::store::EventStore;
use rsslay_bridge::updater::{Updater, UpdaterConfig};
use rsslay_bridge::Config;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid configuration");
            std::process::exit(1);
        }
    };

    let cache: Arc<dyn FeedCache> = if config.uses_redis() {
        match RedisCache::connect(&config.redis_connection_string).await {
            Ok(cache) => Arc::new(cache),
            Err(error) => {
                error!(%error, "failed to connect to redis");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(MemoryCache::new())
    };

    let fetcher = Arc::new(FeedFetcher::new(cache, config.nitter_instances.clone()));

    let catalog = match FeedCatalog::open(&config.database_directory).await {
        Ok(catalog) => Arc::new(catalog),
        Err(error) => {
            error!(%error, "failed to open the feed catalog");
            std::process::exit(1);
        }
    };

    let store = Arc::new(EventStore::new());
    let bus = Arc::new(EventBus::new());

    let mut updater = Updater::new(
        Arc::clone(&catalog),
        Arc::clone(&fetcher),
        Arc::clone(&store),
        Arc::clone(&bus),
        UpdaterConfig {
            delete_failing_feeds: config.delete_failing_feeds,
            enable_auto_nip05: config.enable_auto_nip05_registration,
            default_profile_picture_url: non_empty(&config.default_profile_picture_url),
            main_domain_name: config.main_domain_name.clone(),
            max_content_length: config.max_content_length,
        },
    );

    if config.replay_to_relays {
        let replayer = Arc::new(Replayer::new(ReplayerConfig {
            relays_to_publish: config.relays_to_publish.clone(),
            max_events_to_replay: config.max_events_to_replay,
            max_subroutines: config.max_subroutines,
            wait_time_between_batches: Duration::from_millis(config.default_wait_time_between_batches_ms),
            wait_time_for_relay_response: Duration::from_millis(config.default_wait_time_for_relay_response_ms),
        }));
        updater = updater.with_replayer(replayer);
    }

    let relay_adapter = RelayAdapter::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        RelayAdapterConfig {
            name: config.relay_name.clone(),
            description: "Relay that synthesizes virtual nostr profiles and event streams from syndicated RSS/Atom/JSON feeds".to_string(),
            owner_public_key: non_empty(&config.owner_public_key),
            contact: config.contact.clone(),
            software_url: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );
    let info_doc = relay_adapter.info_document();
    info!(name = %info_doc.name, nips = ?info_doc.supported_nips, "relay adapter ready");

    info!("starting update loop");
    updater
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
