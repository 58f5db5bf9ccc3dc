//! Long-lived actor: refreshes every catalogued feed on a timer, fanning the
//! work out through a bounded pool.
//!
//! Grounded on `pkg/new/app/handler_update_feeds.go` (10-worker fan-out,
//! metadata-then-items ordering, now-fallback skip, per-feed error
//! aggregation) and `pkg/new/ports/timer_update_feeds.go` (run-once-then-wait
//! 30-minute loop). The worker pool itself uses `futures_util`'s
//! `buffer_unordered`, the same bounded-concurrency idiom grounded in
//! `other_examples/ae4393bb_dhofheinz-skim__src-feed-fetcher.rs.rs`, rather
//! than a hand-rolled channel pool — `tokio::sync::mpsc` plus manual workers
//! is the Go shape, not the idiomatic Rust one.

use crate::catalog::FeedCatalog;
use crate::converter::{self, MetadataOptions};
use crate::feed::FeedFetcher;
use crate::identity::Identity;
use crate::replayer::{EventWithKeys, Replayer};
use crate::store::EventStore;
use crate::{bus::EventBus, catalog::FeedDefinition};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const NUM_WORKERS: usize = 10;
const UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub struct UpdaterConfig {
    pub delete_failing_feeds: bool,
    pub enable_auto_nip05: bool,
    pub default_profile_picture_url: Option<String>,
    pub main_domain_name: String,
    pub max_content_length: usize,
}

pub struct Updater {
    catalog: Arc<FeedCatalog>,
    fetcher: Arc<FeedFetcher>,
    store: Arc<EventStore>,
    bus: Arc<EventBus>,
    replayer: Option<Arc<Replayer>>,
    config: UpdaterConfig,
}

impl Updater {
    pub fn new(catalog: Arc<FeedCatalog>, fetcher: Arc<FeedFetcher>, store: Arc<EventStore>, bus: Arc<EventBus>, config: UpdaterConfig) -> Self {
        Self {
            catalog,
            fetcher,
            store,
            bus,
            replayer: None,
            config,
        }
    }

    /// Opts this updater into scheduling a peer-relay replay after each
    /// successfully updated feed. Off by default (see `replayToRelays`).
    pub fn with_replayer(mut self, replayer: Arc<Replayer>) -> Self {
        self.replayer = Some(replayer);
        self
    }

    /// Runs the update pass immediately, then every 30 minutes, until
    /// `cancelled` resolves.
    pub async fn run(&self, cancelled: impl std::future::Future<Output = ()>) {
        tokio::pin!(cancelled);
        loop {
            if let Err(error) = self.update_all().await {
                error!(%error, "error updating feeds");
            }

            tokio::select! {
                _ = tokio::time::sleep(UPDATE_INTERVAL) => continue,
                _ = &mut cancelled => return,
            }
        }
    }

    pub async fn update_all(&self) -> anyhow::Result<()> {
        let definitions = self.catalog.list_all().await?;
        let total = definitions.len();

        let mut success = 0usize;
        let mut failure = 0usize;

        let mut results = stream::iter(definitions)
            .map(|definition| self.update_feed(definition))
            .buffer_unordered(NUM_WORKERS);

        while let Some(result) = results.next().await {
            match result {
                Ok(()) => success += 1,
                Err(error) => {
                    warn!(%error, "error updating a feed");
                    failure += 1;
                }
            }
        }

        info!(total, success, failure, "updating feeds result");
        Ok(())
    }

    async fn update_feed(&self, definition: FeedDefinition) -> anyhow::Result<()> {
        let keys = definition.keys();
        info!(author = %keys.public_key(), "updating feed");

        let feed = match self.fetcher.fetch(&definition.url, definition.nitter).await {
            Ok(feed) => feed,
            Err(error) => {
                if self.config.delete_failing_feeds {
                    warn!(url = %definition.url, %error, "deleting failing feed");
                    self.catalog.delete(&definition.public_key).await?;
                }
                return Err(error.into());
            }
        };

        if !definition.nitter && converter::is_twitter_feed(&feed) {
            self.catalog.set_nitter(&definition.public_key, true).await?;
        }

        let identity = Identity::from_keys(keys.clone());
        let mut events = Vec::with_capacity(feed.items.len() + 1);

        let metadata_event = converter::convert_metadata(
            &identity,
            &feed,
            MetadataOptions {
                original_url: &definition.url,
                enable_auto_nip05: self.config.enable_auto_nip05,
                default_profile_picture_url: self.config.default_profile_picture_url.as_deref(),
                nip05_domain: &self.config.main_domain_name,
            },
        )?;
        events.push(metadata_event);

        let variant = converter::select(&feed);
        for item in &feed.items {
            if let Some(event) = converter::convert_item(&identity, item, &feed, &definition.url, self.config.max_content_length, variant)? {
                events.push(event);
            }
        }

        self.store.put_events(keys.public_key(), events.clone()).await?;

        if let Some(replayer) = &self.replayer {
            let for_replay = events
                .iter()
                .map(|event| EventWithKeys {
                    event: event.clone(),
                    keys: keys.clone(),
                })
                .collect();
            replayer.schedule(for_replay);
        }

        for event in events {
            self.bus.publish(event).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::identity::Identity;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_XML: &str = r#"<rss version="2.0"><channel>
        <title>Example</title>
        <link>https://example.com</link>
        <item><guid>1</guid><title>Hello</title><link>https://example.com/1</link><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
    </channel></rss>"#;

    fn updater_config() -> UpdaterConfig {
        UpdaterConfig {
            delete_failing_feeds: false,
            enable_auto_nip05: false,
            default_profile_picture_url: None,
            main_domain_name: "example.com".to_string(),
            max_content_length: 500,
        }
    }

    #[tokio::test]
    async fn update_all_stores_and_publishes_events_for_a_registered_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED_XML))
            .mount(&mock_server)
            .await;

        let catalog = Arc::new(FeedCatalog::open(":memory:").await.unwrap());
        let identity = Identity::derive("secret", mock_server.uri().as_str()).unwrap();
        catalog
            .put(&FeedDefinition {
                public_key: identity.public_key(),
                secret_key: identity.secret_key().clone(),
                url: mock_server.uri(),
                nitter: false,
            })
            .await
            .unwrap();

        let fetcher = Arc::new(FeedFetcher::new(Arc::new(MemoryCache::new()), vec![]));
        let store = Arc::new(EventStore::new());
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe().await;

        let updater = Updater::new(catalog, fetcher, Arc::clone(&store), Arc::clone(&bus), updater_config());
        updater.update_all().await.unwrap();

        let filter = crate::event::Filter {
            authors: vec![identity.public_key()],
            ..Default::default()
        };
        let stored = store.get_events(&filter).await;
        assert_eq!(stored.len(), 2); // metadata + one text note

        let published = rx.recv().await.unwrap();
        assert_eq!(published.pubkey, identity.public_key());
    }

    #[tokio::test]
    async fn failing_feed_is_deleted_when_configured() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let catalog = Arc::new(FeedCatalog::open(":memory:").await.unwrap());
        let identity = Identity::derive("secret", mock_server.uri().as_str()).unwrap();
        catalog
            .put(&FeedDefinition {
                public_key: identity.public_key(),
                secret_key: identity.secret_key().clone(),
                url: mock_server.uri(),
                nitter: false,
            })
            .await
            .unwrap();

        let fetcher = Arc::new(FeedFetcher::new(Arc::new(MemoryCache::new()), vec![]));
        let store = Arc::new(EventStore::new());
        let bus = Arc::new(EventBus::new());

        let mut config = updater_config();
        config.delete_failing_feeds = true;
        let updater = Updater::new(Arc::clone(&catalog), fetcher, store, bus, config);
        updater.update_all().await.unwrap();

        assert_eq!(catalog.count_total().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn twitter_feed_flips_the_catalog_nitter_flag_on_first_detection() {
        const TWITTER_FEED_XML: &str = r#"<rss version="2.0"><channel>
            <title>nitter user</title>
            <link>https://nitter.example/user</link>
            <description>Twitter feed for @user</description>
            <item><guid>1</guid><title>Hello</title><link>https://nitter.example/user/1</link><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
        </channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TWITTER_FEED_XML))
            .mount(&mock_server)
            .await;

        let catalog = Arc::new(FeedCatalog::open(":memory:").await.unwrap());
        let identity = Identity::derive("secret", mock_server.uri().as_str()).unwrap();
        catalog
            .put(&FeedDefinition {
                public_key: identity.public_key(),
                secret_key: identity.secret_key().clone(),
                url: mock_server.uri(),
                nitter: false,
            })
            .await
            .unwrap();

        let fetcher = Arc::new(FeedFetcher::new(Arc::new(MemoryCache::new()), vec![]));
        let store = Arc::new(EventStore::new());
        let bus = Arc::new(EventBus::new());

        let updater = Updater::new(Arc::clone(&catalog), fetcher, store, bus, updater_config());
        updater.update_all().await.unwrap();

        let stored = catalog.get_by_public_key(&identity.public_key()).await.unwrap().unwrap();
        assert!(stored.nitter);
    }
}
