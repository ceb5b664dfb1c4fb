//! Wiring from config to running watchers
//!
//! One page source is shared by every watcher so the client's scheduler
//! spaces all outbound requests against a single budget. Items are written
//! to the output as JSON lines; errors are counted and logged.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use listing_auth::{AppIdentity, CredentialManager};
use listing_client::{ApiClient, Item, PageSource, PublicSource, Scheduler};
use listing_watch::{ERROR_EVENT, WatchEvent, Watcher, WatcherHandle};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Counters shared between watcher handlers and the health endpoint
#[derive(Debug, Clone)]
pub struct WatchMetrics {
    pub items_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub running: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl WatchMetrics {
    pub fn new() -> Self {
        Self {
            items_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Shared HTTP client; every request is bounded by `client.timeout_secs`.
pub fn build_http(config: &Config) -> Result<reqwest::Client> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.client.timeout_secs))
        .build()?;
    Ok(http)
}

/// Authenticated API client when `[account]` is configured, public reads otherwise.
pub fn build_source(config: &Config, http: reqwest::Client) -> Result<Arc<dyn PageSource>> {
    let client = &config.client;

    let Some(account) = &config.account else {
        let source = match &client.public_origin {
            Some(origin) => PublicSource::with_origin(http, client.user_agent.clone(), origin)?,
            None => PublicSource::new(http, client.user_agent.clone())?,
        };
        info!("reading feeds anonymously from the public origin");
        return Ok(Arc::new(source));
    };

    let identity = AppIdentity {
        app_id: account.app_id.clone(),
        app_secret: account
            .app_secret
            .clone()
            .ok_or(Error::IncompleteAccount("app_secret"))?,
        username: account.username.clone(),
        password: account
            .password
            .clone()
            .ok_or(Error::IncompleteAccount("password"))?,
        user_agent: client.user_agent.clone(),
    };

    let mut credentials = CredentialManager::new(http.clone(), identity);
    if let Some(endpoint) = &client.token_endpoint {
        credentials = credentials.with_token_endpoint(endpoint.clone());
    }

    let mut api = ApiClient::new(
        http,
        Arc::new(credentials),
        Scheduler::new(client.requests_per_minute),
    )?
    .with_automatic_retries(client.automatic_retries);
    if let Some(origin) = &client.api_origin {
        api = api.with_origin(origin)?;
    }

    info!(
        username = %account.username,
        requests_per_minute = client.requests_per_minute,
        automatic_retries = client.automatic_retries,
        "reading feeds through the authenticated API"
    );
    Ok(Arc::new(api))
}

/// Build, subscribe, and start one watcher per `[[watch]]` entry.
pub fn start_watchers<W>(
    config: &Config,
    source: Arc<dyn PageSource>,
    metrics: &WatchMetrics,
    out: Arc<Mutex<W>>,
) -> Result<Vec<WatcherHandle>>
where
    W: Write + Send + 'static,
{
    let mut watchers = Vec::with_capacity(config.watches.len());
    for watch in &config.watches {
        let target = watch.target()?;
        let mut watcher = Watcher::new(source.clone(), &target, config.client.requests_per_minute);
        subscribe(&mut watcher, metrics.clone(), out.clone())?;
        watchers.push(watcher);
    }

    // Start only once every entry has been built
    let handles: Vec<_> = watchers.into_iter().map(Watcher::start).collect();
    metrics.running.store(handles.len() as u64, Ordering::Relaxed);
    crate::metrics::set_watchers_running(handles.len());
    Ok(handles)
}

/// Write items to `out` and count errors.
pub fn subscribe<W>(watcher: &mut Watcher, metrics: WatchMetrics, out: Arc<Mutex<W>>) -> Result<()>
where
    W: Write + Send + 'static,
{
    let name = watcher.name().to_string();
    let item_event = watcher.item_event().to_string();

    {
        let name = name.clone();
        let metrics = metrics.clone();
        let event_name = item_event.clone();
        watcher.on(&item_event, move |event| {
            let WatchEvent::Item(item) = event else {
                return;
            };
            metrics.items_total.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_item(&name);

            let line = match item_line(&name, &event_name, item) {
                Ok(line) => line,
                Err(e) => {
                    warn!(watcher = %name, item = %item.name, error = %e, "failed to encode item");
                    return;
                }
            };
            match out.lock() {
                Ok(mut out) => {
                    if let Err(e) = writeln!(out, "{line}") {
                        warn!(watcher = %name, error = %e, "failed to write item");
                    }
                }
                Err(_) => warn!(watcher = %name, "item output lock poisoned"),
            }
        })?;
    }

    watcher.on(ERROR_EVENT, move |event| {
        if let WatchEvent::Error(err) = event {
            metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_error(&name, err.kind());
        }
    })?;

    Ok(())
}

/// One output line: `{"watcher": ..., "event": ..., "item": {...}}`.
pub fn item_line(watcher: &str, event: &str, item: &Item) -> serde_json::Result<String> {
    serde_json::to_string(&serde_json::json!({
        "watcher": watcher,
        "event": event,
        "item": item,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, ClientConfig, WatchConfig};
    use common::Secret;
    use std::future::Future;
    use std::pin::Pin;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(account: Option<AccountConfig>, watches: Vec<WatchConfig>) -> Config {
        Config {
            client: ClientConfig {
                user_agent: "listing-watcher-tests/0.1".into(),
                requests_per_minute: 10,
                automatic_retries: true,
                timeout_secs: 30,
                api_origin: None,
                token_endpoint: None,
                public_origin: None,
            },
            account,
            server: None,
            watches,
        }
    }

    fn account(password: Option<&str>) -> AccountConfig {
        AccountConfig {
            app_id: "app".into(),
            username: "someone".into(),
            app_secret: Some(Secret::new("secret".to_string())),
            app_secret_file: None,
            password: password.map(|p| Secret::new(p.to_string())),
            password_file: None,
        }
    }

    fn hot(limit: usize) -> WatchConfig {
        WatchConfig::Listing {
            subreddit: None,
            listing: "hot".into(),
            limit,
        }
    }

    /// Returns the same page on every request.
    struct FixedSource(Vec<Item>);

    impl PageSource for FixedSource {
        fn id(&self) -> &str {
            "fixed"
        }

        fn fetch_page<'a>(
            &'a self,
            _path: &'a str,
            _after: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = listing_client::Result<Vec<Item>>> + Send + 'a>> {
            let page = self.0.clone();
            Box::pin(async move { Ok(page) })
        }
    }

    #[test]
    fn item_line_is_single_line_json() {
        let item = Item::new("t3_abc", serde_json::json!({"name": "t3_abc", "title": "hi\nthere"}));
        let line = item_line("listing:hot", "item", &item).unwrap();

        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["watcher"], "listing:hot");
        assert_eq!(value["event"], "item");
        assert_eq!(value["item"]["name"], "t3_abc");
    }

    #[test]
    fn anonymous_config_reads_public_origin() {
        let source = build_source(&config(None, vec![hot(5)]), reqwest::Client::new()).unwrap();
        assert_eq!(source.id(), "public");
    }

    #[test]
    fn account_config_reads_through_api() {
        let source = build_source(
            &config(Some(account(Some("pw"))), vec![hot(5)]),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(source.id(), "api");
    }

    #[test]
    fn unresolved_secret_is_rejected() {
        let result = build_source(
            &config(Some(account(None)), vec![hot(5)]),
            reqwest::Client::new(),
        );
        assert!(matches!(result, Err(Error::IncompleteAccount("password"))));
    }

    #[test]
    fn bad_origin_is_rejected() {
        let mut config = config(None, vec![hot(5)]);
        config.client.public_origin = Some("not a url".into());
        assert!(matches!(
            build_source(&config, reqwest::Client::new()),
            Err(Error::Client(_))
        ));
    }

    #[tokio::test]
    async fn stalled_response_fails_with_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(120)))
            .mount(&server)
            .await;

        let mut config = config(None, vec![hot(5)]);
        config.client.timeout_secs = 1;
        config.client.public_origin = Some(server.uri());
        let source = build_source(&config, build_http(&config).unwrap()).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            source.fetch_page("r/rust/new.json", None),
        )
        .await
        .expect("request outlived the configured timeout");
        assert!(matches!(
            result,
            Err(listing_client::Error::Transport { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn items_are_written_and_counted() {
        let page = vec![
            Item::new("t3_a", serde_json::json!({"name": "t3_a"})),
            Item::new("t3_b", serde_json::json!({"name": "t3_b"})),
        ];
        let source: Arc<dyn PageSource> = Arc::new(FixedSource(page));
        let metrics = WatchMetrics::new();
        let out = Arc::new(Mutex::new(Vec::<u8>::new()));

        let handles = start_watchers(
            &config(None, vec![hot(2)]),
            source,
            &metrics,
            out.clone(),
        )
        .unwrap();
        assert_eq!(metrics.running.load(Ordering::Relaxed), 1);

        // Second cycle sees the same page and emits nothing new
        tokio::time::sleep(Duration::from_secs(7)).await;
        for handle in handles {
            handle.close();
            handle.join().await.unwrap();
        }

        let written = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"t3_a\""));
        assert!(lines[1].contains("\"t3_b\""));
        assert_eq!(metrics.items_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.errors_total.load(Ordering::Relaxed), 0);
    }
}
