use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local};
use futures::future;

use crate::api::{self, Fetcher};
use crate::config::Source;
use crate::error::Result;
use crate::models::StationRecord;
use crate::storage::Storage;

/// Polls every configured source and stores one batch per cycle.
///
/// A cycle is all-or-nothing: stations are saved only when every city was
/// fetched and adapted, and all of them carry the same collection time.
pub struct CollectionRunner<F: Fetcher, S: Storage> {
    fetcher: F,
    storage: S,
    sources: Vec<Source>,
    sleep_interval: Option<Duration>,
}

impl<F: Fetcher, S: Storage> CollectionRunner<F, S> {
    pub fn new(fetcher: F, storage: S, sources: Vec<Source>, sleep_interval: Option<Duration>) -> Self {
        Self {
            fetcher,
            storage,
            sources,
            sleep_interval,
        }
    }

    /// Runs one cycle, or keeps cycling until `shutdown` resolves when a
    /// sleep interval is configured.
    ///
    /// In repeating mode a failed cycle is logged and the next one starts
    /// after the usual sleep. `shutdown` is only observed between cycles.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Some(interval) = self.sleep_interval else {
            return self.run_cycle().await.map(|_| ());
        };

        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.run_cycle().await {
                log::error!("collection cycle failed: {}", e);
            }

            log::debug!("sleeping for {:?}", interval);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    log::info!("shutdown requested, stopping collector");
                    return Ok(());
                }
            }
        }
    }

    /// Fetches every source and saves the batch. Returns the number of
    /// stored stations.
    pub async fn run_cycle(&self) -> Result<usize> {
        let collected_at: DateTime<FixedOffset> = Local::now().into();
        log::info!("starting collection cycle at {}", collected_at);

        let batch = self.collect(collected_at).await?;

        self.storage.save(&batch).await?;
        log::info!("stored {} stations", batch.len());

        Ok(batch.len())
    }

    async fn collect(&self, collected_at: DateTime<FixedOffset>) -> Result<Vec<StationRecord>> {
        let mut batch = vec![];

        for source in &self.sources {
            log::info!("Collecting updated data for city [{}].", source.city);

            let raw = self
                .fetcher
                .fetch(&source.url)
                .await
                .map_err(|e| e.in_city(&source.city, "fetch"))?;

            let stations = raw
                .iter()
                .map(|station| api::adapt(station, collected_at, &source.city))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.in_city(&source.city, "adapt"))?;

            log::debug!("city [{}]: {} stations", source.city, stations.len());
            batch.extend(stations);
        }

        Ok(batch)
    }
}

/// Resolves once `signal` fires. A signal listener that could not be
/// installed never resolves, so a repeating collector keeps running.
pub async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        log::error!("can't listen for shutdown signal: {}", e);
        future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::future::{self, BoxFuture};
    use serde_json::json;
    use tempfile::TempDir;

    use super::{shutdown_on, CollectionRunner};
    use crate::api::{Fetcher, HttpFetcher, RawStation};
    use crate::config::Source;
    use crate::error::{Error, Result};
    use crate::models::StationRecord;
    use crate::storage::{File, Storage};

    /// Serves canned payloads per URL; unknown URLs fail like a bad body.
    #[derive(Default)]
    struct Canned {
        payloads: HashMap<String, Vec<RawStation>>,
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Canned {
        fn with(mut self, url: &str, payload: Vec<RawStation>) -> Self {
            self.payloads.insert(url.to_string(), payload);
            self
        }
    }

    impl Fetcher for Canned {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<RawStation>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);

            Box::pin(async move {
                if call < self.fail_first {
                    return Err(Error::MalformedPayload("flaky".into()));
                }

                self.payloads
                    .get(url)
                    .cloned()
                    .ok_or_else(|| Error::MalformedPayload(format!("no payload for {}", url)))
            })
        }
    }

    /// Keeps every saved batch.
    #[derive(Default)]
    struct Batches(Mutex<Vec<Vec<StationRecord>>>);

    impl Batches {
        fn saved(&self) -> Vec<Vec<StationRecord>> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Storage for Batches {
        fn initialize(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }

        fn save<'a>(&'a self, records: &'a [StationRecord]) -> BoxFuture<'a, Result<()>> {
            self.0.lock().unwrap().push(records.to_vec());
            Box::pin(async { Ok(()) })
        }

        fn list(&self) -> BoxFuture<'_, Result<Vec<StationRecord>>> {
            let all = self.saved().concat();
            Box::pin(async move { Ok(all) })
        }
    }

    fn station(id: &str) -> RawStation {
        json!({
            "id": id,
            "name": format!("Station {}", id),
            "address": "Via Roma 1",
            "bikes": 2,
            "slots": 8,
            "totalSlots": 10,
            "position": [46.07, 11.12]
        })
    }

    fn sources() -> Vec<Source> {
        vec![
            Source::new("trento", "http://t"),
            Source::new("rovereto", "http://r"),
        ]
    }

    fn both_cities() -> Canned {
        Canned::default()
            .with("http://t", vec![station("1"), station("2")])
            .with("http://r", vec![station("3")])
    }

    #[tokio::test]
    async fn one_cycle_one_save() {
        let runner = CollectionRunner::new(both_cities(), Batches::default(), sources(), None);

        runner.run(future::pending()).await.unwrap();

        let saved = runner.storage.saved();
        assert_eq!(saved.len(), 1);

        let batch = &saved[0];
        let ids: Vec<_> = batch.iter().map(|r| r.station_id.as_str()).collect();
        let cities: Vec<_> = batch.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(cities, vec!["trento", "trento", "rovereto"]);
        assert!(batch.iter().all(|r| r.timestamp == batch[0].timestamp));
    }

    #[tokio::test]
    async fn failed_city_saves_nothing() {
        let fetcher = Canned::default().with("http://t", vec![station("1")]);
        let runner = CollectionRunner::new(fetcher, Batches::default(), sources(), None);

        let err = runner.run_cycle().await.unwrap_err();

        match &err {
            Error::City { city, op, .. } => {
                assert_eq!(city, "rovereto");
                assert_eq!(*op, "fetch");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(runner.storage.saved().is_empty());
    }

    #[tokio::test]
    async fn malformed_station_saves_nothing() {
        let mut broken = station("3");
        broken.as_object_mut().unwrap().remove("bikes");

        let fetcher = Canned::default()
            .with("http://t", vec![station("1")])
            .with("http://r", vec![broken]);
        let runner = CollectionRunner::new(fetcher, Batches::default(), sources(), None);

        let err = runner.run(future::pending()).await.unwrap_err();

        assert!(err.to_string().contains("bikes"), "{}", err);
        assert!(matches!(err, Error::City { op: "adapt", .. }));
        assert!(runner.storage.saved().is_empty());
    }

    #[tokio::test]
    async fn unreachable_city_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let file = File::new(dir.path().join("stations.json"));
        file.initialize().await.unwrap();

        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let sources = vec![Source::new("trento", &format!("http://{}/trento", addr))];
        let runner = CollectionRunner::new(HttpFetcher::new().unwrap(), file, sources, None);

        let err = runner.run_cycle().await.unwrap_err();

        assert!(matches!(&err, Error::City { source, .. } if matches!(**source, Error::Fetch { .. })));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("stations.json")).unwrap(),
            "[]"
        );
    }

    #[tokio::test]
    async fn cycles_append_to_file() {
        let dir = TempDir::new().unwrap();
        let file = File::new(dir.path().join("stations.json"));
        file.initialize().await.unwrap();

        let runner = CollectionRunner::new(both_cities(), file, sources(), None);

        assert_eq!(runner.run_cycle().await.unwrap(), 3);
        assert_eq!(runner.run_cycle().await.unwrap(), 3);

        let stored = runner.storage.list().await.unwrap();
        assert_eq!(stored.len(), 6);
        assert_eq!(stored[0].station_id, stored[3].station_id);
        assert!(stored[0].timestamp <= stored[3].timestamp);
    }

    #[tokio::test]
    async fn repeating_mode_survives_failed_cycle() {
        let fetcher = Canned {
            fail_first: 1,
            ..both_cities()
        };
        let runner = CollectionRunner::new(
            fetcher,
            Batches::default(),
            sources(),
            Some(Duration::from_millis(5)),
        );

        let two_saves = async {
            while runner.storage.saved().len() < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };

        tokio::time::timeout(Duration::from_secs(10), runner.run(two_saves))
            .await
            .expect("collector did not stop")
            .unwrap();

        let saved = runner.storage.saved();
        assert!(saved.len() >= 2);
        assert!(saved.iter().all(|batch| batch.len() == 3));
        assert_ne!(saved[0][0].timestamp, saved[1][0].timestamp);
    }

    #[tokio::test]
    async fn shutdown_after_signal() {
        tokio::time::timeout(Duration::from_secs(1), shutdown_on(async { Ok(()) }))
            .await
            .expect("shutdown did not resolve");
    }

    #[tokio::test]
    async fn broken_signal_never_stops_the_collector() {
        let broken = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no handler")) };

        assert!(
            tokio::time::timeout(Duration::from_millis(50), shutdown_on(broken))
                .await
                .is_err()
        );

        let runner = CollectionRunner::new(
            both_cities(),
            Batches::default(),
            sources(),
            Some(Duration::from_millis(5)),
        );
        let broken = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no handler")) };

        let stopped =
            tokio::time::timeout(Duration::from_millis(200), runner.run(shutdown_on(broken))).await;

        assert!(stopped.is_err(), "collector stopped without a signal");
        assert!(runner.storage.saved().len() >= 2);
    }
}
