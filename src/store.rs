use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::RemoteConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::{Batch, Record};

/// Network-backed target. Takes one record per call, so a batch can land partially.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    async fn insert(&self, record: &Record) -> StoreResult<()>;
}

/// PostgREST-style table endpoint (`{endpoint}/rest/v1/{table}`).
pub struct RestStore {
    http: Client,
    insert_url: String,
    key: String,
}

impl RestStore {
    pub fn new(http: Client, cfg: &RemoteConfig) -> Self {
        let base = cfg.endpoint.as_str().trim_end_matches('/');
        Self {
            http,
            insert_url: format!("{base}/rest/v1/{}", cfg.table),
            key: cfg.key.clone(),
        }
    }
}

#[async_trait]
impl RemoteTarget for RestStore {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        let res = self
            .http
            .post(&self.insert_url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

const MAX_SAME_SECOND: usize = 100;

/// File-backed target. One JSON file per batch, written whole or not at all.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the data directory if it is missing.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn file_name(at: DateTime<Utc>) -> String {
        format!("{}.json", Self::stem(at))
    }

    fn stem(at: DateTime<Utc>) -> String {
        format!("scraped_data_{}", at.format("%Y%m%d_%H%M%S"))
    }

    /// Writes to a sibling temp file, then links it into place. An existing
    /// file for the same second is never replaced; the new one gets a suffix.
    pub fn write_batch(&self, batch: &Batch, at: DateTime<Utc>) -> StoreResult<PathBuf> {
        let path = self.dir.join(Self::file_name(at));
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(batch)?;

        let write = || -> std::io::Result<PathBuf> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&json)?;
            f.sync_all()?;
            self.publish(&tmp, at)
        };
        let result = write();
        let _ = fs::remove_file(&tmp);
        result.map_err(|source| StoreError::LocalWrite { path, source })
    }

    fn publish(&self, tmp: &Path, at: DateTime<Utc>) -> std::io::Result<PathBuf> {
        let stem = Self::stem(at);
        for n in 0..MAX_SAME_SECOND {
            let candidate = match n {
                0 => self.dir.join(format!("{stem}.json")),
                n => self.dir.join(format!("{stem}_{n}.json")),
            };
            match fs::hard_link(tmp, &candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{MAX_SAME_SECOND} batch files already exist for {stem}"),
        ))
    }
}

/// Result of one remote insert attempt.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    InsertFailed { index: usize, error: StoreError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoRemote,
    /// `inserted` rows before `index` stay in the remote store.
    InsertFailed { index: usize, inserted: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    Remote { inserted: usize },
    Local {
        path: PathBuf,
        records: usize,
        reason: FallbackReason,
    },
}

pub struct PersistenceManager {
    remote: Option<Arc<dyn RemoteTarget>>,
    local: LocalStore,
}

impl PersistenceManager {
    pub fn new(remote: Option<Arc<dyn RemoteTarget>>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    /// Remote first, one record at a time; the first failed insert aborts the
    /// remote branch and the whole batch goes to a single local file.
    pub async fn persist(&self, batch: Batch) -> StoreResult<Persisted> {
        let reason = match &self.remote {
            None => FallbackReason::NoRemote,
            Some(remote) => match insert_all(remote.as_ref(), &batch).await {
                Ok(inserted) => {
                    info!(inserted, "batch stored remotely");
                    return Ok(Persisted::Remote { inserted });
                }
                Err((index, error)) => {
                    warn!(
                        index,
                        inserted = index,
                        total = batch.len(),
                        error = %error,
                        "remote insert failed, falling back to local storage"
                    );
                    FallbackReason::InsertFailed {
                        index,
                        inserted: index,
                    }
                }
            },
        };

        let path = self.local.write_batch(&batch, Utc::now())?;
        info!(path = %path.display(), records = batch.len(), "batch stored locally");
        Ok(Persisted::Local {
            path,
            records: batch.len(),
            reason,
        })
    }
}

async fn insert_one(remote: &dyn RemoteTarget, index: usize, record: &Record) -> InsertOutcome {
    match remote.insert(record).await {
        Ok(()) => InsertOutcome::Inserted,
        Err(error) => InsertOutcome::InsertFailed { index, error },
    }
}

/// Returns the insert count, or the index and error of the first failure.
async fn insert_all(
    remote: &dyn RemoteTarget,
    batch: &Batch,
) -> Result<usize, (usize, StoreError)> {
    for (index, record) in batch.iter().enumerate() {
        match insert_one(remote, index, record).await {
            InsertOutcome::Inserted => {}
            InsertOutcome::InsertFailed { index, error } => return Err((index, error)),
        }
    }
    Ok(batch.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every attempt; fails the attempt at `fail_at`.
    #[derive(Default)]
    pub(crate) struct FakeRemote {
        pub fail_at: Option<usize>,
        pub attempts: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl RemoteTarget for FakeRemote {
        async fn insert(&self, record: &Record) -> StoreResult<()> {
            let mut attempts = self.attempts.lock().unwrap();
            let ok = self.fail_at != Some(attempts.len());
            attempts.push((record.title.clone(), ok));
            if ok {
                Ok(())
            } else {
                Err(StoreError::Rejected {
                    status: 500,
                    body: "boom".into(),
                })
            }
        }
    }

    pub(crate) fn batch(titles: &[&str]) -> Batch {
        titles
            .iter()
            .map(|t| Record {
                title: t.to_string(),
                url: None,
                source: "https://news.example.com/".into(),
                scraped_at: Utc::now(),
            })
            .collect()
    }

    pub(crate) fn local_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    fn read_batch(path: &Path) -> Vec<Record> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn remote_success_writes_nothing_locally() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let pm = PersistenceManager::new(Some(remote.clone()), LocalStore::new(dir.path()));

        let out = pm.persist(batch(&["a", "b", "c"])).await.unwrap();
        assert_eq!(out, Persisted::Remote { inserted: 3 });
        assert_eq!(remote.attempts.lock().unwrap().len(), 3);
        assert!(local_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failure_on_second_insert_falls_back_with_full_batch() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(FakeRemote {
            fail_at: Some(1),
            ..Default::default()
        });
        let pm = PersistenceManager::new(Some(remote.clone()), LocalStore::new(dir.path()));

        let out = pm.persist(batch(&["a", "b", "c"])).await.unwrap();

        let attempts = remote.attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec![("a".to_string(), true), ("b".to_string(), false)]);

        let Persisted::Local { path, records, reason } = out else {
            panic!("expected local fallback, got {out:?}");
        };
        assert_eq!(records, 3);
        assert_eq!(reason, FallbackReason::InsertFailed { index: 1, inserted: 1 });

        let files = local_files(dir.path());
        assert_eq!(files, vec![path.clone()]);
        let titles: Vec<_> = read_batch(&path).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn missing_remote_goes_straight_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let pm = PersistenceManager::new(None, LocalStore::new(dir.path()));

        let out = pm.persist(batch(&["only"])).await.unwrap();
        let Persisted::Local { path, reason, .. } = out else {
            panic!("expected local fallback");
        };
        assert_eq!(reason, FallbackReason::NoRemote);
        assert_eq!(read_batch(&path).len(), 1);
    }

    #[tokio::test]
    async fn local_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created");
        let pm = PersistenceManager::new(None, LocalStore::new(&missing));

        let err = pm.persist(batch(&["x"])).await.unwrap_err();
        assert!(matches!(err, StoreError::LocalWrite { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn file_name_has_second_granularity() {
        let at = DateTime::parse_from_rfc3339("2024-03-09T07:05:03.750Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(LocalStore::file_name(at), "scraped_data_20240309_070503.json");
    }

    #[test]
    fn same_second_batches_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let at = Utc::now();

        let first = store.write_batch(&batch(&["a"]), at).unwrap();
        let second = store.write_batch(&batch(&["b", "c"]), at).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.file_name().unwrap().to_str().unwrap(), LocalStore::file_name(at));
        assert!(second.to_str().unwrap().ends_with("_1.json"));
        assert_eq!(read_batch(&first).len(), 1);
        assert_eq!(read_batch(&second).len(), 2);
        assert_eq!(local_files(dir.path()).len(), 2);
    }

    #[test]
    fn local_file_is_a_json_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let path = store.write_batch(&batch(&["a", "b"]), Utc::now()).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        for rec in arr {
            for field in ["title", "url", "source", "scraped_at"] {
                assert!(rec.get(field).is_some(), "missing {field}");
            }
        }
        assert_eq!(local_files(dir.path()), vec![path]);
    }

    #[tokio::test]
    async fn rest_store_posts_with_bearer_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/headlines"))
            .and(header("apikey", "secret"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({ "title": "a" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = RemoteConfig {
            endpoint: server.uri().parse().unwrap(),
            key: "secret".into(),
            table: "headlines".into(),
        };
        let store = RestStore::new(Client::new(), &cfg);
        let rec = batch(&["a"]).iter().next().cloned().unwrap();
        store.insert(&rec).await.unwrap();
    }

    #[tokio::test]
    async fn rest_store_surfaces_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
            .mount(&server)
            .await;

        let cfg = RemoteConfig {
            endpoint: server.uri().parse().unwrap(),
            key: "secret".into(),
            table: "scraped_data".into(),
        };
        let store = RestStore::new(Client::new(), &cfg);
        let rec = batch(&["a"]).iter().next().cloned().unwrap();
        let err = store.insert(&rec).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected { status: 409, ref body } if body == "duplicate"
        ));
    }
}
