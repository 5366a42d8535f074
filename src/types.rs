use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw page as returned by the fetcher.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub http_status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// One scraped item. Immutable once the parser hands it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub url: Option<String>,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

/// Records produced by a single run, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<Record>);

impl Batch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.0.iter()
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
}

/// Liveness payload, built fresh for every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: Status,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
}

/// Process-wide identifiers reported by the health endpoint.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub service: String,
    pub environment: String,
}

impl ServiceInfo {
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: Status::Ok,
            service: self.service.clone(),
            timestamp: Utc::now(),
            environment: self.environment.clone(),
        }
    }
}
