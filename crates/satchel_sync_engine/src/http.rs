//! HTTP transport for the remote backup service.
//!
//! The actual HTTP client is abstracted behind a trait so any library
//! (reqwest, ureq, hyper) or platform fetch API can be plugged in. The
//! wire format is JSON, matching the abstract service contract:
//!
//! - `PUT  /backups` - store a backup record
//! - `GET  /backups/latest?userId=` - newest backup or 404
//! - `POST /mutations` - push one mutation envelope

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteBackup;
use satchel_sync_protocol::{Ack, BackupRecord, MutationEnvelope};

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True for 2xx status codes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations must apply the configured request timeout to every
/// call and return `Err` with a description on network failure or
/// expiry.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;

    /// Sends a PUT request with a JSON body.
    fn put(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Sends a POST request with a JSON body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;
}

/// [`RemoteBackup`] over HTTP with JSON bodies.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote rooted at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn interpret_ack(response: &HttpResponse) -> SyncResult<()> {
        if response.is_success() {
            return Ok(());
        }
        match response.status {
            401 | 403 => Err(SyncError::NotAuthenticated),
            408 => Err(SyncError::Timeout),
            _ => {
                let detail = serde_json::from_slice::<Ack>(&response.body)
                    .ok()
                    .and_then(|a| a.error)
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                Err(SyncError::transport_retryable(detail))
            }
        }
    }
}

impl<C: HttpClient> RemoteBackup for HttpRemote<C> {
    fn push_item(&self, envelope: &MutationEnvelope) -> SyncResult<()> {
        let body = serde_json::to_vec(envelope)
            .map_err(|e| SyncError::Protocol(format!("cannot encode envelope: {e}")))?;
        let url = format!("{}/mutations", self.base_url);
        let response = self
            .client
            .post(&url, body)
            .map_err(SyncError::transport_retryable)?;
        Self::interpret_ack(&response)
    }

    fn put_backup(&self, record: &BackupRecord) -> SyncResult<()> {
        let body = serde_json::to_vec(record)
            .map_err(|e| SyncError::Protocol(format!("cannot encode backup: {e}")))?;
        let url = format!("{}/backups", self.base_url);
        let response = self
            .client
            .put(&url, body)
            .map_err(SyncError::transport_retryable)?;
        Self::interpret_ack(&response)
    }

    fn latest_backup(&self, user_id: &str) -> SyncResult<Option<BackupRecord>> {
        let url = format!("{}/backups/latest?userId={user_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .map_err(SyncError::transport_retryable)?;

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Self::interpret_ack(&response).map(|_| None);
        }

        let record = serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("cannot decode backup: {e}")))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use satchel_sync_protocol::QueueOp;
    use uuid::Uuid;

    /// Scripted client capturing requests and replaying canned responses.
    #[derive(Default)]
    struct ScriptedClient {
        requests: Mutex<Vec<(String, String)>>,
        responses: Mutex<Vec<HttpResponse>>,
    }

    impl ScriptedClient {
        fn push_response(&self, status: u16, body: &[u8]) {
            self.responses.lock().push(HttpResponse {
                status,
                body: body.to_vec(),
            });
        }

        fn next_response(&self) -> Result<HttpResponse, String> {
            self.responses
                .lock()
                .pop()
                .ok_or_else(|| "connection refused".to_string())
        }

        fn record(&self, method: &str, url: &str) {
            self.requests.lock().push((method.into(), url.into()));
        }
    }

    impl HttpClient for ScriptedClient {
        fn get(&self, url: &str) -> Result<HttpResponse, String> {
            self.record("GET", url);
            self.next_response()
        }

        fn put(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            self.record("PUT", url);
            self.next_response()
        }

        fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            self.record("POST", url);
            self.next_response()
        }
    }

    fn backup_record() -> BackupRecord {
        BackupRecord {
            device_id: "dev-1".into(),
            user_id: "alice".into(),
            timestamp: 5,
            schema_version: 1,
            record_count: 2,
            checksum: "ab".into(),
            encrypted_payload: vec![1, 2],
        }
    }

    #[test]
    fn put_backup_hits_backups_endpoint() {
        let client = ScriptedClient::default();
        client.push_response(200, b"");
        let remote = HttpRemote::new("https://backup.example.com", client);

        remote.put_backup(&backup_record()).unwrap();

        let requests = remote.client.requests.lock();
        assert_eq!(
            requests[0],
            ("PUT".to_string(), "https://backup.example.com/backups".to_string())
        );
    }

    #[test]
    fn latest_backup_404_is_none() {
        let client = ScriptedClient::default();
        client.push_response(404, b"");
        let remote = HttpRemote::new("https://backup.example.com", client);

        assert!(remote.latest_backup("alice").unwrap().is_none());

        let requests = remote.client.requests.lock();
        assert!(requests[0].1.ends_with("/backups/latest?userId=alice"));
    }

    #[test]
    fn latest_backup_parses_body() {
        let record = backup_record();
        let client = ScriptedClient::default();
        client.push_response(200, &serde_json::to_vec(&record).unwrap());
        let remote = HttpRemote::new("https://backup.example.com", client);

        let fetched = remote.latest_backup("alice").unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn auth_failure_is_not_retryable() {
        let client = ScriptedClient::default();
        client.push_response(401, b"");
        let remote = HttpRemote::new("https://backup.example.com", client);

        let err = remote.put_backup(&backup_record()).unwrap_err();
        assert!(matches!(err, SyncError::NotAuthenticated));
    }

    #[test]
    fn server_error_is_retryable() {
        let client = ScriptedClient::default();
        client.push_response(500, &serde_json::to_vec(&Ack::error("overloaded")).unwrap());
        let remote = HttpRemote::new("https://backup.example.com", client);

        let err = remote.put_backup(&backup_record()).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn network_failure_is_retryable() {
        let remote = HttpRemote::new("https://backup.example.com", ScriptedClient::default());

        let envelope = MutationEnvelope {
            item_id: Uuid::new_v4(),
            device_id: "dev-1".into(),
            user_id: "alice".into(),
            op: QueueOp::Create,
            collection: "tasks".into(),
            record_id: "t1".into(),
            encrypted_payload: None,
            timestamp_ms: 0,
        };
        let err = remote.push_item(&envelope).unwrap_err();
        assert!(err.is_retryable());
    }
}
