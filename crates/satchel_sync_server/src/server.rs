//! Request handlers for the backup service.

use crate::auth::TokenValidator;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use satchel_sync_protocol::{Ack, BackupRecord, MutationEnvelope};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// The reference backup server.
///
/// Holds one backup per user (newest client timestamp wins) and a feed
/// of pushed mutations for inspection. Mutation ingestion is idempotent
/// on the envelope's item id, so a client retrying an item it already
/// delivered gets a clean acknowledgement instead of a duplicate.
pub struct BackupServer {
    validator: Option<TokenValidator>,
    max_payload_bytes: Option<usize>,
    state: RwLock<ServerState>,
}

#[derive(Default)]
struct ServerState {
    /// Latest backup per user.
    backups: HashMap<String, BackupRecord>,
    /// Accepted mutations, in arrival order.
    mutations: Vec<MutationEnvelope>,
    /// Item ids already accepted.
    seen_items: HashSet<Uuid>,
}

impl BackupServer {
    /// Creates a server from its configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            validator: config.auth.map(TokenValidator::new),
            max_payload_bytes: config.max_payload_bytes,
            state: RwLock::new(ServerState::default()),
        }
    }

    /// Issues a token for a user, when auth is enabled.
    #[must_use]
    pub fn issue_token(&self, user_id: &str) -> Option<String> {
        self.validator.as_ref().map(|v| v.create_token(user_id))
    }

    /// Handles `PUT /backups`.
    ///
    /// Stores the record if it is newer than what is held for the user;
    /// an older record is acknowledged but dropped (last-writer-wins).
    pub fn handle_put_backup(
        &self,
        token: Option<&str>,
        record: BackupRecord,
    ) -> ServerResult<Ack> {
        self.authorize(token, &record.user_id)?;

        if record.user_id.is_empty() {
            return Err(ServerError::invalid_request("missing user id"));
        }
        if let Some(max) = self.max_payload_bytes {
            if record.encrypted_payload.len() > max {
                return Err(ServerError::invalid_request(format!(
                    "payload exceeds {max} bytes"
                )));
            }
        }

        let mut state = self.state.write();
        match state.backups.get(&record.user_id) {
            Some(existing) if existing.timestamp >= record.timestamp => {
                debug!(
                    user = %record.user_id,
                    held = existing.timestamp,
                    offered = record.timestamp,
                    "older backup dropped"
                );
            }
            _ => {
                info!(
                    user = %record.user_id,
                    device = %record.device_id,
                    records = record.record_count,
                    "backup stored"
                );
                state.backups.insert(record.user_id.clone(), record);
            }
        }

        Ok(Ack::success())
    }

    /// Handles `GET /backups/latest?userId=`.
    pub fn handle_latest_backup(
        &self,
        token: Option<&str>,
        user_id: &str,
    ) -> ServerResult<Option<BackupRecord>> {
        self.authorize(token, user_id)?;
        Ok(self.state.read().backups.get(user_id).cloned())
    }

    /// Handles `POST /mutations`.
    pub fn handle_push_item(
        &self,
        token: Option<&str>,
        envelope: MutationEnvelope,
    ) -> ServerResult<Ack> {
        self.authorize(token, &envelope.user_id)?;

        let mut state = self.state.write();
        if !state.seen_items.insert(envelope.item_id) {
            debug!(item = %envelope.item_id, "duplicate mutation absorbed");
            return Ok(Ack::success());
        }

        debug!(
            item = %envelope.item_id,
            user = %envelope.user_id,
            collection = %envelope.collection,
            "mutation accepted"
        );
        state.mutations.push(envelope);
        Ok(Ack::success())
    }

    /// Mutations accepted for a user, in arrival order.
    #[must_use]
    pub fn mutations_for(&self, user_id: &str) -> Vec<MutationEnvelope> {
        self.state
            .read()
            .mutations
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Total accepted mutations.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state.read().mutations.len()
    }

    /// Number of users with a stored backup.
    #[must_use]
    pub fn backup_count(&self) -> usize {
        self.state.read().backups.len()
    }

    fn authorize(&self, token: Option<&str>, user_id: &str) -> ServerResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let token =
            token.ok_or_else(|| ServerError::unauthorized("missing token"))?;
        validator.validate(token, user_id)
    }
}

impl std::fmt::Debug for BackupServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupServer")
            .field("backups", &self.backup_count())
            .field("mutations", &self.mutation_count())
            .finish()
    }
}
