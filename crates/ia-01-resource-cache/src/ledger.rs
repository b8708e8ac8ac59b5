//! # Ledger Resources
//!
//! Find-or-create for schemas and credential definitions, backed by one
//! [`ResourceCache`]. Ledger writes are slow and must not be duplicated, so
//! concurrent requests for the same resource share one lookup and at most one
//! write.

use crate::cache::{CacheStatsSnapshot, ResourceCache};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{SchemaDefinition, SchemaRecord};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Identity of a ledger resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// Credential definition of a schema, keyed by schema id.
    SchemaId(String),
    /// Schema, keyed by name and version.
    NameVersion { name: String, version: String },
}

impl CacheKey {
    pub fn schema_id(id: impl Into<String>) -> Self {
        Self::SchemaId(id.into())
    }

    pub fn name_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NameVersion {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaId(id) => write!(f, "schema:{id}"),
            Self::NameVersion { name, version } => write!(f, "{name}:{version}"),
        }
    }
}

/// Failure reported by the ledger author.
///
/// Keeps the upstream status and body so callers can surface them.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct LedgerError {
    pub operation: &'static str,
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<serde_json::Value>,
}

impl LedgerError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            status: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_response(mut self, status: u16, body: Option<serde_json::Value>) -> Self {
        self.status = Some(status);
        self.body = body;
        self
    }
}

/// Outbound port: the agent endpoints that read and write the ledger.
#[async_trait]
pub trait LedgerAuthor: Send + Sync {
    /// Id of a schema this issuer already published, if any.
    async fn find_schema(&self, name: &str, version: &str) -> Result<Option<String>, LedgerError>;

    /// Publish a schema and return its id.
    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, LedgerError>;

    /// Id of this issuer's credential definition for a schema, if any.
    async fn find_credential_definition(
        &self,
        schema_id: &str,
    ) -> Result<Option<String>, LedgerError>;

    /// Publish a credential definition and return its id.
    async fn create_credential_definition(
        &self,
        schema_id: &str,
        tag: &str,
        support_revocation: bool,
    ) -> Result<String, LedgerError>;
}

/// Cached find-or-create over a [`LedgerAuthor`].
pub struct LedgerResources<A: LedgerAuthor> {
    author: Arc<A>,
    cache: ResourceCache<CacheKey, String, LedgerError>,
    tag: String,
    support_revocation: bool,
}

impl<A: LedgerAuthor> LedgerResources<A> {
    /// Default credential definition tag.
    pub const DEFAULT_TAG: &'static str = "default";

    pub fn new(author: Arc<A>) -> Self {
        Self::with_options(author, Self::DEFAULT_TAG, false)
    }

    /// Tag and revocation support used when a credential definition has to
    /// be created.
    pub fn with_options(author: Arc<A>, tag: impl Into<String>, support_revocation: bool) -> Self {
        Self {
            author,
            cache: ResourceCache::new(),
            tag: tag.into(),
            support_revocation,
        }
    }

    /// Record ids an issuer profile already carries so they are never looked
    /// up or recreated.
    pub fn seed_from_profile(&self, schemas: &[SchemaRecord]) {
        for record in schemas {
            self.cache.insert(
                CacheKey::name_version(&record.schema_name, &record.schema_version),
                record.schema_id.clone(),
            );
            if let Some(cred_def_id) = record.cred_def_id() {
                self.cache.insert(
                    CacheKey::schema_id(&record.schema_id),
                    cred_def_id.to_string(),
                );
            }
        }
    }

    /// Schema id for `definition`, publishing the schema if it does not exist.
    pub async fn ensure_schema(&self, definition: &SchemaDefinition) -> Result<String, LedgerError> {
        let key = CacheKey::name_version(&definition.schema_name, &definition.schema_version);
        self.cache
            .get_or_create(key, || async {
                if let Some(id) = self
                    .author
                    .find_schema(&definition.schema_name, &definition.schema_version)
                    .await?
                {
                    return Ok(id);
                }
                let id = self.author.create_schema(definition).await?;
                info!(
                    schema_name = %definition.schema_name,
                    schema_version = %definition.schema_version,
                    schema_id = %id,
                    "Schema published"
                );
                Ok(id)
            })
            .await
    }

    /// Credential definition id for `schema_id`, publishing one if none
    /// exists.
    pub async fn ensure_credential_definition(&self, schema_id: &str) -> Result<String, LedgerError> {
        self.cache
            .get_or_create(CacheKey::schema_id(schema_id), || async {
                if let Some(id) = self.author.find_credential_definition(schema_id).await? {
                    return Ok(id);
                }
                let id = self
                    .author
                    .create_credential_definition(schema_id, &self.tag, self.support_revocation)
                    .await?;
                info!(schema_id = %schema_id, cred_def_id = %id, "Credential definition published");
                Ok(id)
            })
            .await
    }

    /// Cached credential definition id, without touching the ledger.
    pub fn cached_credential_definition(&self, schema_id: &str) -> Option<String> {
        self.cache.get(&CacheKey::schema_id(schema_id))
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }
}
