//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Issuer**: `IssuerProfile`, `WalletInfo`, `RegistryConnection`
//! - **Ledger metadata**: `SchemaRecord`, `SchemaDefinition`
//! - **Issuance**: `AttributeMap`

use serde::{Deserialize, Serialize};

/// Credential attribute values keyed by attribute name.
///
/// Values arrive as arbitrary JSON and are stringified when the credential
/// preview is built.
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// CLUSTER A: THE ISSUER
// =============================================================================

/// The issuer on whose behalf credentials are issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuerProfile {
    /// Display name of the issuer.
    #[serde(default)]
    pub name: String,
    /// Public DID of the issuer wallet.
    #[serde(default)]
    pub did: String,
    /// Sub-wallet credentials, if the issuer runs in a multitenant agent.
    #[serde(default)]
    pub wallet: Option<WalletInfo>,
    /// Connection to the credential registry that receives issued credentials.
    #[serde(default)]
    pub vcr: Option<RegistryConnection>,
    /// Schemas this issuer has published and may issue against.
    #[serde(default)]
    pub schemas: Vec<SchemaRecord>,
}

impl IssuerProfile {
    /// Find a known schema by exact name and version.
    pub fn find_schema(&self, name: &str, version: &str) -> Option<&SchemaRecord> {
        self.schemas
            .iter()
            .find(|schema| schema.schema_name == name && schema.schema_version == version)
    }

    /// Bearer token for the issuer's sub-wallet, if any.
    pub fn wallet_token(&self) -> Option<&str> {
        self.wallet
            .as_ref()
            .map(|w| w.token.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Connection id towards the credential registry, empty if unset.
    pub fn registry_connection_id(&self) -> &str {
        self.vcr
            .as_ref()
            .map(|v| v.connection_id.as_str())
            .unwrap_or_default()
    }
}

/// Multitenant sub-wallet identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    /// Wallet id assigned by the agent.
    #[serde(default)]
    pub wallet_id: String,
    /// Bearer token used on every agent call for this wallet.
    pub token: String,
}

/// Connection to the credential registry agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConnection {
    /// Connection id on the issuer's agent.
    pub connection_id: String,
}

// =============================================================================
// CLUSTER B: LEDGER METADATA
// =============================================================================

/// A schema the issuer has published, with its credential definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// Ledger schema id.
    pub schema_id: String,
    /// Schema name.
    pub schema_name: String,
    /// Schema version.
    pub schema_version: String,
    /// Credential definition bound to this schema, if already known.
    #[serde(default)]
    pub credential_definition_id: Option<String>,
    /// Attribute names declared by the schema.
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl SchemaRecord {
    /// Credential definition id, treating an empty string as absent.
    pub fn cred_def_id(&self) -> Option<&str> {
        self.credential_definition_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// Request body for publishing a new schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name.
    pub schema_name: String,
    /// Schema version.
    pub schema_version: String,
    /// Attribute names.
    pub attributes: Vec<String>,
}
