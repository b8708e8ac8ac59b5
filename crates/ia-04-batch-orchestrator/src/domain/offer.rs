//! Credential offer in the agent's issue-credential 2.0 format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{AttributeMap, IssuerProfile, SchemaRecord};

/// Message type of an issue-credential 2.0 credential preview.
pub const CREDENTIAL_PREVIEW_TYPE: &str =
    "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/issue-credential/2.0/credential-preview";

/// MIME type attached to every attribute.
pub const ATTRIBUTE_MIME_TYPE: &str = "text/plain";

/// Body of a send-offer request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub connection_id: String,
    pub credential_preview: CredentialPreview,
    pub filter: OfferFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPreview {
    #[serde(rename = "@type")]
    pub preview_type: String,
    pub attributes: Vec<PreviewAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewAttribute {
    pub name: String,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferFilter {
    pub indy: IndyFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndyFilter {
    pub issuer_did: String,
    pub schema_issuer_did: String,
    pub schema_id: String,
    pub schema_name: String,
    pub schema_version: String,
    pub cred_def_id: String,
}

/// Render an attribute value as the string the agent expects.
///
/// Strings pass through, numbers and booleans use their JSON text, and
/// arrays or objects are sent as compact JSON. `null` has no sensible
/// rendering and is refused.
pub fn stringify_attribute(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}

/// Build the offer for `attributes` against `schema`.
///
/// Fails with the name of the first attribute whose value cannot be
/// rendered.
pub fn format_offer(
    profile: &IssuerProfile,
    schema: &SchemaRecord,
    cred_def_id: &str,
    attributes: &AttributeMap,
) -> Result<CredentialOffer, String> {
    let attributes = attributes
        .iter()
        .map(|(name, value)| {
            stringify_attribute(value)
                .map(|value| PreviewAttribute {
                    name: name.clone(),
                    mime_type: ATTRIBUTE_MIME_TYPE.to_string(),
                    value,
                })
                .ok_or_else(|| name.clone())
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CredentialOffer {
        connection_id: profile.registry_connection_id().to_string(),
        credential_preview: CredentialPreview {
            preview_type: CREDENTIAL_PREVIEW_TYPE.to_string(),
            attributes,
        },
        filter: OfferFilter {
            indy: IndyFilter {
                issuer_did: profile.did.clone(),
                schema_issuer_did: profile.did.clone(),
                schema_id: schema.schema_id.clone(),
                schema_name: schema.schema_name.clone(),
                schema_version: schema.schema_version.clone(),
                cred_def_id: cred_def_id.to_string(),
            },
        },
    })
}
