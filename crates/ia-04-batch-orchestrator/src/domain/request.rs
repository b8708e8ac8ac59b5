//! Issuance requests as received from callers.

use crate::error::OrchestratorError;
use serde::Deserialize;
use serde_json::Value;
use shared_types::AttributeMap;

/// One credential to issue.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceRequest {
    /// Position in the caller's input.
    pub order: usize,
    pub schema_name: String,
    pub schema_version: String,
    pub attributes: AttributeMap,
}

/// An input element that could not be read as a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRequest {
    pub order: usize,
    pub reason: String,
}

/// Wire form of a request. `metadata` is accepted and ignored.
#[derive(Debug, Deserialize)]
struct RequestBody {
    schema_name: String,
    schema_version: String,
    attributes: AttributeMap,
    #[serde(default)]
    #[allow(dead_code)]
    metadata: Option<Value>,
}

impl IssuanceRequest {
    /// Read the element at `order`.
    pub fn from_value(order: usize, value: Value) -> Result<Self, RejectedRequest> {
        let body: RequestBody = serde_json::from_value(value).map_err(|e| RejectedRequest {
            order,
            reason: format!("invalid issuance request: {e}"),
        })?;
        Ok(Self {
            order,
            schema_name: body.schema_name,
            schema_version: body.schema_version,
            attributes: body.attributes,
        })
    }
}

/// Parsed element: a request, or the reason it was rejected.
pub type RequestItem = Result<IssuanceRequest, RejectedRequest>;

/// Caller input: one request or an ordered batch.
#[derive(Debug, Clone, PartialEq)]
pub enum IssuanceInput {
    Single(RequestItem),
    Batch(Vec<RequestItem>),
}

impl IssuanceInput {
    /// Accept a JSON object (single) or array (batch).
    ///
    /// Elements that are objects but not valid requests are kept as
    /// rejections so they fail individually. Anything that is neither an
    /// object nor an array is malformed input.
    pub fn from_json(value: Value) -> Result<Self, OrchestratorError> {
        match value {
            Value::Object(_) => Ok(Self::Single(IssuanceRequest::from_value(0, value))),
            Value::Array(items) => Ok(Self::Batch(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(order, item)| IssuanceRequest::from_value(order, item))
                    .collect(),
            )),
            other => Err(OrchestratorError::MalformedInput(format!(
                "expected an object or an array, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
