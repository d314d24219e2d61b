//! Call descriptors and the single/batch framing of a request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// One RPC request unit. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub action: String,
    pub method: String,
    /// Structured value or ordered argument list; `null` when absent.
    #[serde(default)]
    pub data: Value,
    /// Correlation token echoed back unchanged. Absent for upload submissions.
    #[serde(default, alias = "transactionId", skip_serializing_if = "Option::is_none")]
    pub tid: Option<Value>,
}

impl CallDescriptor {
    pub fn new(action: impl Into<String>, method: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            method: method.into(),
            data,
            tid: None,
        }
    }

    pub fn with_tid(mut self, tid: impl Into<Value>) -> Self {
        self.tid = Some(tid.into());
        self
    }
}

/// A batch entry: a decoded descriptor, or the reason the element could not be decoded.
pub type ParsedCall = Result<CallDescriptor, String>;

/// Request framing, normalized once at parse time.
#[derive(Clone, Debug, PartialEq)]
pub enum CallBatch {
    Single(ParsedCall),
    Many(Vec<ParsedCall>),
}

impl CallBatch {
    /// Array -> `Many` (each element decoded on its own), anything else -> `Single`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => CallBatch::Many(items.into_iter().map(parse_call).collect()),
            other => CallBatch::Single(parse_call(other)),
        }
    }

    pub fn from_slice(body: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_value(value))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, CallBatch::Many(_))
    }

    pub fn len(&self) -> usize {
        match self {
            CallBatch::Single(_) => 1,
            CallBatch::Many(calls) => calls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_calls(self) -> Vec<ParsedCall> {
        match self {
            CallBatch::Single(call) => vec![call],
            CallBatch::Many(calls) => calls,
        }
    }
}

impl From<CallDescriptor> for CallBatch {
    fn from(call: CallDescriptor) -> Self {
        CallBatch::Single(Ok(call))
    }
}

impl From<Vec<CallDescriptor>> for CallBatch {
    fn from(calls: Vec<CallDescriptor>) -> Self {
        CallBatch::Many(calls.into_iter().map(Ok).collect())
    }
}

fn parse_call(value: Value) -> ParsedCall {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_is_single() {
        let batch = CallBatch::from_slice(
            br#"{"action":"Order","method":"readOrder","data":[{"filter":[]}],"type":"rpc","tid":3}"#,
        )
        .unwrap();
        assert!(!batch.is_batch());
        let calls = batch.into_calls();
        let call = calls[0].as_ref().unwrap();
        assert_eq!(call.action, "Order");
        assert_eq!(call.tid, Some(json!(3)));
    }

    #[test]
    fn array_of_one_is_still_a_batch() {
        let batch =
            CallBatch::from_slice(br#"[{"action":"A","method":"m","data":null,"tid":1}]"#).unwrap();
        assert!(batch.is_batch());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn malformed_element_does_not_poison_siblings() {
        let batch = CallBatch::from_value(json!([
            {"action": "A", "method": "m", "tid": 1},
            42,
            {"method": "m"}
        ]));
        let calls = batch.into_calls();
        assert!(calls[0].is_ok());
        assert!(calls[1].is_err());
        assert!(calls[2].is_err());
    }

    #[test]
    fn transaction_id_alias_and_missing_data() {
        let batch = CallBatch::from_value(json!({"action": "A", "method": "m", "transactionId": "t-9"}));
        let call = batch.into_calls().remove(0).unwrap();
        assert_eq!(call.tid, Some(json!("t-9")));
        assert_eq!(call.data, Value::Null);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(CallBatch::from_slice(b"{nope"), Err(CoreError::Json(_))));
    }
}
