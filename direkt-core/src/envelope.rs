//! Response envelopes and reply framing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::CallDescriptor;
use crate::CoreError;

/// Outcome of one call, discriminated by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Rpc {
        tid: Option<Value>,
        action: String,
        method: String,
        result: Value,
    },
    Exception {
        tid: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        message: String,
        /// Diagnostic trace; omitted when debug output is off.
        #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
        /// Numeric code of a canonical error, kept for diagnostics.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
}

impl ResponseEnvelope {
    pub fn rpc(call: &CallDescriptor, result: Value) -> Self {
        ResponseEnvelope::Rpc {
            tid: call.tid.clone(),
            action: call.action.clone(),
            method: call.method.clone(),
            result,
        }
    }

    pub fn exception(
        call: &CallDescriptor,
        message: impl Into<String>,
        trace: Option<String>,
        result: Option<Value>,
    ) -> Self {
        ResponseEnvelope::Exception {
            tid: call.tid.clone(),
            action: Some(call.action.clone()),
            method: Some(call.method.clone()),
            message: message.into(),
            trace,
            result,
        }
    }

    /// Batch element that could not be decoded as a call descriptor.
    pub fn invalid_call(reason: &str) -> Self {
        ResponseEnvelope::Exception {
            tid: None,
            action: None,
            method: None,
            message: format!("Invalid call descriptor: {reason}"),
            trace: None,
            result: None,
        }
    }

    /// Request body that could not be parsed at all.
    pub fn invalid_request(err: &CoreError) -> Self {
        let message = match err {
            CoreError::InvalidRequest(m) => format!("Invalid request: {m}"),
            other => format!("Invalid request: {other}"),
        };
        ResponseEnvelope::Exception {
            tid: None,
            action: None,
            method: None,
            message,
            trace: None,
            result: None,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, ResponseEnvelope::Exception { .. })
    }

    pub fn tid(&self) -> Option<&Value> {
        match self {
            ResponseEnvelope::Rpc { tid, .. } | ResponseEnvelope::Exception { tid, .. } => tid.as_ref(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Exception { message, .. } => Some(message),
            ResponseEnvelope::Rpc { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            ResponseEnvelope::Rpc { result, .. } => Some(result),
            ResponseEnvelope::Exception { result, .. } => result.as_ref(),
        }
    }
}

/// Whole reply: a bare envelope for a non-batch request, an array otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Single(ResponseEnvelope),
    Batch(Vec<ResponseEnvelope>),
}

/// Serialized reply ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn from_envelopes(batch: bool, mut envelopes: Vec<ResponseEnvelope>) -> Self {
        if !batch && envelopes.len() == 1 {
            if let Some(single) = envelopes.pop() {
                return Reply::Single(single);
            }
        }
        Reply::Batch(envelopes)
    }

    pub fn envelopes(&self) -> &[ResponseEnvelope] {
        match self {
            Reply::Single(e) => std::slice::from_ref(e),
            Reply::Batch(es) => es,
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON for structured requests; JSON inside an HTML textarea for upload submissions,
    /// so a hidden-frame upload can read it back.
    pub fn render(&self, upload: bool) -> Result<Rendered, CoreError> {
        let json = self.to_json()?;
        if upload {
            let body = format!(
                "<html><body><textarea>{}</textarea></body></html>",
                escape_html(&json)
            );
            return Ok(Rendered {
                content_type: "text/html",
                body: body.into_bytes(),
            });
        }
        Ok(Rendered {
            content_type: "application/json",
            body: json.into_bytes(),
        })
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> CallDescriptor {
        CallDescriptor::new("Order", "readOrder", Value::Null).with_tid(7)
    }

    #[test]
    fn rpc_envelope_shape() {
        let env = ResponseEnvelope::rpc(&call(), json!([]));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "rpc", "tid": 7, "action": "Order", "method": "readOrder", "result": []})
        );
    }

    #[test]
    fn exception_envelope_shape() {
        let env = ResponseEnvelope::exception(&call(), "Connect Error: readOrder on action Order", None, Some(json!(-100)));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "type": "exception",
                "tid": 7,
                "action": "Order",
                "method": "readOrder",
                "message": "Connect Error: readOrder on action Order",
                "result": -100
            })
        );
    }

    #[test]
    fn single_vs_batch_framing() {
        let env = ResponseEnvelope::rpc(&call(), json!(1));
        let single = Reply::from_envelopes(false, vec![env.clone()]);
        assert!(single.to_json().unwrap().starts_with('{'));
        let batch = Reply::from_envelopes(true, vec![env]);
        assert!(batch.to_json().unwrap().starts_with('['));
    }

    #[test]
    fn upload_reply_is_wrapped_in_html() {
        let env = ResponseEnvelope::rpc(&call(), json!("<b>&"));
        let rendered = Reply::from_envelopes(false, vec![env]).render(true).unwrap();
        assert_eq!(rendered.content_type, "text/html");
        let body = String::from_utf8(rendered.body).unwrap();
        assert!(body.starts_with("<html><body><textarea>{"));
        assert!(body.ends_with("}</textarea></body></html>"));
        assert!(body.contains(r#""result":"&lt;b&gt;&amp;""#));
    }

    #[test]
    fn reply_reads_back() {
        let text = r#"[{"type":"rpc","tid":1,"action":"A","method":"m","result":null},
                       {"type":"exception","tid":2,"message":"boom","where":"A.m @ invoke"}]"#;
        let reply: Reply = serde_json::from_str(text).unwrap();
        let envs = reply.envelopes();
        assert_eq!(envs.len(), 2);
        assert!(!envs[0].is_exception());
        assert_eq!(envs[1].message(), Some("boom"));
    }
}
