//! Inbound body parsing: raw JSON calls, or a form submission carrying one call.

use std::collections::BTreeMap;

use base64::Engine;
use serde_json::{json, Map, Value};

use crate::protocol::{CallBatch, CallDescriptor};
use crate::CoreError;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Parsed request body plus the framing flags the reply depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundRequest {
    pub batch: CallBatch,
    /// Submitted as form fields rather than a JSON body.
    pub form: bool,
    /// Form submission flagged `extUpload=true`; the reply is wrapped in HTML.
    pub upload: bool,
}

/// One uploaded file from a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    fn to_value(&self) -> Value {
        json!({
            "name": self.file_name,
            "type": self.content_type,
            "size": self.content.len(),
            "content": base64::engine::general_purpose::STANDARD.encode(&self.content),
        })
    }
}

impl InboundRequest {
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, CoreError> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            FORM_URLENCODED => {
                let fields = url::form_urlencoded::parse(body)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                Self::from_form(fields, Vec::new())
            }
            MULTIPART => {
                let boundary = content_type
                    .and_then(boundary_param)
                    .ok_or_else(|| CoreError::InvalidRequest("multipart body without boundary".into()))?;
                let (fields, files) = parse_multipart(body, &boundary)?;
                Self::from_form(fields, files)
            }
            _ => Ok(Self {
                batch: CallBatch::from_slice(body)?,
                form: false,
                upload: false,
            }),
        }
    }

    /// Synthesize the single call of a form submission from its control fields.
    /// Data is `[fields, files]` with the control fields removed.
    pub fn from_form(
        mut fields: BTreeMap<String, String>,
        files: Vec<UploadedFile>,
    ) -> Result<Self, CoreError> {
        let action = fields
            .remove("extAction")
            .ok_or_else(|| CoreError::InvalidRequest("form submission without extAction".into()))?;
        let method = fields.remove("extMethod").unwrap_or_default();
        let tid = fields.remove("extTID");
        let upload = fields.remove("extUpload").is_some_and(|v| v == "true");
        fields.remove("extType");

        let field_map: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let file_map: Map<String, Value> = files.iter().map(|f| (f.field.clone(), f.to_value())).collect();

        let mut call = CallDescriptor::new(
            action,
            method,
            json!([Value::Object(field_map), Value::Object(file_map)]),
        );
        call.tid = tid.map(Value::String);
        Ok(Self {
            batch: CallBatch::Single(Ok(call)),
            form: true,
            upload,
        })
    }
}

fn boundary_param(content_type: &str) -> Option<String> {
    header_params(content_type)
        .into_iter()
        .find_map(|(key, value)| (key == "boundary" && !value.is_empty()).then_some(value))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

type FormParts = (BTreeMap<String, String>, Vec<UploadedFile>);

fn parse_multipart(body: &[u8], boundary: &str) -> Result<FormParts, CoreError> {
    let malformed = |what: &str| CoreError::InvalidRequest(format!("malformed multipart body: {what}"));
    let delimiter = format!("--{boundary}");
    let next_delimiter = format!("\r\n--{boundary}");

    let start = find(body, delimiter.as_bytes()).ok_or_else(|| malformed("no boundary"))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut fields = BTreeMap::new();
    let mut files = Vec::new();

    loop {
        if rest.starts_with(b"--") {
            break;
        }
        rest = rest.strip_prefix(b"\r\n").ok_or_else(|| malformed("boundary line"))?;
        let end = find(rest, next_delimiter.as_bytes()).ok_or_else(|| malformed("unterminated part"))?;
        let part = &rest[..end];
        rest = &rest[end + next_delimiter.len()..];

        let split = find(part, b"\r\n\r\n").ok_or_else(|| malformed("part headers"))?;
        let headers = String::from_utf8_lossy(&part[..split]);
        let content = &part[split + 4..];

        let mut name = None;
        let mut file_name = None;
        let mut content_type = String::from("application/octet-stream");
        for line in headers.lines() {
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim();
            if key.eq_ignore_ascii_case("content-disposition") {
                for (k, v) in header_params(value) {
                    match k.as_str() {
                        "name" => name = Some(v),
                        "filename" => file_name = Some(v),
                        _ => {}
                    }
                }
            } else if key.eq_ignore_ascii_case("content-type") {
                content_type = value.trim().to_string();
            }
        }

        let name = name.ok_or_else(|| malformed("part without name"))?;
        match file_name {
            Some(file_name) => files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                content: content.to_vec(),
            }),
            None => {
                fields.insert(name, String::from_utf8_lossy(content).into_owned());
            }
        }
    }
    Ok((fields, files))
}

/// `key=value` parameters after the first `;` of a header value. Quoted
/// values may contain `;` and backslash escapes.
fn header_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = value.chars().skip_while(|c| *c != ';').peekable();
    while chars.next().is_some() {
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ';') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut val = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => val.extend(chars.next()),
                    c => val.push(c),
                }
            }
            while chars.next_if(|c| *c != ';').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ';') {
                val.push(c);
            }
        }
        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.push((key, val.trim().to_string()));
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body() {
        let req = InboundRequest::parse(
            Some("application/json; charset=utf-8"),
            br#"[{"action":"A","method":"m","data":null,"tid":1}]"#,
        )
        .unwrap();
        assert!(req.batch.is_batch());
        assert!(!req.form && !req.upload);
    }

    #[test]
    fn missing_content_type_is_json() {
        let req = InboundRequest::parse(None, br#"{"action":"A","method":"m","tid":1}"#).unwrap();
        assert!(!req.batch.is_batch());
    }

    #[test]
    fn urlencoded_form() {
        let body = b"extAction=Category&extMethod=createCategorie&extTID=4&extUpload=false&label=Tools+%26+parts";
        let req = InboundRequest::parse(Some(FORM_URLENCODED), body).unwrap();
        assert!(req.form);
        assert!(!req.upload);
        let call = req.batch.into_calls().remove(0).unwrap();
        assert_eq!(call.action, "Category");
        assert_eq!(call.method, "createCategorie");
        assert_eq!(call.tid, Some(json!("4")));
        assert_eq!(call.data, json!([{"label": "Tools & parts"}, {}]));
    }

    #[test]
    fn form_without_action_is_rejected() {
        let err = InboundRequest::parse(Some(FORM_URLENCODED), b"label=x").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }

    #[test]
    fn multipart_upload() {
        let body = "--XyZ\r\n\
Content-Disposition: form-data; name=\"extAction\"\r\n\r\n\
Order\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"extMethod\"\r\n\r\n\
attachDocument\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"extUpload\"\r\n\r\n\
true\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
hello\r\n\
--XyZ--\r\n";
        let req = InboundRequest::parse(Some("multipart/form-data; boundary=XyZ"), body.as_bytes()).unwrap();
        assert!(req.form && req.upload);
        let call = req.batch.into_calls().remove(0).unwrap();
        assert_eq!(call.tid, None);
        assert_eq!(
            call.data,
            json!([{}, {"doc": {"name": "a.txt", "type": "text/plain", "size": 5, "content": "aGVsbG8="}}])
        );
    }

    #[test]
    fn quoted_disposition_params() {
        let params = header_params(r#"form-data; name="doc"; filename="a;b \"x\".txt"; inline"#);
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "doc".to_string()),
                ("filename".to_string(), r#"a;b "x".txt"#.to_string()),
            ]
        );

        let body = "--B\r\n\
Content-Disposition: form-data; name=\"extAction\"\r\n\r\n\
Order\r\n\
--B\r\n\
Content-Disposition: form-data; name=\"extMethod\"\r\n\r\n\
attach\r\n\
--B\r\n\
Content-Disposition: form-data; filename=\"a;b.txt\"; name=\"doc\"\r\n\r\n\
hi\r\n\
--B--\r\n";
        let req = InboundRequest::parse(Some("multipart/form-data; boundary=B"), body.as_bytes()).unwrap();
        let call = req.batch.into_calls().remove(0).unwrap();
        assert_eq!(call.data[1]["doc"]["name"], "a;b.txt");
    }

    #[test]
    fn multipart_without_boundary() {
        assert!(InboundRequest::parse(Some(MULTIPART), b"").is_err());
    }
}
