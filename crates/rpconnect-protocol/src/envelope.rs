//! Request and reply envelopes carried inside frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::fault::Fault;

/// A call to a named procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Name the procedure is registered under.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
}

impl Request {
    /// Creates a request.
    pub fn new(name: impl Into<String>, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
            kwargs,
        }
    }
}

/// Borrowed form of [`Request`] so encoding never clones arguments.
#[derive(Serialize)]
struct RequestRef<'a> {
    name: &'a str,
    args: &'a [Value],
    kwargs: &'a Map<String, Value>,
}

/// Outcome of a call as it travels back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// The procedure returned a value.
    Result { content: Value },
    /// The call failed.
    Error { exc_type: String, message: String },
}

impl Reply {
    /// Builds the reply for a call outcome.
    pub fn from_outcome(outcome: &Result<Value, Fault>) -> Self {
        match outcome {
            Ok(content) => Self::Result {
                content: content.clone(),
            },
            Err(fault) => Self::Error {
                exc_type: fault.kind().name().to_string(),
                message: fault.message().to_string(),
            },
        }
    }

    /// Converts the reply back into a call outcome.
    pub fn into_outcome(self) -> Result<Value, Fault> {
        match self {
            Self::Result { content } => Ok(content),
            Self::Error { exc_type, message } => Err(Fault::from_wire(&exc_type, message)),
        }
    }
}

/// Serializes a request envelope.
pub fn encode_request(
    name: &str,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(&RequestRef { name, args, kwargs })?)
}

/// Parses a request envelope, requiring `name`, `args` and `kwargs`.
pub fn decode_request(data: &[u8]) -> ProtocolResult<Request> {
    serde_json::from_slice(data).map_err(|e| ProtocolError::MalformedRequest(e.to_string()))
}

/// Serializes the reply for a call outcome.
pub fn encode_reply(outcome: &Result<Value, Fault>) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(&Reply::from_outcome(outcome))?)
}

/// Parses a reply envelope into a call outcome.
pub fn decode_reply(data: &[u8]) -> ProtocolResult<Result<Value, Fault>> {
    let reply: Reply =
        serde_json::from_slice(data).map_err(|e| ProtocolError::MalformedReply(e.to_string()))?;
    Ok(reply.into_outcome())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaultKind;
    use serde_json::json;

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn request_wire_shape() {
        let bytes = encode_request("add", &[json!(2), json!(3)], &kwargs(json!({"scale": 10})))
            .unwrap();
        insta::assert_snapshot!(
            String::from_utf8(bytes).unwrap(),
            @r#"{"name":"add","args":[2,3],"kwargs":{"scale":10}}"#
        );
    }

    #[test]
    fn request_roundtrip() {
        let args = vec![json!("text"), json!([1, 2, {"nested": null}]), json!(1.5)];
        let kw = kwargs(json!({"flag": true, "items": ["a", "b"]}));

        let bytes = encode_request("pingpong", &args, &kw).unwrap();
        let request = decode_request(&bytes).unwrap();

        assert_eq!(request, Request::new("pingpong", args, kw));
    }

    #[test]
    fn request_missing_kwargs_is_malformed() {
        let result = decode_request(br#"{"name": "add", "args": [1, 2]}"#);
        match result {
            Err(ProtocolError::MalformedRequest(msg)) => assert!(msg.contains("kwargs")),
            other => panic!("expected MalformedRequest, got {other:?}"),
        }
    }

    #[test]
    fn request_rejects_non_json_and_empty_payloads() {
        assert!(matches!(
            decode_request(b"\xff\xfe garbage"),
            Err(ProtocolError::MalformedRequest(_))
        ));
        assert!(matches!(
            decode_request(b""),
            Err(ProtocolError::MalformedRequest(_))
        ));
    }

    #[test]
    fn result_reply_wire_shape() {
        let bytes = encode_reply(&Ok(json!(5))).unwrap();
        insta::assert_snapshot!(
            String::from_utf8(bytes).unwrap(),
            @r#"{"type":"result","content":5}"#
        );
    }

    #[test]
    fn error_reply_wire_shape() {
        let bytes = encode_reply(&Err(Fault::application("boom"))).unwrap();
        insta::assert_snapshot!(
            String::from_utf8(bytes).unwrap(),
            @r#"{"type":"error","exc_type":"ApplicationFault","message":"boom"}"#
        );
    }

    #[test]
    fn error_reply_reconstructs_fault() {
        let bytes = encode_reply(&Err(Fault::lookup("missing"))).unwrap();
        let fault = decode_reply(&bytes).unwrap().unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::Lookup);
        assert!(fault.message().contains("missing"));
    }

    #[test]
    fn reply_from_python_server() {
        let outcome =
            decode_reply(br#"{"type": "error", "exc_type": "KeyError", "message": "'nope'"}"#)
                .unwrap();
        assert_eq!(outcome.unwrap_err().kind(), &FaultKind::Lookup);

        let outcome =
            decode_reply(br#"{"type": "result", "content": [[1, 2], {"a": 3}]}"#).unwrap();
        assert_eq!(outcome.unwrap(), json!([[1, 2], {"a": 3}]));
    }

    #[test]
    fn reply_with_unknown_tag_is_malformed() {
        assert!(matches!(
            decode_reply(br#"{"type": "partial", "content": 1}"#),
            Err(ProtocolError::MalformedReply(_))
        ));
        assert!(matches!(
            decode_reply(br#"{"content": 1}"#),
            Err(ProtocolError::MalformedReply(_))
        ));
        assert!(matches!(
            decode_reply(br#"{"type": "error", "message": "no kind"}"#),
            Err(ProtocolError::MalformedReply(_))
        ));
    }
}
