//! JSON tool-call interface.
//!
//! Callers send `{ "op": ..., "params": {...} }` and receive a response
//! envelope carrying a receipt (timestamp, input/output hashes, touched
//! paths) plus either the tool result or a structured error.
//!
//! # Tools
//!
//! - `validate_documentation`: validate content against a template
//! - `write_documentation`: full-document write through the gate
//! - `update_documentation`: section replacement through the gate
//! - `get_template_sections`: baseline sections of a template
//! - `cache_stats`: session cache counters

use crate::core::error::AkrError;
use crate::core::gate::{DocumentationService, UpdateRequest, ValidateRequest, WriteRequest};
use crate::core::schema::get_required_sections;
use serde::{Deserialize, Serialize};
use sha2::Digest;

pub const TOOLS: &[&str] = &[
    "validate_documentation",
    "write_documentation",
    "update_documentation",
    "get_template_sections",
    "cache_stats",
];

/// Standard RPC request envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcRequest {
    /// Tool to invoke
    pub op: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Request ID for correlation
    #[serde(default = "default_request_id")]
    pub id: String,
}

pub fn default_request_id() -> String {
    crate::core::time::new_event_id()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcResponse {
    pub id: String,
    pub success: bool,
    pub receipt: Receipt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Receipt documenting what happened
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Receipt {
    pub op: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub inputs_hash: String,
    pub outputs_hash: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub touched_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

fn hash_json<T: Serialize>(value: &T) -> String {
    format!(
        "{:x}",
        sha2::Sha256::digest(serde_json::to_string(value).unwrap_or_default())
    )
}

pub fn success_response(
    request: &RpcRequest,
    result: serde_json::Value,
    touched_paths: Vec<String>,
) -> RpcResponse {
    RpcResponse {
        id: request.id.clone(),
        success: true,
        receipt: Receipt {
            op: request.op.clone(),
            timestamp: crate::core::time::now_rfc3339(),
            inputs_hash: hash_json(&request.params),
            outputs_hash: hash_json(&result),
            touched_paths,
        },
        result: Some(result),
        error: None,
    }
}

/// Error response. A tool that ran but reported failure (a rejected write)
/// carries its payload in `result` as well.
pub fn error_response(
    request: &RpcRequest,
    code: &str,
    message: String,
    result: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        id: request.id.clone(),
        success: false,
        receipt: Receipt {
            op: request.op.clone(),
            timestamp: crate::core::time::now_rfc3339(),
            inputs_hash: hash_json(&request.params),
            outputs_hash: hash_json(&result),
            touched_paths: Vec::new(),
        },
        result,
        error: Some(RpcError {
            code: code.to_string(),
            message,
        }),
    }
}

fn params<T: serde::de::DeserializeOwned>(request: &RpcRequest) -> Result<T, AkrError> {
    serde_json::from_value(request.params.clone())
        .map_err(|e| AkrError::ValidationError(format!("invalid params for {}: {}", request.op, e)))
}

/// Route one tool call to the service.
pub fn dispatch(service: &DocumentationService, request: &RpcRequest) -> RpcResponse {
    tracing::debug!(op = %request.op, id = %request.id, "tool call");
    match request.op.as_str() {
        "validate_documentation" => match params::<ValidateRequest>(request)
            .and_then(|p| service.validate_document(&p))
        {
            Ok(report) => success_response(request, to_value(&report), Vec::new()),
            Err(e) => error_response(request, e.kind().as_str(), e.to_string(), None),
        },
        "write_documentation" => match params::<WriteRequest>(request) {
            Ok(p) => write_response(request, service.write_documentation(&p)),
            Err(e) => error_response(request, "INVALID_PARAMS", e.to_string(), None),
        },
        "update_documentation" => match params::<UpdateRequest>(request) {
            Ok(p) => write_response(request, service.update_documentation(&p)),
            Err(e) => error_response(request, "INVALID_PARAMS", e.to_string(), None),
        },
        "get_template_sections" => {
            let template = request
                .params
                .get("template")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let sections = get_required_sections(template);
            success_response(
                request,
                serde_json::json!({ "template": template, "sections": sections }),
                Vec::new(),
            )
        }
        "cache_stats" => success_response(request, to_value(&service.cache_stats()), Vec::new()),
        other => error_response(
            request,
            "UNKNOWN_OP",
            format!("unknown tool '{}'; expected one of: {}", other, TOOLS.join(", ")),
            None,
        ),
    }
}

fn to_value<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn write_response(request: &RpcRequest, result: crate::core::gate::WriteResult) -> RpcResponse {
    let payload = to_value(&result);
    if result.success {
        let touched = if result.committed {
            vec![result.file_path.clone()]
        } else {
            Vec::new()
        };
        success_response(request, payload, touched)
    } else {
        let code = result
            .error_type
            .map(|k| k.as_str())
            .unwrap_or("WRITE_FAILED");
        error_response(request, code, result.message.clone(), Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AkrConfig;

    fn request(op: &str, params: serde_json::Value) -> RpcRequest {
        RpcRequest {
            op: op.to_string(),
            params,
            id: default_request_id(),
        }
    }

    #[test]
    fn unknown_op_is_an_error_envelope() {
        let svc = DocumentationService::new(".", AkrConfig::default());
        let resp = dispatch(&svc, &request("nope", serde_json::json!({})));
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "UNKNOWN_OP");
        assert_eq!(resp.receipt.inputs_hash.len(), 64);
    }

    #[test]
    fn template_sections_tool_lists_baseline() {
        let svc = DocumentationService::new(".", AkrConfig::default());
        let resp = dispatch(
            &svc,
            &request("get_template_sections", serde_json::json!({"template": "minimal_service_template"})),
        );
        assert!(resp.success);
        let sections = resp.result.unwrap()["sections"].as_array().unwrap().len();
        assert_eq!(sections, 4);
    }

    #[test]
    fn rejected_write_reports_error_type() {
        let svc = DocumentationService::new(".", AkrConfig::default());
        let resp = dispatch(
            &svc,
            &request(
                "write_documentation",
                serde_json::json!({"docPath": "docs/A.md", "content": "# A\n", "template": "minimal_service_template"}),
            ),
        );
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "PERMISSION_DENIED");
        assert_eq!(resp.result.unwrap()["success"], false);
    }
}
