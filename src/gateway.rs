//! Request/response contract for the popup and the survey page.

use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    duration::{classify, duration_minutes},
    monitor::CallLifecycleEngine,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    GetCallData,
    /// `getStatus`, or the popup's older `test` action.
    GetStatus,
    ForceCheck,
    ClassifyDuration { duration: Option<String> },
    Unknown(String),
}

impl GatewayRequest {
    pub fn from_value(payload: &Value) -> Self {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match action {
            "getCallData" => GatewayRequest::GetCallData,
            "getStatus" | "test" => GatewayRequest::GetStatus,
            "forceCheck" => GatewayRequest::ForceCheck,
            "classifyDuration" => GatewayRequest::ClassifyDuration {
                duration: payload
                    .get("duration")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            other => GatewayRequest::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GatewayResponse {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        message: String,
    },
}

impl GatewayResponse {
    pub fn ok() -> Self {
        GatewayResponse::Success { data: None }
    }

    pub fn with_data(data: Value) -> Self {
        GatewayResponse::Success { data: Some(data) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        GatewayResponse::Error {
            message: message.into(),
        }
    }

    fn encode<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::with_data(value),
            Err(err) => Self::error(format!("failed to encode response: {err}")),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(&self).unwrap_or_else(|err| {
            json!({ "status": "error", "message": format!("failed to encode response: {err}") })
        })
    }
}

pub async fn dispatch(engine: &mut CallLifecycleEngine, request: GatewayRequest) -> GatewayResponse {
    match request {
        GatewayRequest::GetCallData => GatewayResponse::encode(&engine.history()),
        GatewayRequest::GetStatus => GatewayResponse::encode(&engine.summary()),
        GatewayRequest::ForceCheck => {
            engine.check_status().await;
            GatewayResponse::ok()
        }
        GatewayRequest::ClassifyDuration { duration: Some(duration) } => {
            let bucket = classify(&duration);
            GatewayResponse::with_data(json!({
                "value": bucket.value,
                "label": bucket.label,
                "minutes": duration_minutes(&duration),
            }))
        }
        GatewayRequest::ClassifyDuration { duration: None } => {
            GatewayResponse::error("duration is required")
        }
        GatewayRequest::Unknown(action) => {
            log::warn!("Unknown action '{action}'");
            GatewayResponse::error("Unknown action")
        }
    }
}
