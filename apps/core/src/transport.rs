use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bus::{LocalBus, MethodHandler, Responder};
use crate::contract::{
    CoreRequest, CoreResponse, RequestEnvelope, METHOD_GET_CATEGORIES, METHOD_SEARCH,
    METHOD_UPDATE_CATEGORY,
};
use crate::core_service::{CoreService, ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    UnknownMethod,
    MissingKey,
    KeyTooShort,
    MissingId,
    MissingRank,
    UnexpectedRank,
    CategoryNotFound,
    Store,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub return_value: bool,
    pub error_code: ErrorCode,
    pub error_text: String,
}

impl ErrorResponse {
    fn new(error_code: ErrorCode, error_text: impl Into<String>) -> Self {
        Self {
            return_value: false,
            error_code,
            error_text: error_text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TransportResponse {
    Ok(CoreResponse),
    Err(ErrorResponse),
}

pub fn parse_request(method: &str, payload: Value) -> Result<CoreRequest, ErrorResponse> {
    let payload = if payload.is_null() { json!({}) } else { payload };
    let invalid = |error: serde_json::Error| ErrorResponse::new(ErrorCode::InvalidJson, error.to_string());
    match method {
        METHOD_SEARCH => serde_json::from_value(payload)
            .map(CoreRequest::Search)
            .map_err(invalid),
        METHOD_GET_CATEGORIES => Ok(CoreRequest::GetCategories),
        METHOD_UPDATE_CATEGORY => serde_json::from_value(payload)
            .map(CoreRequest::UpdateCategory)
            .map_err(invalid),
        other => Err(ErrorResponse::new(
            ErrorCode::UnknownMethod,
            format!("Unknown method: {other}"),
        )),
    }
}

pub async fn handle_request(service: &CoreService, request: CoreRequest) -> TransportResponse {
    match service.handle_command(request).await {
        Ok(response) => TransportResponse::Ok(response),
        Err(error) => {
            tracing::debug!(%error, "request rejected");
            TransportResponse::Err(map_service_error(error))
        }
    }
}

pub async fn handle_method(service: &CoreService, method: &str, payload: Value) -> TransportResponse {
    match parse_request(method, payload) {
        Ok(request) => handle_request(service, request).await,
        Err(error) => TransportResponse::Err(error),
    }
}

pub async fn handle_json(service: &CoreService, payload: &str) -> String {
    let response = match serde_json::from_str::<RequestEnvelope>(payload) {
        Ok(envelope) => handle_method(service, &envelope.method, envelope.payload).await,
        Err(error) => TransportResponse::Err(ErrorResponse::new(
            ErrorCode::InvalidJson,
            error.to_string(),
        )),
    };
    encode(&response)
}

pub fn register_on_bus(bus: &LocalBus, service_name: &str, service: Rc<CoreService>) {
    for method in [METHOD_SEARCH, METHOD_GET_CATEGORIES, METHOD_UPDATE_CATEGORY] {
        let service = Rc::clone(&service);
        let handler: MethodHandler = Rc::new(move |payload: Value, responder: Responder| {
            let service = Rc::clone(&service);
            tokio::task::spawn_local(async move {
                let response = handle_method(&service, method, payload).await;
                let reply = serde_json::to_value(&response).unwrap_or_else(|error| {
                    json!({ "returnValue": false, "errorText": error.to_string() })
                });
                if !responder.respond(reply) {
                    tracing::debug!(method, "caller went away before the reply");
                }
            });
        });
        bus.register_method(service_name, method, handler);
    }
    bus.register_service(service_name);
}

fn encode(response: &TransportResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|error| {
        format!(r#"{{"returnValue":false,"errorText":"response encoding failed: {error}"}}"#)
    })
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    let code = match &error {
        ServiceError::MissingKey => ErrorCode::MissingKey,
        ServiceError::KeyTooShort(_) => ErrorCode::KeyTooShort,
        ServiceError::MissingId => ErrorCode::MissingId,
        ServiceError::MissingRank => ErrorCode::MissingRank,
        ServiceError::UnexpectedRank => ErrorCode::UnexpectedRank,
        ServiceError::CategoryNotFound(_) => ErrorCode::CategoryNotFound,
        ServiceError::Store(_) => ErrorCode::Store,
    };
    ErrorResponse::new(code, error.to_string())
}
