use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lib_telemetry::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// One UDP ingress datagram.
///
/// `{"id": ..., "sample": ...}` is a raw sample routed through the decoders;
/// `{"id": ..., "value": ...}` is an ad-hoc point recorded as is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IngressMessage {
    Sample { id: String, sample: Value },
    Point {
        id: String,
        value: Value,
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// `?start=&end=` of a history range query.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeQuery {
    pub start: i64,
    pub end: i64,
}

/// Realtime line protocol: `subscribe <id>` / `unsubscribe <id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Subscribe(String),
    Unsubscribe(String),
}

impl FromStr for ClientCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("subscribe"), Some(id), None) => Ok(ClientCommand::Subscribe(id.to_string())),
            (Some("unsubscribe"), Some(id), None) => Ok(ClientCommand::Unsubscribe(id.to_string())),
            _ => Err(format!("Unrecognized command: {line}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error returned by the history endpoints.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::UnknownIdentifier(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_ingress_shapes() {
        let sample: IngressMessage = serde_json::from_value(json!({"id": "sens.batteryStatus", "sample": [1, 2]})).unwrap();
        assert_eq!(
            sample,
            IngressMessage::Sample { id: "sens.batteryStatus".to_string(), sample: json!([1, 2]) }
        );

        let point: IngressMessage = serde_json::from_value(json!({"id": "ping", "value": 12.5})).unwrap();
        assert_eq!(
            point,
            IngressMessage::Point { id: "ping".to_string(), value: json!(12.5), timestamp: None }
        );

        assert!(serde_json::from_value::<IngressMessage>(json!({"id": "x"})).is_err());
    }

    #[test]
    fn parses_realtime_commands() {
        assert_eq!(
            "subscribe sens.headIMU".parse::<ClientCommand>(),
            Ok(ClientCommand::Subscribe("sens.headIMU".to_string()))
        );
        assert_eq!(
            "  unsubscribe   ping ".parse::<ClientCommand>(),
            Ok(ClientCommand::Unsubscribe("ping".to_string()))
        );
        assert!("subscribe".parse::<ClientCommand>().is_err());
        assert!("subscribe a b".parse::<ClientCommand>().is_err());
        assert!("hello ping".parse::<ClientCommand>().is_err());
    }

    #[test]
    fn unknown_identifier_maps_to_not_found() {
        let err = ApiError::from(EngineError::UnknownIdentifier("nope".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.message.contains("nope"));
    }
}
