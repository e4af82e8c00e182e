//! Chart generation endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::Uri,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ServiceError};
use crate::state::AppState;

const MISSING_PARAMS: &str = "missing required parameter: type or data";

/// Chart request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRequest {
    /// Tool name on the MCP server, e.g. `generate_pie_chart`.
    #[serde(rename = "type", default)]
    pub chart_type: Option<String>,
    /// Tool arguments.
    #[serde(default)]
    pub data: Option<Value>,
}

/// Chart response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub success: bool,
    /// Where the rendered chart can be fetched.
    pub url: String,
}

impl ChartRequest {
    /// Split into a tool name and its arguments, rejecting incomplete requests.
    fn into_parts(self) -> Result<(String, Map<String, Value>)> {
        let chart_type = self
            .chart_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::BadRequest(MISSING_PARAMS.to_string()))?;

        let data = match self.data {
            None | Some(Value::Null) => {
                return Err(ServiceError::BadRequest(MISSING_PARAMS.to_string()));
            }
            Some(Value::Object(data)) => data,
            Some(_) => {
                return Err(ServiceError::BadRequest(
                    "data must be a JSON object".to_string(),
                ));
            }
        };

        Ok((chart_type, data))
    }
}

/// Render a chart with a fresh MCP session.
///
/// The client connects, invokes the tool named by `type` and is closed
/// again whatever the outcome.
pub async fn chart(
    State(state): State<AppState>,
    uri: Uri,
    payload: std::result::Result<Json<ChartRequest>, JsonRejection>,
) -> Result<Json<ChartResponse>> {
    let Json(request) = payload?;
    let (chart_type, data) = request.into_parts()?;

    tracing::info!(tool = %chart_type, path = %uri.path(), "chart request");

    let url = mcp_chart::invoke_once(state.config.client.clone(), &chart_type, data).await?;

    tracing::info!(tool = %chart_type, url = %url, "chart rendered");
    Ok(Json(ChartResponse { success: true, url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> ChartRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_into_parts() {
        let (tool, data) = request(json!({"type": "generate_pie_chart", "data": {"title": "t"}}))
            .into_parts()
            .unwrap();
        assert_eq!(tool, "generate_pie_chart");
        assert_eq!(data["title"], "t");
    }

    #[test]
    fn test_incomplete_requests_are_rejected() {
        for body in [
            json!({"data": {}}),
            json!({"type": "", "data": {}}),
            json!({"type": "generate_pie_chart"}),
            json!({"type": "generate_pie_chart", "data": null}),
            json!({"type": "generate_pie_chart", "data": [1, 2]}),
        ] {
            let err = request(body.clone()).into_parts().unwrap_err();
            assert!(matches!(err, ServiceError::BadRequest(_)), "accepted {}", body);
        }
    }
}
