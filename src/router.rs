//! Query Router
//!
//! Entry point for agent requests. Each request names a function and carries
//! a list of named parameters; the response echoes the request identity and
//! wraps one text body. Validation happens before any provider call.

use crate::docs::Publisher;
use crate::inventory::{AppId, Aggregator};
use crate::resource::BucketTagger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;

pub const GET_INFRASTRUCTURE_DETAILS: &str = "GetInfrastructureDetails";
pub const GENERATE_AND_PUBLISH_DOCUMENTATION: &str = "generate_and_publish_documentation";

fn default_message_version() -> String {
    "1.0".to_string()
}

/// Inbound agent envelope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub action_group: String,
    #[serde(default = "default_message_version")]
    pub message_version: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl AgentRequest {
    pub fn new(function: &str) -> Self {
        Self {
            function: function.to_string(),
            action_group: String::new(),
            message_version: default_message_version(),
            parameters: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            kind: Some("string".to_string()),
            value: Value::String(value.to_string()),
        });
        self
    }

    /// First non-empty value of a named parameter. Numbers and booleans are
    /// taken in their JSON text form.
    pub fn param(&self, name: &str) -> Option<String> {
        let param = self.parameters.iter().find(|p| p.name == name)?;
        let value = match &param.value {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        (!value.trim().is_empty()).then_some(value)
    }
}

/// Outbound agent envelope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub message_version: String,
    pub response: ActionResponse,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub response_body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseBody {
    #[serde(rename = "TEXT")]
    pub text: TextBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextBody {
    pub body: String,
}

impl AgentResponse {
    pub fn text(request: &AgentRequest, body: impl Into<String>) -> Self {
        Self {
            message_version: request.message_version.clone(),
            response: ActionResponse {
                action_group: request.action_group.clone(),
                function: request.function.clone(),
                function_response: FunctionResponse {
                    response_body: ResponseBody {
                        text: TextBody { body: body.into() },
                    },
                },
            },
        }
    }

    pub fn body(&self) -> &str {
        &self.response.function_response.response_body.text.body
    }
}

/// Failures reported back to the agent as text
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("❌ Error: app_id is required")]
    MissingAppId,

    #[error("❌ Error: Missing required parameters: {}", .missing.join(", "))]
    MissingParameters { missing: Vec<&'static str> },

    #[error("❌ Invalid function: {function}. Supported functions are: GetInfrastructureDetails, generate_and_publish_documentation")]
    UnknownFunction { function: String },

    #[error("❌ Error analyzing infrastructure: {reason}")]
    Analysis { reason: String },

    #[error("❌ Error generating documentation: {reason}")]
    Publish { reason: String },

    #[error("❌ Error tagging bucket: {reason}")]
    Tagging { reason: String },
}

pub struct Router {
    aggregator: Aggregator,
    publisher: Publisher,
    tagger: Box<dyn BucketTagger>,
}

impl Router {
    pub fn new(
        aggregator: Aggregator,
        publisher: Publisher,
        tagger: Box<dyn BucketTagger>,
    ) -> Self {
        Self {
            aggregator,
            publisher,
            tagger,
        }
    }

    /// Infrastructure details and documentation publishing
    pub async fn handle(&self, request: &AgentRequest) -> AgentResponse {
        let span = tracing::info_span!(
            "invocation",
            id = %uuid::Uuid::new_v4(),
            function = %request.function
        );
        let body = async {
            match self.dispatch(request).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("{}", e);
                    e.to_string()
                },
            }
        }
        .instrument(span)
        .await;
        AgentResponse::text(request, body)
    }

    async fn dispatch(&self, request: &AgentRequest) -> Result<String, RouterError> {
        let app_id = request
            .param("app_id")
            .and_then(AppId::new)
            .ok_or(RouterError::MissingAppId)?;

        match request.function.as_str() {
            GET_INFRASTRUCTURE_DETAILS => {
                let yaml = self
                    .aggregator
                    .aggregate(&app_id)
                    .await
                    .and_then(|report| report.to_yaml())
                    .map_err(|e| RouterError::Analysis {
                        reason: format!("{:#}", e),
                    })?;
                Ok(format!("Infrastructure details for app_id {}:\n{}", app_id, yaml))
            },
            GENERATE_AND_PUBLISH_DOCUMENTATION => {
                let report = self
                    .aggregator
                    .aggregate(&app_id)
                    .await
                    .map_err(|e| RouterError::Publish {
                        reason: format!("{:#}", e),
                    })?;
                let document =
                    self.publisher
                        .publish(&report)
                        .await
                        .map_err(|e| RouterError::Publish {
                            reason: format!("{:#}", e),
                        })?;
                Ok(format!(
                    "✅ Documentation generated successfully!\nAccess it here: {}",
                    document.url
                ))
            },
            other => Err(RouterError::UnknownFunction {
                function: other.to_string(),
            }),
        }
    }

    /// Bucket tagging helper
    pub async fn handle_tagging(&self, request: &AgentRequest) -> AgentResponse {
        let span = tracing::info_span!("tagging", id = %uuid::Uuid::new_v4());
        let body = async {
            match self.tag(request).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("{}", e);
                    e.to_string()
                },
            }
        }
        .instrument(span)
        .await;
        AgentResponse::text(request, body)
    }

    async fn tag(&self, request: &AgentRequest) -> Result<String, RouterError> {
        let tag_name = request.param("tag_name");
        let tag_value = request.param("tag_value");
        let bucket_name = request.param("bucket_name");

        let (Some(key), Some(value), Some(bucket)) = (&tag_name, &tag_value, &bucket_name) else {
            let missing = [
                ("tag_name", &tag_name),
                ("tag_value", &tag_value),
                ("bucket_name", &bucket_name),
            ]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name)
            .collect();
            return Err(RouterError::MissingParameters { missing });
        };

        self.tagger
            .put_bucket_tag(bucket, key, value)
            .await
            .map_err(|e| RouterError::Tagging {
                reason: format!("{:#}", e),
            })?;
        Ok(format!(
            "✅ Successfully added tag {}={} to bucket {}",
            key, value, bucket
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: AgentRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.message_version, "1.0");
        assert!(request.function.is_empty());
        assert!(request.parameters.is_empty());
    }

    #[test]
    fn test_param_lookup() {
        let request: AgentRequest = serde_json::from_str(
            r#"{"function": "GetInfrastructureDetails",
                "parameters": [
                    {"name": "app_id", "type": "number", "value": 100},
                    {"name": "blank", "value": "  "}
                ]}"#,
        )
        .unwrap();
        assert_eq!(request.param("app_id").as_deref(), Some("100"));
        assert_eq!(request.param("blank"), None);
        assert_eq!(request.param("absent"), None);
    }

    #[test]
    fn test_response_envelope_shape() {
        let request = AgentRequest {
            action_group: "infra".to_string(),
            ..AgentRequest::new("GetInfrastructureDetails")
        };
        let value = serde_json::to_value(AgentResponse::text(&request, "hello")).unwrap();
        assert_eq!(value["messageVersion"], "1.0");
        assert_eq!(value["response"]["actionGroup"], "infra");
        assert_eq!(value["response"]["function"], "GetInfrastructureDetails");
        assert_eq!(
            value["response"]["functionResponse"]["responseBody"]["TEXT"]["body"],
            "hello"
        );
    }

    #[test]
    fn test_error_texts() {
        assert_eq!(
            RouterError::MissingParameters {
                missing: vec!["tag_name", "bucket_name"]
            }
            .to_string(),
            "❌ Error: Missing required parameters: tag_name, bucket_name"
        );
        assert_eq!(
            RouterError::UnknownFunction {
                function: "Nope".to_string()
            }
            .to_string(),
            "❌ Invalid function: Nope. Supported functions are: GetInfrastructureDetails, generate_and_publish_documentation"
        );
    }
}
