//! Route extraction from the OpenAPI (Swagger 2.0) documents stored in an
//! API Gateway config

use crate::inventory::records::{MethodRecord, RouteRecord};
use anyhow::{Context, Result};
use serde_yaml::Value;

const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Routes of a document, in path order, with per-method authorization
pub fn routes_from_document(contents: &str) -> Result<Vec<RouteRecord>> {
    let doc: Value = serde_yaml::from_str(contents).context("Parsing OpenAPI document")?;

    let definitions = doc.get("securityDefinitions");
    let global_security = doc.get("security");

    let Some(paths) = doc.get("paths").and_then(|p| p.as_mapping()) else {
        return Ok(Vec::new());
    };

    let mut routes = Vec::new();
    for (path, operations) in paths {
        let Some(path) = path.as_str() else {
            continue;
        };

        let methods = HTTP_METHODS
            .iter()
            .filter_map(|method| {
                let operation = operations.get(*method)?;
                let schemes = security_schemes(operation.get("security").or(global_security));
                Some(MethodRecord {
                    http_method: method.to_uppercase(),
                    authorization: if schemes.is_empty() {
                        "NONE".to_string()
                    } else {
                        schemes.join(",")
                    },
                    api_key_required: schemes
                        .iter()
                        .any(|s| scheme_type(definitions, s).as_deref() == Some("apiKey")),
                })
            })
            .collect();

        routes.push(RouteRecord {
            path: path.to_string(),
            methods,
        });
    }
    Ok(routes)
}

/// Scheme names from a security requirement list (`[{name: []}, ...]`)
fn security_schemes(security: Option<&Value>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for requirement in security.and_then(|s| s.as_sequence()).into_iter().flatten() {
        for name in requirement.as_mapping().into_iter().flat_map(|m| m.keys()) {
            if let Some(name) = name.as_str() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

fn scheme_type(definitions: Option<&Value>, scheme: &str) -> Option<String> {
    definitions?
        .get(scheme)?
        .get("type")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
swagger: "2.0"
info:
  title: orders
  version: "1.0"
securityDefinitions:
  api_key:
    type: apiKey
    name: key
    in: query
  google_id_token:
    type: oauth2
    flow: implicit
    authorizationUrl: ""
security:
  - google_id_token: []
paths:
  /orders:
    get:
      operationId: listOrders
    post:
      operationId: createOrder
      security:
        - api_key: []
  /health:
    get:
      operationId: health
      security: []
"#;

    #[test]
    fn test_routes_and_authorization() {
        let routes = routes_from_document(DOC).unwrap();
        assert_eq!(routes.len(), 2);

        let orders = &routes[0];
        assert_eq!(orders.path, "/orders");
        assert_eq!(orders.methods.len(), 2);
        assert_eq!(orders.methods[0].http_method, "GET");
        assert_eq!(orders.methods[0].authorization, "google_id_token");
        assert!(!orders.methods[0].api_key_required);
        assert_eq!(orders.methods[1].http_method, "POST");
        assert!(orders.methods[1].api_key_required);

        let health = &routes[1];
        assert_eq!(health.methods[0].authorization, "NONE");
    }

    #[test]
    fn test_document_without_paths() {
        assert!(routes_from_document("swagger: \"2.0\"").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_document() {
        assert!(routes_from_document("paths: [unterminated").is_err());
    }
}
