//! GraphQL execution engine.
//!
//! This module owns the schema and its resolvers, and maps canonical HTTP
//! requests onto GraphQL-over-HTTP (POST JSON bodies and GET query strings).

mod schema;
pub mod types;

use async_graphql::parser::types::OperationType;
use http::{Method, StatusCode};

use crate::gateway::{RequestContext, ResponseContext};

pub use schema::{build_schema, GatewaySchema, MutationRoot, QueryRoot, SharedProvider};
pub use types::Envelope;

/// Execute one GraphQL-over-HTTP request against `schema`.
pub async fn execute_http(schema: &GatewaySchema, ctx: &RequestContext) -> ResponseContext {
    let request = match decode_request(ctx) {
        Ok(request) => request,
        Err(message) => return graphql_error(StatusCode::BAD_REQUEST, &message),
    };

    if ctx.method == Method::GET && selects_mutation(&request) {
        return graphql_error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Mutations cannot be executed over GET; use POST",
        );
    }

    let operation = request.operation_name.clone();
    let response = schema.execute(request).await;

    let status = if matches!(response.data, async_graphql::Value::Null) && response.is_err() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    if response.is_err() {
        tracing::warn!(
            operation = ?operation,
            errors = response.errors.len(),
            first = %response.errors[0].message,
            "GraphQL request returned errors"
        );
    }

    ResponseContext::json(status, &response)
}

/// Decode the GraphQL request from a POST body or GET query parameters.
fn decode_request(ctx: &RequestContext) -> Result<async_graphql::Request, String> {
    if ctx.method == Method::POST {
        return ctx
            .json::<async_graphql::Request>()
            .map_err(|e| format!("Invalid GraphQL request body: {}", e));
    }

    let query = ctx
        .query
        .get("query")
        .ok_or_else(|| "Missing 'query' parameter".to_string())?;

    let mut request = async_graphql::Request::new(query.as_str());

    if let Some(name) = ctx.query.get("operationName").filter(|n| !n.is_empty()) {
        request = request.operation_name(name.as_str());
    }

    if let Some(raw) = ctx.query.get("variables").filter(|v| !v.is_empty()) {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| format!("Invalid 'variables' parameter: {}", e))?;
        request = request.variables(async_graphql::Variables::from_json(value));
    }

    Ok(request)
}

/// Whether the operation the request would run is a mutation.
///
/// Unparseable documents return `false` and are reported by execution.
fn selects_mutation(request: &async_graphql::Request) -> bool {
    let Ok(document) = async_graphql::parser::parse_query(&request.query) else {
        return false;
    };

    document
        .operations
        .iter()
        .filter(|(name, _)| match request.operation_name.as_deref() {
            Some(wanted) => name.map(|n| n.as_str() == wanted).unwrap_or(false),
            None => true,
        })
        .any(|(_, operation)| operation.node.ty == OperationType::Mutation)
}

fn graphql_error(status: StatusCode, message: &str) -> ResponseContext {
    ResponseContext::json(
        status,
        &serde_json::json!({ "errors": [{ "message": message }] }),
    )
}
