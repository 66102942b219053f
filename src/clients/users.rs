use serde_json::Value;

use super::{decode, expect_success, with_fallback, ClientError};
use crate::resilience::client::ResilientClient;
use crate::resilience::transport::OutboundRequest;

const DEPENDENCY: &str = "users";

/// Fetch a user record. `None` when the user does not exist.
pub async fn get_user(client: &ResilientClient, user_id: i64) -> Result<Option<Value>, ClientError> {
    let result = fetch(client, user_id).await;
    with_fallback(client, "get_user", result, None)
}

async fn fetch(client: &ResilientClient, user_id: i64) -> Result<Option<Value>, ClientError> {
    let request = OutboundRequest::get(format!("/api/v1/users/id/{user_id}"));
    let response = client.call_as_service(DEPENDENCY, request).await?;
    if response.status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    expect_success(DEPENDENCY, &response)?;
    decode(DEPENDENCY, &response).map(Some)
}
