use serde::Deserialize;
use serde_json::Value;

use super::{decode, expect_success, with_fallback, ClientError};
use crate::resilience::client::ResilientClient;
use crate::resilience::transport::OutboundRequest;

const DEPENDENCY: &str = "rooms";

#[derive(Debug, Deserialize)]
struct RoomStatus {
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "active".to_string()
}

/// Fetch a room record. `None` when the room does not exist.
pub async fn get_room(client: &ResilientClient, room_id: i64) -> Result<Option<Value>, ClientError> {
    let result = fetch_room(client, room_id).await;
    with_fallback(client, "get_room", result, None)
}

async fn fetch_room(client: &ResilientClient, room_id: i64) -> Result<Option<Value>, ClientError> {
    let request = OutboundRequest::get(format!("/api/v1/rooms/{room_id}"));
    let response = client.call_as_service(DEPENDENCY, request).await?;
    if response.status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    expect_success(DEPENDENCY, &response)?;
    decode(DEPENDENCY, &response).map(Some)
}

/// Whether the room exists and is open for bookings and reviews.
///
/// Unknown rooms are inactive; a record without a status is active.
pub async fn is_room_active(client: &ResilientClient, room_id: i64) -> Result<bool, ClientError> {
    let result = check_active(client, room_id).await;
    with_fallback(client, "is_room_active", result, true)
}

async fn check_active(client: &ResilientClient, room_id: i64) -> Result<bool, ClientError> {
    let request = OutboundRequest::get(format!("/rooms/{room_id}"));
    let response = client.call_as_service(DEPENDENCY, request).await?;
    if response.status == reqwest::StatusCode::NOT_FOUND {
        return Ok(false);
    }
    expect_success(DEPENDENCY, &response)?;
    let room: RoomStatus = decode(DEPENDENCY, &response)?;
    Ok(room.status == "active")
}
