use serde_json::Value;

use super::{decode, expect_success, with_fallback, ClientError};
use crate::resilience::client::ResilientClient;
use crate::resilience::transport::OutboundRequest;

const DEPENDENCY: &str = "bookings";

/// Whether `user_id` has, or had, a booking for `room_id`.
pub async fn user_has_booking_for_room(
    client: &ResilientClient,
    user_id: i64,
    room_id: i64,
) -> Result<bool, ClientError> {
    let result = check(client, user_id, room_id).await;
    with_fallback(client, "user_has_booking_for_room", result, true)
}

async fn check(client: &ResilientClient, user_id: i64, room_id: i64) -> Result<bool, ClientError> {
    let request = OutboundRequest::get(format!("/admin/bookings/user/{user_id}/room/{room_id}"));
    let response = client.call_as_service(DEPENDENCY, request).await?;
    expect_success(DEPENDENCY, &response)?;
    let bookings: Vec<Value> = decode(DEPENDENCY, &response)?;
    Ok(!bookings.is_empty())
}
