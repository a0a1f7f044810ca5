use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use libram_catalog::ItemType;
use libram_infra::command_dispatcher::DispatchError;
use libram_supply::AdjustDirection;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_item_type(s: &str) -> Result<ItemType, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "circulation" => Ok(ItemType::Circulation),
        "sale" => Ok(ItemType::Sale),
        "hybrid" => Ok(ItemType::Hybrid),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_item_type",
            "item_type must be one of: circulation, sale, hybrid",
        )),
    }
}

pub fn parse_direction(s: &str) -> Result<AdjustDirection, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "increase" => Ok(AdjustDirection::Increase),
        "decrease" => Ok(AdjustDirection::Decrease),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_action",
            "action must be one of: increase, decrease",
        )),
    }
}
