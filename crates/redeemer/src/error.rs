use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use redemption_sdk::RedemptionError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedeemerError>;

#[derive(Error, Debug)]
pub enum RedeemerError {
    #[error("Redemption error: {0}")]
    Redemption(#[from] RedemptionError),
}

impl IntoResponse for RedeemerError {
    fn into_response(self) -> Response {
        let status = match &self {
            RedeemerError::Redemption(RedemptionError::SchedulerStopped) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RedeemerError::Redemption(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
