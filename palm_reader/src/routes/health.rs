use axum::response::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Status {
    status: &'static str,
}

pub async fn healthcheck() -> Json<Status> {
    Json(Status {
        status: "Available",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthcheck_reports_available() {
        let Json(status) = healthcheck().await;
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({ "status": "Available" })
        );
    }
}
