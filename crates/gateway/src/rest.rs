//! Plain HTTP endpoints carried by the gateway.

use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Development-only session seeding, mirroring what the portal's auth
/// component does in production. Compiled out of release builds.
#[cfg(debug_assertions)]
pub mod dev {
    use std::sync::Arc;

    use axum::{extract::State, Json};
    use serde::{Deserialize, Serialize};

    use amicale_auth::MemberIdentity;

    use crate::state::GatewayState;

    #[derive(Debug, Deserialize)]
    pub struct DevSessionRequest {
        pub member_id: i64,
        pub first_name: String,
        pub last_name: String,
        #[serde(default = "default_role")]
        pub role: String,
    }

    fn default_role() -> String {
        "member".to_string()
    }

    #[derive(Debug, Serialize)]
    pub struct DevSessionResponse {
        pub token: String,
        pub member: MemberIdentity,
    }

    pub async fn create_dev_session(
        State(state): State<Arc<GatewayState>>,
        Json(request): Json<DevSessionRequest>,
    ) -> Json<DevSessionResponse> {
        let member = MemberIdentity {
            member_id: request.member_id,
            first_name: request.first_name,
            last_name: request.last_name,
            role: request.role,
        };

        let token = state.sessions.issue(member.clone()).await;
        Json(DevSessionResponse { token, member })
    }
}
