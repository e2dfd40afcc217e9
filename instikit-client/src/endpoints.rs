//! Typed auth endpoints
//!
//! The session layer's collaborator endpoints, wrapped with their payload
//! shapes. The user payload is generic so this crate stays below the crate
//! that defines the identity model.

use crate::pipeline::ApiClient;
use instikit_core::InstikitResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Advisory role hint; the server is authoritative on role validity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Login response payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData<U> {
    pub token: String,
    pub user: U,
}

/// Server-confirmed profile changes
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

/// Auth endpoints of the institute API
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Exchange credentials for a bearer token and the server's view of the
    /// identity.
    pub async fn login<U: DeserializeOwned>(
        &self,
        request: &LoginRequest,
    ) -> InstikitResult<LoginData<U>> {
        self.client.post("/auth/login", request).await
    }

    /// Identity check for the currently attached credential.
    pub async fn me<U: DeserializeOwned>(&self) -> InstikitResult<U> {
        self.client.get("/auth/me").await
    }

    /// Apply profile changes; returns the server-confirmed identity.
    pub async fn update_profile<U: DeserializeOwned>(
        &self,
        update: &ProfileUpdate,
    ) -> InstikitResult<U> {
        self.client.patch("/auth/profile", update).await
    }
}
