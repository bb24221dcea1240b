use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Error,
}

/// Readiness of the two dependencies the messaging core cannot run without.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: ComponentStatus,
    /// Message store (Postgres).
    pub database: ComponentStatus,
    /// Bucket holding message images.
    pub image_storage: ComponentStatus,
}

impl ReadinessResponse {
    #[must_use]
    pub fn new(database: ComponentStatus, image_storage: ComponentStatus) -> Self {
        let ready = database == ComponentStatus::Ok && image_storage == ComponentStatus::Ok;
        Self { status: if ready { ComponentStatus::Ok } else { ComponentStatus::Error }, database, image_storage }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == ComponentStatus::Ok
    }
}
