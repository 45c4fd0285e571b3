// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that all backends implement.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{BackendKind, HealthStatus};

/// Identity and health probing shared by every backend.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Returns the human-readable name of this backend instance.
    fn name(&self) -> &str;

    /// Returns which capability this backend provides.
    fn kind(&self) -> BackendKind;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, CourierError>;
}
