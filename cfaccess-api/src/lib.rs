//! The remote service as seen by cfaccess.
//!
//! [`AccessApi`] is the seam between the reconciliation engine and the
//! service that stores access applications. [`cloudflare::Client`] implements
//! it for Cloudflare Access; tests substitute their own implementations.

pub mod cloudflare;
pub mod error;
pub mod schema;

use async_trait::async_trait;
use cfaccess_core::model::{AppId, ApplicationSpec, Policy, PolicyId, RemotePolicy, Zone, ZoneId};

pub use error::ApiError;
pub use schema::AccessApplication;

/// Operations on the applications and policies of a zone.
///
/// Every call either completes or fails as a whole. Pagination, transport and
/// authentication are the implementation's business.
#[async_trait]
pub trait AccessApi: Send + Sync {
    /// Resolve a zone name to the identifier the service uses for it.
    async fn zone_id(&self, zone_name: &str) -> Result<ZoneId, ApiError>;

    async fn list_applications(&self, zone: &Zone) -> Result<Vec<AccessApplication>, ApiError>;

    /// The policies of an application, in the service's order.
    async fn list_policies(&self, zone: &Zone, app: &AppId)
        -> Result<Vec<RemotePolicy>, ApiError>;

    async fn create_application(
        &self,
        zone: &Zone,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError>;

    async fn update_application(
        &self,
        zone: &Zone,
        id: &AppId,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError>;

    /// Deleting an application also deletes its policies.
    async fn delete_application(&self, zone: &Zone, id: &AppId) -> Result<(), ApiError>;

    async fn create_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError>;

    async fn update_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        id: &PolicyId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError>;

    async fn delete_policy(&self, zone: &Zone, app: &AppId, id: &PolicyId)
        -> Result<(), ApiError>;
}
