use async_trait::async_trait;
use cfaccess_core::model::{AppId, ApplicationSpec, Policy, PolicyId, RemotePolicy, Zone, ZoneId};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    schema::{AccessApplication, ApplicationBody, Envelope, ZoneRecord},
    AccessApi, ApiError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

const DEFAULT_PER_PAGE: u32 = 50;

/// Cloudflare Access, zone-level applications, authenticated with an API
/// token.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
    per_page: u32,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(token: String) -> Self {
        Client {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: Envelope<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    messages: vec![String::from_utf8_lossy(&body).into_owned()],
                })
            }
        };
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                messages: envelope.error_messages(),
            });
        }
        if !envelope.success {
            return Err(ApiError::Rejected(envelope.error_messages()));
        }
        Ok(envelope)
    }

    async fn send_result<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send(request).await?.result.ok_or(ApiError::MissingResult)
    }

    /// Collect all pages of a list endpoint.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let request = self
                .request(Method::GET, path)
                .query(&[("page", page), ("per_page", self.per_page)]);
            let envelope: Envelope<Vec<T>> = self.send(request).await?;
            let batch = envelope.result.unwrap_or_default();
            let batch_len = batch.len();
            items.extend(batch);

            let last = match envelope.result_info.and_then(|i| i.total_pages) {
                Some(total_pages) => page >= total_pages,
                None => batch_len < self.per_page as usize,
            };
            if last || batch_len == 0 {
                return Ok(items);
            }
            page += 1;
        }
    }
}

fn apps_path(zone: &Zone) -> String {
    format!("/zones/{}/access/apps", zone.id)
}

fn app_path(zone: &Zone, app: &AppId) -> String {
    format!("/zones/{}/access/apps/{}", zone.id, app)
}

fn policies_path(zone: &Zone, app: &AppId) -> String {
    format!("/zones/{}/access/apps/{}/policies", zone.id, app)
}

fn policy_path(zone: &Zone, app: &AppId, policy: &PolicyId) -> String {
    format!("/zones/{}/access/apps/{}/policies/{}", zone.id, app, policy)
}

#[async_trait]
impl AccessApi for Client {
    async fn zone_id(&self, zone_name: &str) -> Result<ZoneId, ApiError> {
        let request = self
            .request(Method::GET, "/zones")
            .query(&[("name", zone_name)]);
        let zones: Vec<ZoneRecord> = self.send_result(request).await?;
        zones
            .into_iter()
            .find(|z| z.name == zone_name)
            .map(|z| ZoneId(z.id))
            .ok_or_else(|| ApiError::ZoneNotFound(zone_name.to_string()))
    }

    async fn list_applications(&self, zone: &Zone) -> Result<Vec<AccessApplication>, ApiError> {
        self.list_all(&apps_path(zone)).await
    }

    async fn list_policies(
        &self,
        zone: &Zone,
        app: &AppId,
    ) -> Result<Vec<RemotePolicy>, ApiError> {
        self.list_all(&policies_path(zone, app)).await
    }

    async fn create_application(
        &self,
        zone: &Zone,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError> {
        let request = self
            .request(Method::POST, &apps_path(zone))
            .json(&ApplicationBody::from(spec));
        self.send_result(request).await
    }

    async fn update_application(
        &self,
        zone: &Zone,
        id: &AppId,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError> {
        let request = self
            .request(Method::PUT, &app_path(zone, id))
            .json(&ApplicationBody::from(spec));
        self.send_result(request).await
    }

    async fn delete_application(&self, zone: &Zone, id: &AppId) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &app_path(zone, id));
        self.send::<Value>(request).await.map(|_| ())
    }

    async fn create_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError> {
        let request = self
            .request(Method::POST, &policies_path(zone, app))
            .json(policy);
        self.send_result(request).await
    }

    async fn update_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        id: &PolicyId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError> {
        let request = self
            .request(Method::PUT, &policy_path(zone, app, id))
            .json(policy);
        self.send_result(request).await
    }

    async fn delete_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        id: &PolicyId,
    ) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &policy_path(zone, app, id));
        self.send::<Value>(request).await.map(|_| ())
    }
}
