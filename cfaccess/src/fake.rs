//! In-memory [`AccessApi`] for tests, with a call log and failure injection.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use async_trait::async_trait;
use cfaccess_api::{AccessApi, AccessApplication, ApiError};
use cfaccess_core::model::{AppId, ApplicationSpec, Policy, PolicyId, RemotePolicy, Zone, ZoneId};

struct StoredApp {
    app: AccessApplication,
    policies: Vec<RemotePolicy>,
}

#[derive(Default)]
struct State {
    zones: BTreeMap<String, ZoneId>,
    apps: BTreeMap<ZoneId, Vec<StoredApp>>,
    next_id: u64,
    calls: Vec<String>,
    failures: BTreeSet<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    /// Log the call and fail it if a failure was injected for it.
    fn call(&mut self, key: String) -> Result<(), ApiError> {
        let fail = self.failures.contains(&key);
        self.calls.push(key);
        if fail {
            Err(ApiError::Status {
                status: 500,
                messages: vec!["injected failure".to_string()],
            })
        } else {
            Ok(())
        }
    }

    fn app_mut(&mut self, zone: &Zone, id: &AppId) -> Result<&mut StoredApp, ApiError> {
        self.apps
            .get_mut(&zone.id)
            .and_then(|apps| apps.iter_mut().find(|a| &a.app.id == id))
            .ok_or_else(not_found)
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        messages: vec!["not found".to_string()],
    }
}

/// Calls are logged as `<operation> <target>`, where the target is the zone
/// name, the application name on creation, `<app id>` or
/// `<app id>/<policy id or name>`. Failures are injected by the same keys.
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    pub fn new(zone_names: &[&str]) -> FakeApi {
        let mut state = State::default();
        for name in zone_names {
            let id = ZoneId(format!("zone-{}", name));
            state.zones.insert(name.to_string(), id.clone());
            state.apps.insert(id, Vec::new());
        }
        FakeApi {
            state: Mutex::new(state),
        }
    }

    pub fn zone(&self, name: &str) -> Zone {
        let state = self.state.lock().unwrap();
        Zone {
            name: name.to_string(),
            id: state.zones[name].clone(),
        }
    }

    pub fn insert_application(
        &self,
        zone: &Zone,
        name: &str,
        domain: &str,
        policies: Vec<Policy>,
    ) -> AppId {
        let mut state = self.state.lock().unwrap();
        let id = AppId(state.next_id("app-"));
        let policies: Vec<RemotePolicy> = policies
            .into_iter()
            .map(|policy| RemotePolicy {
                id: PolicyId(state.next_id("pol-")),
                policy,
            })
            .collect();
        let app = AccessApplication {
            id: id.clone(),
            name: name.to_string(),
            domain: domain.to_string(),
            session_duration: "24h".to_string(),
            aud: Some(format!("aud-{}", id)),
        };
        state
            .apps
            .get_mut(&zone.id)
            .unwrap()
            .push(StoredApp { app, policies });
        id
    }

    pub fn fail_on(&self, key: &str) {
        self.state.lock().unwrap().failures.insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// The calls that change remote state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list_") && !c.starts_with("zone_id"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Applications of a zone with their policies, in creation order.
    pub fn applications(&self, zone: &Zone) -> Vec<(AccessApplication, Vec<RemotePolicy>)> {
        let state = self.state.lock().unwrap();
        state.apps[&zone.id]
            .iter()
            .map(|a| (a.app.clone(), a.policies.clone()))
            .collect()
    }

    pub fn application(
        &self,
        zone: &Zone,
        name: &str,
    ) -> Option<(AccessApplication, Vec<RemotePolicy>)> {
        self.applications(zone)
            .into_iter()
            .find(|(app, _)| app.name == name)
    }
}

#[async_trait]
impl AccessApi for FakeApi {
    async fn zone_id(&self, zone_name: &str) -> Result<ZoneId, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("zone_id {}", zone_name))?;
        state
            .zones
            .get(zone_name)
            .cloned()
            .ok_or_else(|| ApiError::ZoneNotFound(zone_name.to_string()))
    }

    async fn list_applications(&self, zone: &Zone) -> Result<Vec<AccessApplication>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("list_applications {}", zone.name))?;
        Ok(state
            .apps
            .get(&zone.id)
            .map(|apps| apps.iter().map(|a| a.app.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_policies(&self, zone: &Zone, app: &AppId) -> Result<Vec<RemotePolicy>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("list_policies {}", app))?;
        Ok(state.app_mut(zone, app)?.policies.clone())
    }

    async fn create_application(
        &self,
        zone: &Zone,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("create_application {}", spec.name))?;
        let id = AppId(state.next_id("app-"));
        let app = AccessApplication {
            id: id.clone(),
            name: spec.name.clone(),
            domain: spec.domain.clone(),
            session_duration: spec.session_duration.clone(),
            aud: Some(format!("aud-{}", id)),
        };
        state
            .apps
            .get_mut(&zone.id)
            .ok_or_else(not_found)?
            .push(StoredApp {
                app: app.clone(),
                policies: Vec::new(),
            });
        Ok(app)
    }

    async fn update_application(
        &self,
        zone: &Zone,
        id: &AppId,
        spec: &ApplicationSpec,
    ) -> Result<AccessApplication, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("update_application {}", id))?;
        let stored = state.app_mut(zone, id)?;
        stored.app.name = spec.name.clone();
        stored.app.domain = spec.domain.clone();
        stored.app.session_duration = spec.session_duration.clone();
        Ok(stored.app.clone())
    }

    async fn delete_application(&self, zone: &Zone, id: &AppId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("delete_application {}", id))?;
        let apps = state.apps.get_mut(&zone.id).ok_or_else(not_found)?;
        let before = apps.len();
        apps.retain(|a| &a.app.id != id);
        if apps.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn create_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("create_policy {}/{}", app, policy.name))?;
        let id = PolicyId(state.next_id("pol-"));
        let created = RemotePolicy {
            id,
            policy: policy.clone(),
        };
        state.app_mut(zone, app)?.policies.push(created.clone());
        Ok(created)
    }

    async fn update_policy(
        &self,
        zone: &Zone,
        app: &AppId,
        id: &PolicyId,
        policy: &Policy,
    ) -> Result<RemotePolicy, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("update_policy {}/{}", app, id))?;
        let stored = state
            .app_mut(zone, app)?
            .policies
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(not_found)?;
        stored.policy = policy.clone();
        Ok(stored.clone())
    }

    async fn delete_policy(&self, zone: &Zone, app: &AppId, id: &PolicyId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.call(format!("delete_policy {}/{}", app, id))?;
        let policies = &mut state.app_mut(zone, app)?.policies;
        let before = policies.len();
        policies.retain(|p| &p.id != id);
        if policies.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}
