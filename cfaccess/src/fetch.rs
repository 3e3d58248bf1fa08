//! Fetching the remote state that one cycle plans against.

use std::collections::BTreeSet;

use cfaccess_api::AccessApi;
use cfaccess_core::model::{DerivedName, OwnerId, ParsedName, Zone, ZoneDirectory, ZoneState};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub zones: Vec<ZoneState>,
    /// Zones whose applications could not be listed.
    pub unobserved: Vec<Zone>,
}

impl Observation {
    pub fn is_observed(&self, zone: &Zone) -> bool {
        !self.unobserved.contains(zone)
    }

    /// Forget the applications named in `held`, so that nothing is planned for
    /// them.
    pub fn without(mut self, held: &BTreeSet<DerivedName>) -> Observation {
        if held.is_empty() {
            return self;
        }
        for zone in &mut self.zones {
            zone.applications
                .retain(|app| !held.iter().any(|name| name == app.name.as_str()));
        }
        self
    }
}

/// List the applications of every zone, and the policies of the ones owned by
/// `owner`. With `only`, the snapshot is restricted to applications of that
/// name.
///
/// A zone that cannot be listed is reported as unobserved. An application
/// whose policies cannot be listed is observed without policies.
#[instrument(skip_all, fields(owner = %owner))]
pub async fn observe(
    api: &dyn AccessApi,
    owner: &OwnerId,
    zones: &ZoneDirectory,
    only: Option<&DerivedName>,
) -> Observation {
    let mut observation = Observation::default();
    for zone in zones.iter() {
        let applications = match api.list_applications(zone).await {
            Ok(applications) => applications,
            Err(e) => {
                warn!(zone = %zone, error = %e, "cannot list applications, skipping zone this cycle");
                observation.unobserved.push(zone.clone());
                continue;
            }
        };

        let mut state = ZoneState {
            zone: zone.clone(),
            applications: Vec::new(),
        };
        for app in applications {
            if let Some(only) = only {
                if only != app.name.as_str() {
                    continue;
                }
            }
            let policies = if ParsedName::parse(&app.name).is_owned_by(owner) {
                match api.list_policies(zone, &app.id).await {
                    Ok(policies) => Some(policies),
                    Err(e) => {
                        warn!(zone = %zone, application = %app.name, error = %e,
                            "cannot list policies, leaving them as they are this cycle");
                        None
                    }
                }
            } else {
                None
            };
            state.applications.push(app.into_remote(zone, policies));
        }
        debug!(zone = %zone, applications = state.applications.len(), "observed zone");
        observation.zones.push(state);
    }
    observation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeApi;
    use cfaccess_core::model::Policy;

    fn set_up() -> (FakeApi, ZoneDirectory) {
        let api = FakeApi::new(&["example.com", "example.org"]);
        let zones =
            ZoneDirectory::new(vec![api.zone("example.com"), api.zone("example.org")]).unwrap();
        (api, zones)
    }

    fn allow() -> Policy {
        Policy {
            decision: "allow".to_string(),
            name: "policy-0".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_policies_fetched_for_owned_only() {
        let (api, zones) = set_up();
        let com = api.zone("example.com");
        let ours = api.insert_application(&com, "c1-ns-ing1", "a.example.com/", vec![allow()]);
        let theirs = api.insert_application(&com, "c2-ns-ing1", "b.example.com/", vec![allow()]);
        api.insert_application(&com, "DummyAccessApp", "c.example.com/", vec![]);

        let owner = OwnerId::new("c1").unwrap();
        let observation = observe(&api, &owner, &zones, None).await;

        assert!(observation.unobserved.is_empty());
        assert_eq!(observation.zones.len(), 2);
        let apps = &observation.zones[0].applications;
        assert_eq!(apps.len(), 3);
        assert_eq!(apps[0].policies.as_ref().map(|p| p.len()), Some(1));
        assert!(apps[1].policies.is_none());
        assert!(apps[2].policies.is_none());
        assert!(api.calls().contains(&format!("list_policies {}", ours)));
        assert!(!api.calls().contains(&format!("list_policies {}", theirs)));
    }

    #[tokio::test]
    async fn test_unlistable_zone_is_unobserved() {
        let (api, zones) = set_up();
        api.fail_on("list_applications example.org");

        let owner = OwnerId::new("c1").unwrap();
        let observation = observe(&api, &owner, &zones, None).await;

        assert_eq!(observation.zones.len(), 1);
        assert_eq!(observation.unobserved, vec![api.zone("example.org")]);
        assert!(observation.is_observed(&api.zone("example.com")));
        assert!(!observation.is_observed(&api.zone("example.org")));
    }

    #[tokio::test]
    async fn test_policy_listing_failure() {
        let (api, zones) = set_up();
        let com = api.zone("example.com");
        let id = api.insert_application(&com, "c1-ns-ing1", "a.example.com/", vec![allow()]);
        api.fail_on(&format!("list_policies {}", id));

        let owner = OwnerId::new("c1").unwrap();
        let observation = observe(&api, &owner, &zones, None).await;

        let app = &observation.zones[0].applications[0];
        assert_eq!(app.id, id);
        assert!(app.policies.is_none());
    }

    #[tokio::test]
    async fn test_only_and_without() {
        let (api, zones) = set_up();
        let com = api.zone("example.com");
        let org = api.zone("example.org");
        api.insert_application(&com, "c1-ns-ing1", "a.example.com/", vec![]);
        api.insert_application(&com, "c1-ns-ing2", "b.example.com/", vec![]);
        api.insert_application(&org, "c1-ns-ing1", "a.example.org/", vec![]);

        let owner = OwnerId::new("c1").unwrap();
        let name = DerivedName::new(&owner, "ns", "ing1");
        let observation = observe(&api, &owner, &zones, Some(&name)).await;
        let names: Vec<&str> = observation
            .zones
            .iter()
            .flat_map(|z| z.applications.iter().map(|a| a.name.as_str()))
            .collect();
        assert_eq!(names, vec!["c1-ns-ing1", "c1-ns-ing1"]);

        let held = BTreeSet::from([name]);
        let observation = observation.without(&held);
        assert!(observation.zones.iter().all(|z| z.applications.is_empty()));
    }
}
