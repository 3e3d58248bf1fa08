//! The operations one reconciliation cycle intends to perform.
//!
//! A [`Plan`] is computed by [`crate::diff::diff`], consumed once by the
//! applier and then dropped. Besides the operations it records the items that
//! were found to be up to date, so that skips are as observable as changes.

use serde::Serialize;

use crate::model::{policy_name, AppId, ApplicationSpec, Policy, PolicyId, Zone};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Plan {
    pub applications: ApplicationPlan,
    pub policies: PolicyPlan,
}

impl Plan {
    /// True when applying the plan would not call the remote service.
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.policies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ApplicationPlan {
    pub creates: Vec<ApplicationCreate>,
    pub updates: Vec<ApplicationUpdate>,
    pub deletes: Vec<ApplicationDelete>,
    pub unchanged: Vec<ApplicationUnchanged>,
}

impl ApplicationPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationCreate {
    pub zone: Zone,
    pub spec: ApplicationSpec,
    /// Desired policies, in order. They are created once the application
    /// exists and has an identifier.
    pub policies: Vec<Policy>,
}

impl ApplicationCreate {
    /// The policy creations that follow once the application exists as
    /// `app_id`.
    pub fn policy_creates(&self, app_id: &AppId) -> Vec<PolicyCreate> {
        self.policies
            .iter()
            .enumerate()
            .map(|(position, policy)| PolicyCreate {
                zone: self.zone.clone(),
                app_id: app_id.clone(),
                position,
                policy: policy.renamed(policy_name(position)),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationUpdate {
    pub zone: Zone,
    pub id: AppId,
    pub spec: ApplicationSpec,
    /// What the remote service had before the update.
    pub previous: ApplicationSpec,
}

impl ApplicationUpdate {
    /// Names of the fields that the update changes.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.spec.domain != self.previous.domain {
            fields.push("domain");
        }
        if self.spec.session_duration != self.previous.session_duration {
            fields.push("session_duration");
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// No desired application has this name.
    Orphaned,
    /// Another remote application in the same zone already matched the
    /// desired application of this name.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationDelete {
    pub zone: Zone,
    pub id: AppId,
    pub name: String,
    pub reason: DeleteReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationUnchanged {
    pub zone: Zone,
    pub id: AppId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PolicyPlan {
    pub creates: Vec<PolicyCreate>,
    pub updates: Vec<PolicyUpdate>,
    pub deletes: Vec<PolicyDelete>,
    pub unchanged: Vec<PolicyUnchanged>,
}

impl PolicyPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyCreate {
    pub zone: Zone,
    pub app_id: AppId,
    /// Position in the desired policy list.
    pub position: usize,
    /// Carries the generated name.
    pub policy: Policy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyUpdate {
    pub zone: Zone,
    pub app_id: AppId,
    pub id: PolicyId,
    pub position: usize,
    /// Desired decision and rules under the remote policy's name.
    pub policy: Policy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDelete {
    pub zone: Zone,
    pub app_id: AppId,
    pub id: PolicyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyUnchanged {
    pub zone: Zone,
    pub app_id: AppId,
    pub id: PolicyId,
    pub name: String,
}
