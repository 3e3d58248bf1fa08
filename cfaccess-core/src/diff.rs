//! Plan computation.
//!
//! [`diff`] compares the desired applications with what was observed
//! remotely and returns the operations that make the remote side match. It
//! performs no I/O and only borrows its inputs.
//!
//! Applications are matched by derived name within a zone. Policies have no
//! stable key at all and are matched by position: reordering the desired
//! policies turns into updates for every position that moved.

use std::collections::BTreeMap;

use crate::{
    model::{policy_name, DesiredApplication, OwnerId, RemoteApplication, RemotePolicy, ZoneState},
    plan::{
        ApplicationCreate, ApplicationDelete, ApplicationUnchanged, ApplicationUpdate,
        DeleteReason, Plan, PolicyCreate, PolicyDelete, PolicyPlan, PolicyUnchanged,
        PolicyUpdate,
    },
};

/// Compute the plan that brings the observed zones in line with `desired`.
///
/// Remote applications that are not owned by `owner` are ignored. Desired
/// applications that no remote application claims are planned for creation,
/// regardless of whether their zone was observed; callers leave out desired
/// applications for zones they could not observe.
pub fn diff(owner: &OwnerId, desired: &[DesiredApplication], observed: &[ZoneState]) -> Plan {
    // (zone name, derived name) -> index into `desired`
    let index: BTreeMap<(&str, String), usize> = desired
        .iter()
        .enumerate()
        .map(|(i, d)| ((d.zone.name.as_str(), d.derived_name().to_string()), i))
        .collect();
    let mut claimed = vec![false; desired.len()];
    let mut plan = Plan::default();

    for zone_state in observed {
        for remote in &zone_state.applications {
            if !remote.parsed_name().is_owned_by(owner) {
                continue;
            }
            let key = (zone_state.zone.name.as_str(), remote.name.clone());
            match index.get(&key) {
                Some(&i) if !claimed[i] => {
                    claimed[i] = true;
                    diff_application(&desired[i], remote, &mut plan);
                }
                Some(_) => plan.applications.deletes.push(ApplicationDelete {
                    zone: zone_state.zone.clone(),
                    id: remote.id.clone(),
                    name: remote.name.clone(),
                    reason: DeleteReason::Duplicate,
                }),
                None => plan.applications.deletes.push(ApplicationDelete {
                    zone: zone_state.zone.clone(),
                    id: remote.id.clone(),
                    name: remote.name.clone(),
                    reason: DeleteReason::Orphaned,
                }),
            }
        }
    }

    for (d, _) in desired.iter().zip(claimed).filter(|(_, c)| !c) {
        plan.applications.creates.push(ApplicationCreate {
            zone: d.zone.clone(),
            spec: d.spec(),
            policies: d.policies.clone(),
        });
    }

    plan
}

fn diff_application(desired: &DesiredApplication, remote: &RemoteApplication, plan: &mut Plan) {
    if desired.domain != remote.domain || desired.session_duration != remote.session_duration {
        plan.applications.updates.push(ApplicationUpdate {
            zone: remote.zone.clone(),
            id: remote.id.clone(),
            spec: desired.spec(),
            previous: remote.spec(),
        });
    } else {
        plan.applications.unchanged.push(ApplicationUnchanged {
            zone: remote.zone.clone(),
            id: remote.id.clone(),
            name: remote.name.clone(),
        });
    }

    // Without a fetched policy list we can't tell what to change
    if let Some(remote_policies) = &remote.policies {
        diff_policies(desired, remote, remote_policies, &mut plan.policies);
    }
}

/// Positional comparison. Pairs at the same index are updated when they
/// differ; the longer list's tail is created or deleted.
fn diff_policies(
    desired: &DesiredApplication,
    remote: &RemoteApplication,
    remote_policies: &[RemotePolicy],
    plan: &mut PolicyPlan,
) {
    for (position, (want, have)) in desired.policies.iter().zip(remote_policies).enumerate() {
        if want.same_rules(&have.policy) {
            plan.unchanged.push(PolicyUnchanged {
                zone: remote.zone.clone(),
                app_id: remote.id.clone(),
                id: have.id.clone(),
                name: have.policy.name.clone(),
            });
        } else {
            plan.updates.push(PolicyUpdate {
                zone: remote.zone.clone(),
                app_id: remote.id.clone(),
                id: have.id.clone(),
                position,
                policy: want.renamed(have.policy.name.clone()),
            });
        }
    }

    let paired = desired.policies.len().min(remote_policies.len());

    for (position, want) in desired.policies.iter().enumerate().skip(paired) {
        plan.creates.push(PolicyCreate {
            zone: remote.zone.clone(),
            app_id: remote.id.clone(),
            position,
            policy: want.renamed(policy_name(position)),
        });
    }

    for have in &remote_policies[paired..] {
        plan.deletes.push(PolicyDelete {
            zone: remote.zone.clone(),
            app_id: remote.id.clone(),
            id: have.id.clone(),
            name: have.policy.name.clone(),
        });
    }
}
