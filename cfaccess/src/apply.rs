//! Executing a [`Plan`] against the remote service.
//!
//! Operations run one at a time in a fixed order: application updates,
//! application deletes, application creates, policy updates, policy deletes,
//! policy creates. A failed operation is recorded as a warning and the rest
//! of the plan still runs. Nothing is rolled back.

use std::fmt::Display;

use cfaccess_api::{AccessApi, AccessApplication, ApiError};
use cfaccess_core::{
    event::{Action, Event, Recorder, Subject},
    model::Zone,
    plan::{
        ApplicationCreate, ApplicationDelete, ApplicationUpdate, DeleteReason, Plan,
        PolicyCreate, PolicyDelete, PolicyUpdate,
    },
    Error,
};
use tracing::{debug, instrument};

/// Outcome counts of one kind of item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged, {} failed",
            self.created, self.updated, self.deleted, self.unchanged, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applications: Counts,
    pub policies: Counts,
}

impl ApplySummary {
    pub fn failed(&self) -> usize {
        self.applications.failed + self.policies.failed
    }
}

impl std::ops::AddAssign for ApplySummary {
    fn add_assign(&mut self, other: ApplySummary) {
        for (a, b) in [
            (&mut self.applications, other.applications),
            (&mut self.policies, other.policies),
        ] {
            a.created += b.created;
            a.updated += b.updated;
            a.deleted += b.deleted;
            a.unchanged += b.unchanged;
            a.failed += b.failed;
        }
    }
}

impl Display for ApplySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "applications: {}; policies: {}",
            self.applications, self.policies
        )
    }
}

/// Turn a failed call into our error taxonomy. A 404 means the item is
/// already gone.
fn remote_error(operation: String, zone: &Zone, name: &str, e: ApiError) -> Error {
    match e {
        ApiError::Status { status: 404, .. } => Error::NotFound {
            zone: zone.name.clone(),
            name: name.to_string(),
        },
        e => Error::remote_call(operation, e),
    }
}

struct Applier<'a> {
    api: &'a dyn AccessApi,
    recorder: &'a dyn Recorder,
    summary: ApplySummary,
}

impl Applier<'_> {
    fn succeeded(&self, action: Action, zone: &Zone, subject: Subject, message: String) {
        self.recorder
            .record(Event::normal(action, zone, subject, message));
    }

    fn failed(&self, action: Action, zone: &Zone, subject: Subject, error: &Error) {
        self.recorder
            .record(Event::warning(action, zone, subject, error.to_string()));
    }

    async fn update_application(&mut self, update: &ApplicationUpdate) {
        let subject = Subject::Application {
            name: update.spec.name.clone(),
            id: Some(update.id.clone()),
        };
        match self
            .api
            .update_application(&update.zone, &update.id, &update.spec)
            .await
        {
            Ok(_) => {
                self.summary.applications.updated += 1;
                let changes: Vec<String> = update
                    .changed_fields()
                    .into_iter()
                    .map(|field| match field {
                        "domain" => format!(
                            "domain {} -> {}",
                            update.previous.domain, update.spec.domain
                        ),
                        _ => format!(
                            "session duration {} -> {}",
                            update.previous.session_duration, update.spec.session_duration
                        ),
                    })
                    .collect();
                self.succeeded(
                    Action::Update,
                    &update.zone,
                    subject,
                    format!("updated {}", changes.join(", ")),
                );
            }
            Err(e) => {
                self.summary.applications.failed += 1;
                let e = remote_error(
                    format!("update application {}", update.spec.name),
                    &update.zone,
                    &update.spec.name,
                    e,
                );
                self.failed(Action::Update, &update.zone, subject, &e);
            }
        }
    }

    async fn delete_application(&mut self, delete: &ApplicationDelete) {
        let subject = Subject::Application {
            name: delete.name.clone(),
            id: Some(delete.id.clone()),
        };
        match self.api.delete_application(&delete.zone, &delete.id).await {
            Ok(()) => {
                self.summary.applications.deleted += 1;
                let reason = match delete.reason {
                    DeleteReason::Orphaned => "no longer desired",
                    DeleteReason::Duplicate => "duplicate of another application",
                };
                self.succeeded(
                    Action::Delete,
                    &delete.zone,
                    subject,
                    format!("deleted, {}", reason),
                );
            }
            Err(e) => {
                let e = remote_error(
                    format!("delete application {}", delete.name),
                    &delete.zone,
                    &delete.name,
                    e,
                );
                if e.is_not_found() {
                    debug!(zone = %delete.zone, application = %delete.name, "already deleted");
                } else {
                    self.summary.applications.failed += 1;
                    self.failed(Action::Delete, &delete.zone, subject, &e);
                }
            }
        }
    }

    /// Returns the created application, whose identifier the policies of the
    /// create are bound to.
    async fn create_application(
        &mut self,
        create: &ApplicationCreate,
    ) -> Option<AccessApplication> {
        match self.api.create_application(&create.zone, &create.spec).await {
            Ok(app) => {
                self.summary.applications.created += 1;
                self.succeeded(
                    Action::Create,
                    &create.zone,
                    Subject::Application {
                        name: app.name.clone(),
                        id: Some(app.id.clone()),
                    },
                    format!(
                        "created with domain {} and session duration {}",
                        create.spec.domain, create.spec.session_duration
                    ),
                );
                Some(app)
            }
            Err(e) => {
                self.summary.applications.failed += 1;
                let e = remote_error(
                    format!("create application {}", create.spec.name),
                    &create.zone,
                    &create.spec.name,
                    e,
                );
                self.failed(
                    Action::Create,
                    &create.zone,
                    Subject::Application {
                        name: create.spec.name.clone(),
                        id: None,
                    },
                    &e,
                );
                None
            }
        }
    }

    async fn update_policy(&mut self, update: &PolicyUpdate) {
        let subject = Subject::Policy {
            app_id: update.app_id.clone(),
            name: update.policy.name.clone(),
            id: Some(update.id.clone()),
        };
        match self
            .api
            .update_policy(&update.zone, &update.app_id, &update.id, &update.policy)
            .await
        {
            Ok(_) => {
                self.summary.policies.updated += 1;
                self.succeeded(
                    Action::Update,
                    &update.zone,
                    subject,
                    format!(
                        "updated to {} at position {}",
                        update.policy.decision, update.position
                    ),
                );
            }
            Err(e) => {
                self.summary.policies.failed += 1;
                let e = remote_error(
                    format!("update policy {}", update.policy.name),
                    &update.zone,
                    &update.policy.name,
                    e,
                );
                self.failed(Action::Update, &update.zone, subject, &e);
            }
        }
    }

    async fn delete_policy(&mut self, delete: &PolicyDelete) {
        let subject = Subject::Policy {
            app_id: delete.app_id.clone(),
            name: delete.name.clone(),
            id: Some(delete.id.clone()),
        };
        match self
            .api
            .delete_policy(&delete.zone, &delete.app_id, &delete.id)
            .await
        {
            Ok(()) => {
                self.summary.policies.deleted += 1;
                self.succeeded(Action::Delete, &delete.zone, subject, "deleted".to_string());
            }
            Err(e) => {
                let e = remote_error(
                    format!("delete policy {}", delete.name),
                    &delete.zone,
                    &delete.name,
                    e,
                );
                if e.is_not_found() {
                    debug!(zone = %delete.zone, policy = %delete.name, "already deleted");
                } else {
                    self.summary.policies.failed += 1;
                    self.failed(Action::Delete, &delete.zone, subject, &e);
                }
            }
        }
    }

    async fn create_policy(&mut self, create: &PolicyCreate) {
        match self
            .api
            .create_policy(&create.zone, &create.app_id, &create.policy)
            .await
        {
            Ok(policy) => {
                self.summary.policies.created += 1;
                self.succeeded(
                    Action::Create,
                    &create.zone,
                    Subject::Policy {
                        app_id: create.app_id.clone(),
                        name: create.policy.name.clone(),
                        id: Some(policy.id),
                    },
                    format!(
                        "created {} at position {}",
                        create.policy.decision, create.position
                    ),
                );
            }
            Err(e) => {
                self.summary.policies.failed += 1;
                let e = remote_error(
                    format!("create policy {}", create.policy.name),
                    &create.zone,
                    &create.policy.name,
                    e,
                );
                self.failed(
                    Action::Create,
                    &create.zone,
                    Subject::Policy {
                        app_id: create.app_id.clone(),
                        name: create.policy.name.clone(),
                        id: None,
                    },
                    &e,
                );
            }
        }
    }

    fn record_unchanged(&mut self, plan: &Plan) {
        for app in &plan.applications.unchanged {
            self.summary.applications.unchanged += 1;
            self.succeeded(
                Action::Skip,
                &app.zone,
                Subject::Application {
                    name: app.name.clone(),
                    id: Some(app.id.clone()),
                },
                "up to date".to_string(),
            );
        }
        for policy in &plan.policies.unchanged {
            self.summary.policies.unchanged += 1;
            self.succeeded(
                Action::Skip,
                &policy.zone,
                Subject::Policy {
                    app_id: policy.app_id.clone(),
                    name: policy.name.clone(),
                    id: Some(policy.id.clone()),
                },
                "up to date".to_string(),
            );
        }
    }
}

/// Execute `plan`. Failures of individual operations are recorded and
/// counted; they never stop the remaining operations.
#[instrument(skip_all, fields(
    application_updates = plan.applications.updates.len(),
    application_deletes = plan.applications.deletes.len(),
    application_creates = plan.applications.creates.len(),
))]
pub async fn apply(api: &dyn AccessApi, recorder: &dyn Recorder, plan: Plan) -> ApplySummary {
    let mut applier = Applier {
        api,
        recorder,
        summary: ApplySummary::default(),
    };
    applier.record_unchanged(&plan);

    for update in &plan.applications.updates {
        applier.update_application(update).await;
    }
    for delete in &plan.applications.deletes {
        applier.delete_application(delete).await;
    }

    // Policies of an application that failed to be created are never tried
    let mut new_policies = Vec::new();
    for create in &plan.applications.creates {
        if let Some(app) = applier.create_application(create).await {
            new_policies.extend(create.policy_creates(&app.id));
        }
    }

    for update in &plan.policies.updates {
        applier.update_policy(update).await;
    }
    for delete in &plan.policies.deletes {
        applier.delete_policy(delete).await;
    }
    for create in plan.policies.creates.iter().chain(&new_policies) {
        applier.create_policy(create).await;
    }

    applier.summary
}
