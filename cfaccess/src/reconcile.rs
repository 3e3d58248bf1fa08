//! Reconciliation cycles: extract, observe, diff, apply.

use std::{collections::BTreeSet, sync::Arc};

use cfaccess_api::AccessApi;
use cfaccess_core::{
    diff::diff,
    event::{Action, Event, EventKind, Recorder},
    model::{DerivedName, DesiredApplication},
    plan::Plan,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    apply::{apply, ApplySummary},
    extract::Extractor,
    fetch::{observe, Observation},
    source::SourceObject,
};

/// Logs every event as a tracing record.
pub struct TracingRecorder;

impl Recorder for TracingRecorder {
    fn record(&self, event: Event) {
        match (event.kind, event.action) {
            (EventKind::Normal, Action::Skip) => debug!(
                zone = %event.zone,
                action = %event.action,
                subject = %event.subject,
                "{}",
                event.message
            ),
            (EventKind::Normal, _) => info!(
                zone = %event.zone,
                action = %event.action,
                subject = %event.subject,
                "{}",
                event.message
            ),
            (EventKind::Warning, _) => warn!(
                zone = %event.zone,
                action = %event.action,
                subject = %event.subject,
                "{}",
                event.message
            ),
        }
    }
}

/// Desired applications extracted from a set of objects.
#[derive(Debug, Default)]
struct Desired {
    applications: Vec<DesiredApplication>,
    /// Names of objects that could not be extracted. Their remote
    /// applications are left alone until the objects are fixed.
    held: BTreeSet<DerivedName>,
}

pub struct Reconciler {
    api: Arc<dyn AccessApi>,
    recorder: Arc<dyn Recorder>,
    extractor: Extractor,
}

impl Reconciler {
    pub fn new(api: Arc<dyn AccessApi>, recorder: Arc<dyn Recorder>, extractor: Extractor) -> Self {
        Reconciler {
            api,
            recorder,
            extractor,
        }
    }

    fn desired(&self, objects: &[SourceObject]) -> Desired {
        let mut desired = Desired::default();
        for object in objects {
            match self.extractor.extract(object) {
                Ok(Some(app)) => desired.applications.push(app),
                Ok(None) => {}
                Err(e) => {
                    warn!(object = %object, error = %e, "cannot extract application, leaving it as it is");
                    desired
                        .held
                        .insert(self.extractor.derived_name(&object.namespace, &object.name));
                }
            }
        }
        desired
    }

    fn plan_against(&self, desired: Desired, observation: Observation) -> Plan {
        let observation = observation.without(&desired.held);
        let applications: Vec<DesiredApplication> = desired
            .applications
            .into_iter()
            .filter(|app| {
                let observed = observation.is_observed(&app.zone);
                if !observed {
                    debug!(application = %app.derived_name(), zone = %app.zone, "zone not observed, not planning");
                }
                observed
            })
            .collect();
        diff(self.extractor.owner(), &applications, &observation.zones)
    }

    /// The plan that would bring every zone in line with `objects`.
    #[instrument(skip_all, fields(objects = objects.len()))]
    pub async fn plan(&self, objects: &[SourceObject]) -> Plan {
        let desired = self.desired(objects);
        let observation = observe(
            &*self.api,
            self.extractor.owner(),
            self.extractor.zones(),
            None,
        )
        .await;
        self.plan_against(desired, observation)
    }

    /// One full cycle: every owned application not described by `objects`
    /// is deleted.
    #[instrument(skip_all, fields(objects = objects.len()))]
    pub async fn sync(&self, objects: &[SourceObject]) -> ApplySummary {
        let plan = self.plan(objects).await;
        apply(&*self.api, &*self.recorder, plan).await
    }

    /// Reconcile the application of a single object, leaving all others
    /// alone. A live object without the sub-domain annotation is not ours and
    /// is skipped. An object that is being deleted has its application
    /// deleted.
    #[instrument(skip_all, fields(object = %object))]
    pub async fn reconcile_object(&self, object: &SourceObject) -> ApplySummary {
        let desired = self.desired(std::slice::from_ref(object));
        if !desired.held.is_empty() {
            return ApplySummary::default();
        }
        if desired.applications.is_empty() && object.deletion_timestamp.is_none() {
            debug!("no application requested, skipping");
            return ApplySummary::default();
        }
        let name = self
            .extractor
            .derived_name(&object.namespace, &object.name);
        let observation = observe(
            &*self.api,
            self.extractor.owner(),
            self.extractor.zones(),
            Some(&name),
        )
        .await;
        let plan = self.plan_against(desired, observation);
        apply(&*self.api, &*self.recorder, plan).await
    }

    /// Delete the application of an object that no longer exists, in
    /// whichever zone it is.
    #[instrument(skip(self))]
    pub async fn delete_object(&self, namespace: &str, name: &str) -> ApplySummary {
        let name = self.extractor.derived_name(namespace, name);
        let observation = observe(
            &*self.api,
            self.extractor.owner(),
            self.extractor.zones(),
            Some(&name),
        )
        .await;
        if observation
            .zones
            .iter()
            .all(|zone| zone.applications.is_empty())
        {
            debug!(application = %name, "not found, nothing to delete");
            return ApplySummary::default();
        }
        let plan = diff(self.extractor.owner(), &[], &observation.zones);
        apply(&*self.api, &*self.recorder, plan).await
    }
}
