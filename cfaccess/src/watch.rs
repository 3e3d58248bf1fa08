use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{info, info_span, warn, Instrument as _};

use crate::{interrupt::InterruptState, reconcile::Reconciler, source};

/// How often an interrupt is noticed while waiting for the next cycle.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Run a full sync against the objects in `file` every `interval` until
/// interrupted. The file is re-read for every cycle. A cycle that cannot read
/// it is skipped.
pub async fn watch(
    reconciler: &Reconciler,
    file: &str,
    interval: Duration,
    interrupt: &InterruptState,
) -> Result<()> {
    if file == "-" {
        bail!("watch needs a file to re-read; stdin can only be read once");
    }
    let mut cycle: u64 = 0;
    while !interrupt.is_interrupted() {
        cycle += 1;
        async {
            match source::read_objects(file) {
                Ok(objects) => {
                    let summary = reconciler.sync(&objects).await;
                    info!(%summary, "cycle finished");
                }
                Err(e) => warn!(error = %format!("{:#}", e), "skipping cycle"),
            }
        }
        .instrument(info_span!("cycle", cycle))
        .await;
        wait(interval, interrupt).await;
    }
    info!(cycles = cycle, "stopped");
    Ok(())
}

async fn wait(interval: Duration, interrupt: &InterruptState) {
    let deadline = tokio::time::Instant::now() + interval;
    while !interrupt.is_interrupted() {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep((deadline - now).min(POLL_INTERVAL)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        extract::{Extractor, DEFAULT_ANNOTATION_PREFIX},
        fake::FakeApi,
        reconcile::TracingRecorder,
    };
    use cfaccess_core::model::{OwnerId, ZoneDirectory};
    use std::sync::Arc;

    fn reconciler(api: &Arc<FakeApi>) -> Reconciler {
        let zones = ZoneDirectory::new(vec![api.zone("example.com")]).unwrap();
        let extractor =
            Extractor::new(DEFAULT_ANNOTATION_PREFIX, OwnerId::new("c1").unwrap(), zones);
        Reconciler::new(api.clone(), Arc::new(TracingRecorder), extractor)
    }

    #[tokio::test]
    async fn test_stdin_is_rejected() {
        let api = Arc::new(FakeApi::new(&["example.com"]));
        let interrupt = InterruptState::new();
        let r = watch(&reconciler(&api), "-", Duration::from_secs(60), &interrupt).await;
        assert!(r.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_until_interrupted() {
        let api = Arc::new(FakeApi::new(&["example.com"]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingresses.json");
        std::fs::write(
            &path,
            r#"{"items": [{"metadata": {"name": "ing1", "namespace": "ns",
                "annotations": {"access.cloudflare.com/application-sub-domain": "a"}}}]}"#,
        )
        .unwrap();

        let reconciler = reconciler(&api);
        let interrupt = InterruptState::new();
        let stopper = {
            let interrupt = interrupt.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(90)).await;
                interrupt.set_interrupted();
            }
        };
        let (result, ()) = tokio::join!(
            watch(
                &reconciler,
                path.to_str().unwrap(),
                Duration::from_secs(60),
                &interrupt
            ),
            stopper
        );

        result.unwrap();
        let lists = api
            .calls()
            .into_iter()
            .filter(|c| c == "list_applications example.com")
            .count();
        assert_eq!(lists, 2);
        assert_eq!(api.mutations(), vec!["create_application c1-ns-ing1"]);
    }
}
