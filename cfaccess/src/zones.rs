use cfaccess_api::AccessApi;
use cfaccess_core::{
    model::{Zone, ZoneDirectory},
    Error,
};
use tracing::{debug, instrument};

/// Look up the identifier of every configured zone. Any failure is fatal.
#[instrument(skip(api))]
pub async fn resolve_zones(api: &dyn AccessApi, names: &[String]) -> Result<ZoneDirectory, Error> {
    let mut zones = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let id = api
            .zone_id(name)
            .await
            .map_err(|e| Error::Configuration(format!("cannot resolve zone {}: {}", name, e)))?;
        debug!(zone = name, id = %id, "resolved zone");
        zones.push(Zone {
            name: name.to_string(),
            id,
        });
    }
    ZoneDirectory::new(zones)
}
