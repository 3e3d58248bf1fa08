//! Turning annotated source objects into desired applications.

use cfaccess_core::{
    model::{
        application_domain, DerivedName, DesiredApplication, OwnerId, Policy, Rule, ZoneDirectory,
    },
    Error,
};
use serde_json::json;

use crate::source::SourceObject;

pub const DEFAULT_ANNOTATION_PREFIX: &str = "access.cloudflare.com/";

pub const DEFAULT_SESSION_DURATION: &str = "24h";

/// Marks an object as describing an application. Objects without it are
/// not ours.
const SUB_DOMAIN: &str = "application-sub-domain";
const PATH: &str = "application-path";
const SESSION_DURATION: &str = "session-duration";
const POLICIES: &str = "policies";
const ALLOW_EMAIL_DOMAIN: &str = "allow-email-domain";
const ZONE_NAME: &str = "zone-name";

pub struct Extractor {
    prefix: String,
    owner: OwnerId,
    zones: ZoneDirectory,
}

impl Extractor {
    pub fn new(prefix: &str, owner: OwnerId, zones: ZoneDirectory) -> Extractor {
        Extractor {
            prefix: prefix.to_string(),
            owner,
            zones,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn zones(&self) -> &ZoneDirectory {
        &self.zones
    }

    pub fn derived_name(&self, namespace: &str, name: &str) -> DerivedName {
        DerivedName::new(&self.owner, namespace, name)
    }

    fn annotation<'a>(&self, object: &'a SourceObject, key: &str) -> Option<&'a str> {
        object
            .annotations
            .get(&format!("{}{}", self.prefix, key))
            .map(|s| s.as_str())
    }

    /// `Ok(None)` if the object does not ask for an application, or is being
    /// deleted.
    pub fn extract(&self, object: &SourceObject) -> Result<Option<DesiredApplication>, Error> {
        let Some(sub_domain) = self.annotation(object, SUB_DOMAIN) else {
            return Ok(None);
        };
        if object.deletion_timestamp.is_some() {
            return Ok(None);
        }
        let malformed = |reason: String| Error::MalformedInput {
            object: object.to_string(),
            reason,
        };

        let sub_domain = sub_domain.trim();
        if sub_domain.is_empty() {
            return Err(malformed(format!("{} must not be empty", SUB_DOMAIN)));
        }

        let zone = match self.annotation(object, ZONE_NAME) {
            None => self.zones.default_zone(),
            Some(zone_name) => self.zones.get(zone_name.trim()).ok_or_else(|| {
                malformed(format!("zone {} is not managed by this controller", zone_name))
            })?,
        };

        let path = self.annotation(object, PATH).unwrap_or_default();

        let session_duration = match self.annotation(object, SESSION_DURATION).map(str::trim) {
            None | Some("") => DEFAULT_SESSION_DURATION.to_string(),
            Some(d) => d.to_string(),
        };

        let mut policies: Vec<Policy> = match self.annotation(object, POLICIES) {
            None => Vec::new(),
            Some(json) => serde_json::from_str(json)
                .map_err(|e| malformed(format!("{} is not a list of policies: {}", POLICIES, e)))?,
        };
        if let Some(domain) = self.annotation(object, ALLOW_EMAIL_DOMAIN) {
            policies.push(Policy {
                decision: "allow".to_string(),
                include: vec![Rule(json!({"email_domain": {"domain": domain.trim()}}))],
                ..Default::default()
            });
        }

        Ok(Some(DesiredApplication {
            owner: self.owner.clone(),
            namespace: object.namespace.clone(),
            resource_name: object.name.clone(),
            zone: zone.clone(),
            domain: application_domain(sub_domain, &zone.name, path),
            session_duration,
            policies,
        }))
    }
}
