use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use md5::{Digest, Md5};

use crate::error::Error;

/// Separator between the components of a derived name.
pub const NAME_SEPARATOR: char = '-';

/// Prefix of the names we generate for policies that the remote service did not
/// name for us.
pub const POLICY_NAME_PREFIX: &str = "policy-";

/// Length of the hex fingerprint used as [`OwnerId`].
const OWNER_ID_LEN: usize = 8;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier the remote service assigned to a zone.
    ZoneId
);
string_id!(
    /// Identifier the remote service assigned to an application.
    AppId
);
string_id!(
    /// Identifier the remote service assigned to a policy.
    PolicyId
);

/// Short fingerprint of the cluster (or tenant) that owns a set of
/// applications. It is embedded in every derived name so that several
/// clusters can share a zone without touching each other's applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Derive the owner identifier from a cluster name: the first 8 hex digits
    /// of its MD5 digest.
    pub fn from_cluster_name(cluster_name: &str) -> Result<OwnerId, Error> {
        if cluster_name.is_empty() {
            return Err(Error::Configuration(
                "a cluster name is required to derive the owner identifier".to_string(),
            ));
        }
        let digest = Md5::digest(cluster_name.as_bytes());
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(OWNER_ID_LEN);
        Ok(OwnerId(fingerprint))
    }

    /// Use `s` verbatim. It must be non-empty and consist of ASCII letters and
    /// digits only, so that it can never contain [`NAME_SEPARATOR`].
    pub fn new(s: &str) -> Result<OwnerId, Error> {
        if is_owner_id(s) {
            Ok(OwnerId(s.to_string()))
        } else {
            Err(Error::Configuration(format!(
                "invalid owner identifier {:?}: expected ASCII letters and digits",
                s
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_owner_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// The name under which an application is stored remotely, and the only key
/// by which remote applications are matched to desired ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedName(String);

impl DerivedName {
    pub fn new(owner: &OwnerId, namespace: &str, name: &str) -> DerivedName {
        DerivedName(format!(
            "{}{sep}{}{sep}{}",
            owner,
            namespace,
            name,
            sep = NAME_SEPARATOR
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DerivedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for DerivedName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Result of reading ownership metadata out of a remote application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedName<'a> {
    Owned {
        owner: &'a str,
        /// Namespace and name are split at the first separator after the
        /// owner. Namespaces containing the separator therefore parse
        /// ambiguously; matching always compares the whole name, so this only
        /// affects what is reported.
        namespace: &'a str,
        name: &'a str,
    },
    Unrecognized,
}

impl<'a> ParsedName<'a> {
    pub fn parse(s: &'a str) -> ParsedName<'a> {
        let Some((owner, rest)) = s.split_once(NAME_SEPARATOR) else {
            return ParsedName::Unrecognized;
        };
        let Some((namespace, name)) = rest.split_once(NAME_SEPARATOR) else {
            return ParsedName::Unrecognized;
        };
        if !is_owner_id(owner) || namespace.is_empty() || name.is_empty() {
            return ParsedName::Unrecognized;
        }
        ParsedName::Owned {
            owner,
            namespace,
            name,
        }
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        match self {
            ParsedName::Owned { owner: o, .. } => *o == owner.as_str(),
            ParsedName::Unrecognized => false,
        }
    }
}

/// A configuration scope of the remote service, such as a DNS zone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub id: ZoneId,
}

impl Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The zones this process manages, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDirectory {
    zones: Vec<Zone>,
    by_name: BTreeMap<String, usize>,
}

impl ZoneDirectory {
    /// The first zone becomes the default zone.
    pub fn new(zones: Vec<Zone>) -> Result<ZoneDirectory, Error> {
        if zones.is_empty() {
            return Err(Error::Configuration(
                "at least one zone must be configured".to_string(),
            ));
        }
        let mut by_name = BTreeMap::new();
        for (i, zone) in zones.iter().enumerate() {
            if by_name.insert(zone.name.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "zone {} is configured more than once",
                    zone.name
                )));
            }
        }
        Ok(ZoneDirectory { zones, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Zone> {
        self.by_name.get(name).map(|i| &self.zones[*i])
    }

    pub fn default_zone(&self) -> &Zone {
        &self.zones[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }
}

/// An opaque matching rule. Rules are only ever compared for structural
/// equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(pub Value);

/// An access policy: a decision plus three independent rule sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Policy {
    pub decision: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub include: Vec<Rule>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub require: Vec<Rule>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exclude: Vec<Rule>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Rule>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Option<Vec<Rule>> = Deserialize::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}

impl Policy {
    /// Whether applying `self` over `other` would change anything. Names are
    /// not compared; rule sets are compared as sets.
    pub fn same_rules(&self, other: &Policy) -> bool {
        self.decision == other.decision
            && rule_sets_equal(&self.include, &other.include)
            && rule_sets_equal(&self.require, &other.require)
            && rule_sets_equal(&self.exclude, &other.exclude)
    }

    /// `self` with a different name.
    pub fn renamed(&self, name: String) -> Policy {
        Policy {
            name,
            ..self.clone()
        }
    }
}

/// Set equality under structural equality of the rules. Ordering and
/// repetition do not matter.
pub fn rule_sets_equal(a: &[Rule], b: &[Rule]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|y| a.contains(y))
}

/// The name given to a policy at `position` of a desired policy list.
pub fn policy_name(position: usize) -> String {
    format!("{}{}", POLICY_NAME_PREFIX, position)
}

/// A policy as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePolicy {
    pub id: PolicyId,
    #[serde(flatten)]
    pub policy: Policy,
}

/// The fields of an application that we send to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    pub name: String,
    pub domain: String,
    pub session_duration: String,
}

/// An application as the source of truth wants it to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredApplication {
    pub owner: OwnerId,
    pub namespace: String,
    pub resource_name: String,
    pub zone: Zone,
    pub domain: String,
    pub session_duration: String,
    pub policies: Vec<Policy>,
}

impl DesiredApplication {
    pub fn derived_name(&self) -> DerivedName {
        DerivedName::new(&self.owner, &self.namespace, &self.resource_name)
    }

    pub fn spec(&self) -> ApplicationSpec {
        ApplicationSpec {
            name: self.derived_name().to_string(),
            domain: self.domain.clone(),
            session_duration: self.session_duration.clone(),
        }
    }
}

/// Build the domain an application protects: `<subdomain>.<zone>/<path>`,
/// with at most one leading `/` removed from `path`.
pub fn application_domain(subdomain: &str, zone_name: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}.{}/{}", subdomain, zone_name, path)
}

/// An application as observed in the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteApplication {
    pub id: AppId,
    pub name: String,
    pub domain: String,
    pub session_duration: String,
    /// Audience tag, informational only.
    pub aud: Option<String>,
    pub zone: Zone,
    /// `None` when the policies were not fetched for this cycle.
    pub policies: Option<Vec<RemotePolicy>>,
}

impl RemoteApplication {
    pub fn parsed_name(&self) -> ParsedName<'_> {
        ParsedName::parse(&self.name)
    }

    pub fn spec(&self) -> ApplicationSpec {
        ApplicationSpec {
            name: self.name.clone(),
            domain: self.domain.clone(),
            session_duration: self.session_duration.clone(),
        }
    }
}

/// Everything observed in one zone during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneState {
    pub zone: Zone,
    pub applications: Vec<RemoteApplication>,
}
