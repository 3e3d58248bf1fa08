//! Wire format of the Cloudflare v4 API, as far as we use it.

use cfaccess_core::model::{AppId, ApplicationSpec, RemoteApplication, RemotePolicy, Zone};
use serde::{Deserialize, Serialize};

/// The envelope around every response body.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ResponseMessage>,
    pub result: Option<T>,
    pub result_info: Option<ResultInfo>,
}

impl<T> Envelope<T> {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ResponseMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub count: u32,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneRecord {
    pub id: String,
    pub name: String,
}

/// An access application as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessApplication {
    pub id: AppId,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub session_duration: String,
    #[serde(default)]
    pub aud: Option<String>,
}

impl AccessApplication {
    /// Place the application in the zone it was listed from.
    pub fn into_remote(
        self,
        zone: &Zone,
        policies: Option<Vec<RemotePolicy>>,
    ) -> RemoteApplication {
        RemoteApplication {
            id: self.id,
            name: self.name,
            domain: self.domain,
            session_duration: self.session_duration,
            aud: self.aud,
            zone: zone.clone(),
            policies,
        }
    }
}

/// Request body for creating or updating an application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationBody<'a> {
    pub name: &'a str,
    pub domain: &'a str,
    pub session_duration: &'a str,
    #[serde(rename = "type")]
    pub type_: &'static str,
}

impl<'a> From<&'a ApplicationSpec> for ApplicationBody<'a> {
    fn from(spec: &'a ApplicationSpec) -> Self {
        ApplicationBody {
            name: &spec.name,
            domain: &spec.domain,
            session_duration: &spec.session_duration,
            type_: "self_hosted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfaccess_core::model::ZoneId;
    use serde_json::json;

    #[test]
    fn test_decode_application_list() {
        let body = json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{
                "id": "f174e90a-fafe-4643-bbbc-4a0ed4fc8415",
                "aud": "737646a56ab1df6ec9bddc7e5ca84eaf3b0768850f3ffb5d74f1534911fe3893",
                "name": "c1-ns-ing1",
                "domain": "a.example.com/",
                "session_duration": "24h",
                "type": "self_hosted",
                "created_at": "2014-01-01T05:20:00.12345Z"
            }],
            "result_info": {"page": 1, "per_page": 20, "count": 1, "total_count": 1, "total_pages": 1}
        });
        let envelope: Envelope<Vec<AccessApplication>> = serde_json::from_value(body).unwrap();
        assert!(envelope.success);
        let apps = envelope.result.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "c1-ns-ing1");
        assert_eq!(envelope.result_info.unwrap().total_pages, Some(1));

        let zone = Zone {
            name: "example.com".to_string(),
            id: ZoneId::from("z1"),
        };
        let remote = apps[0].clone().into_remote(&zone, None);
        assert_eq!(remote.zone, zone);
        assert_eq!(remote.session_duration, "24h");
        assert!(remote.policies.is_none());
    }

    #[test]
    fn test_decode_policy_with_extra_fields() {
        let body = json!({
            "success": true,
            "result": {
                "id": "p1",
                "name": "policy-0",
                "decision": "allow",
                "precedence": 1,
                "include": [{"email_domain": {"domain": "example.com"}}],
                "exclude": null
            }
        });
        let envelope: Envelope<RemotePolicy> = serde_json::from_value(body).unwrap();
        let policy = envelope.result.unwrap();
        assert_eq!(policy.id.as_str(), "p1");
        assert_eq!(policy.policy.decision, "allow");
        assert_eq!(policy.policy.include.len(), 1);
        assert!(policy.policy.exclude.is_empty());
        assert!(policy.policy.require.is_empty());
    }

    #[test]
    fn test_decode_error_envelope() {
        let body = json!({
            "success": false,
            "errors": [{"code": 12130, "message": "access.api.error.invalid_request"}],
            "result": null
        });
        let envelope: Envelope<AccessApplication> = serde_json::from_value(body).unwrap();
        assert!(!envelope.success);
        assert_eq!(
            envelope.error_messages(),
            vec!["access.api.error.invalid_request (code 12130)".to_string()]
        );
    }
}
