//! Report and view types.
//!
//! [`AppReport`] is what a single node says about one app version it hosts.
//! [`AppGroup`] / [`VersionGroup`] / [`ClusterMember`] form the merged,
//! cluster-wide view. Field names on the wire are camelCase; the older node
//! spellings (`buildNum`, `publishAt`, `isCurrWorking`) are accepted on input.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Status ────────────────────────────────────────────────────────

/// Status of an app version on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MemberStatus {
    Running,
    Stopped,
    Error,
    /// Node is known to be unreachable.
    Absent,
    /// Node did not report this version at all. Only produced by merging.
    Unreported,
    /// Any status string this console does not know about.
    Other(String),
}

impl MemberStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MemberStatus::Running => "running",
            MemberStatus::Stopped => "stopped",
            MemberStatus::Error => "error",
            MemberStatus::Absent => "absent",
            MemberStatus::Unreported => "none",
            MemberStatus::Other(s) => s,
        }
    }

    /// Whether the status was synthesized rather than reported by a node.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, MemberStatus::Absent | MemberStatus::Unreported)
    }
}

impl From<String> for MemberStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => MemberStatus::Running,
            "stopped" => MemberStatus::Stopped,
            "error" => MemberStatus::Error,
            "absent" => MemberStatus::Absent,
            "none" => MemberStatus::Unreported,
            _ => MemberStatus::Other(s),
        }
    }
}

impl From<MemberStatus> for String {
    fn from(status: MemberStatus) -> Self {
        match status {
            MemberStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Inbound ───────────────────────────────────────────────────────

/// One node's report about one app version.
///
/// Every field is optional: a malformed field is dropped instead of failing
/// the whole report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppReport {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ip: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
    #[serde(default, alias = "buildNum", deserialize_with = "lenient::number")]
    pub build_number: Option<u64>,
    #[serde(default, alias = "publishAt")]
    pub published_at: Option<Value>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub worker_num: Option<u32>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub expect_worker_num: Option<u32>,
    #[serde(default, alias = "isCurrWorking", deserialize_with = "lenient::flag")]
    pub is_currently_working: Option<bool>,
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: Option<MemberStatus>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub error_exit_count: Option<u32>,
    #[serde(default)]
    pub error_exit_record: Option<Value>,
}

/// Short field names sent by older nodes, with the names they stand for.
const NODE_ALIASES: [(&str, &str); 3] = [
    ("buildNum", "buildNumber"),
    ("publishAt", "publishedAt"),
    ("isCurrWorking", "isCurrentlyWorking"),
];

impl AppReport {
    /// Decode a JSON array of reports, skipping entries that are not objects.
    pub fn list_from_value(value: Value) -> Vec<AppReport> {
        let Value::Array(items) = value else {
            return Vec::new();
        };
        items.into_iter().filter_map(AppReport::from_value).collect()
    }

    /// Decode one report object. `None` only for non-objects.
    ///
    /// When a field arrives under both its name and its short alias, the
    /// full name wins unless it is null.
    pub fn from_value(value: Value) -> Option<AppReport> {
        let Value::Object(mut object) = value else {
            return None;
        };
        for (alias, field) in NODE_ALIASES {
            if let Some(value) = object.remove(alias) {
                if object.get(field).is_none_or(Value::is_null) {
                    object.insert(field.to_string(), value);
                }
            }
        }
        serde_json::from_value(Value::Object(object)).ok()
    }
}

// ── Merged view ───────────────────────────────────────────────────

/// One node's state for one app version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMember {
    pub ip: String,
    pub status: Option<MemberStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_worker_num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_exit_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_exit_record: Option<Value>,
}

impl ClusterMember {
    /// Placeholder for a node that did not report.
    pub fn unreported(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            status: Some(MemberStatus::Unreported),
            worker_num: None,
            expect_worker_num: None,
            error_exit_count: None,
            error_exit_record: None,
        }
    }

    pub(crate) fn from_report(report: &AppReport) -> Self {
        Self {
            ip: report.ip.clone(),
            status: report.status.clone(),
            worker_num: report.worker_num,
            expect_worker_num: report.expect_worker_num,
            error_exit_count: report.error_exit_count,
            error_exit_record: report.error_exit_record.clone(),
        }
    }

    pub fn is_reported(&self) -> bool {
        self.status.as_ref().is_none_or(|s| !s.is_synthetic())
    }
}

/// All nodes' state for one (version, build) of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionGroup {
    pub version: Option<String>,
    pub build_number: Option<u64>,
    pub published_at: Option<Value>,
    pub app_id: Option<String>,
    pub weight: f64,
    /// Sorted by IP ascending.
    pub members: Vec<ClusterMember>,
    pub is_currently_working: Option<bool>,
}

impl VersionGroup {
    pub fn member(&self, ip: &str) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.ip == ip)
    }

    /// Members with the given status.
    pub fn count_status(&self, status: &MemberStatus) -> usize {
        self.members
            .iter()
            .filter(|m| m.status.as_ref() == Some(status))
            .count()
    }

    /// Members that sent a report (not gap-filled).
    pub fn reported(&self) -> impl Iterator<Item = &ClusterMember> {
        self.members.iter().filter(|m| m.is_reported())
    }
}

/// Every observed version of one app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppGroup {
    pub name: String,
    /// Sorted by weight ascending.
    pub versions: Vec<VersionGroup>,
}

impl AppGroup {
    /// Highest-weight version.
    pub fn latest(&self) -> Option<&VersionGroup> {
        self.versions.last()
    }

    /// Versions some node flagged as currently serving.
    pub fn working(&self) -> impl Iterator<Item = &VersionGroup> {
        self.versions
            .iter()
            .filter(|v| v.is_currently_working == Some(true))
    }
}

/// Deserializers that map a wrongly-typed field to `None` instead of an error.
mod lenient {
    use super::*;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_string(d)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn number<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        let raw = match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(raw.and_then(|n| T::try_from(n).ok()))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn status<'de, D: Deserializer<'de>>(d: D) -> Result<Option<MemberStatus>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(MemberStatus::from(s)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_wire_names() {
        let status: MemberStatus = serde_json::from_value(json!("none")).unwrap();
        assert_eq!(status, MemberStatus::Unreported);
        assert_eq!(serde_json::to_value(MemberStatus::Running).unwrap(), json!("running"));
        assert_eq!(
            MemberStatus::from("reloading".to_string()),
            MemberStatus::Other("reloading".into())
        );
        assert_eq!(serde_json::to_value(MemberStatus::Other("reloading".into())).unwrap(), json!("reloading"));
    }

    #[test]
    fn report_accepts_node_spellings() {
        let report: AppReport = serde_json::from_value(json!({
            "name": "svc",
            "appId": "svc_1.2.0_5",
            "ip": "10.0.0.1",
            "version": "1.2.0",
            "buildNum": "5",
            "publishAt": 1700000000000u64,
            "isCurrWorking": true,
            "workerNum": 4,
            "expectWorkerNum": 4,
            "status": "running"
        }))
        .unwrap();

        assert_eq!(report.build_number, Some(5));
        assert_eq!(report.published_at, Some(json!(1700000000000u64)));
        assert_eq!(report.is_currently_working, Some(true));
        assert_eq!(report.status, Some(MemberStatus::Running));
    }

    #[test]
    fn malformed_fields_become_none() {
        let report: AppReport = serde_json::from_value(json!({
            "name": "svc",
            "ip": "10.0.0.1",
            "buildNumber": "five",
            "workerNum": -1,
            "status": 3
        }))
        .unwrap();

        assert_eq!(report.build_number, None);
        assert_eq!(report.worker_num, None);
        assert_eq!(report.status, None);
        assert_eq!(report.version, None);
    }

    #[test]
    fn both_spellings_keep_the_report() {
        let reports = AppReport::list_from_value(json!([{
            "name": "svc",
            "ip": "10.0.0.1",
            "version": "1.0.0",
            "buildNumber": 5,
            "buildNum": 6,
            "isCurrentlyWorking": null,
            "isCurrWorking": true,
            "publishedAt": "2026-01-01",
            "publishAt": "2025-01-01",
            "status": "running"
        }]));
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.build_number, Some(5));
        assert_eq!(report.is_currently_working, Some(true));
        assert_eq!(report.published_at, Some(json!("2026-01-01")));
        assert_eq!(report.status, Some(MemberStatus::Running));
    }

    #[test]
    fn empty_object_is_a_report() {
        let report: AppReport = serde_json::from_value(json!({})).unwrap();
        assert_eq!(report, AppReport::default());
    }

    #[test]
    fn list_skips_non_objects() {
        let reports = AppReport::list_from_value(json!([
            {"name": "a", "ip": "10.0.0.1"},
            null,
            "junk",
            {"name": "b", "ip": "10.0.0.2"}
        ]));
        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn unreported_member_serializes_compactly() {
        let member = ClusterMember::unreported("10.0.0.9");
        assert_eq!(
            serde_json::to_value(&member).unwrap(),
            json!({"ip": "10.0.0.9", "status": "none"})
        );
        assert!(!member.is_reported());
    }
}
