//! Merge per-node app reports into one cluster-wide view.
//!
//! Reports are grouped by app name, then by `(version, build)`, then by
//! node IP. Every expected node that did not report a version is filled in
//! as [`MemberStatus::Unreported`]. The output order is fixed by explicit
//! sorts: apps by name, versions by weight, members by IP.

use std::cmp::Ordering;
use std::collections::HashMap;

use hive_core::ident::{DEFAULT_VERSION, weight};
use tracing::debug;

use crate::types::{AppGroup, AppReport, ClusterMember, MemberStatus, VersionGroup};

type VersionKey = (Option<String>, Option<u64>);

struct PendingVersion {
    group: VersionGroup,
    members: HashMap<String, ClusterMember>,
}

impl PendingVersion {
    fn new(report: &AppReport) -> Self {
        let version = report.version.as_deref().unwrap_or(DEFAULT_VERSION);
        let build = report.build_number.unwrap_or(0);
        Self {
            group: VersionGroup {
                version: report.version.clone(),
                build_number: report.build_number,
                published_at: report.published_at.clone(),
                app_id: report.app_id.clone(),
                weight: weight(version, build),
                members: Vec::new(),
                is_currently_working: report.is_currently_working,
            },
            members: HashMap::new(),
        }
    }

    fn finish<S: AsRef<str>>(mut self, all_known_ips: &[S]) -> VersionGroup {
        for ip in all_known_ips {
            let ip = ip.as_ref();
            if !self.members.contains_key(ip) {
                self.members
                    .insert(ip.to_string(), ClusterMember::unreported(ip));
            }
        }

        let mut members: Vec<ClusterMember> = self.members.into_values().collect();
        members.sort_by(|a, b| a.ip.cmp(&b.ip));
        self.group.members = members;
        self.group
    }
}

/// Merge node reports into a sorted, gap-filled view of every app.
///
/// The first report for an app version fixes its `publishedAt`, `appId`
/// and `isCurrentlyWorking`; the first report from a node fixes that
/// node's entry. Nodes in `all_known_ips` that did not report a version
/// appear with status `none`. Reports from nodes outside `all_known_ips`
/// are kept. This never fails.
pub fn merge_app_info<S, I>(all_known_ips: &[S], reports: I) -> Vec<AppGroup>
where
    S: AsRef<str>,
    I: IntoIterator<Item = AppReport>,
{
    let mut apps: HashMap<String, HashMap<VersionKey, PendingVersion>> = HashMap::new();
    let mut report_count = 0usize;

    for report in reports {
        report_count += 1;
        let key = (report.version.clone(), report.build_number);
        let pending = apps
            .entry(report.name.clone())
            .or_default()
            .entry(key)
            .or_insert_with(|| PendingVersion::new(&report));

        pending
            .members
            .entry(report.ip.clone())
            .or_insert_with(|| ClusterMember::from_report(&report));
    }

    let mut groups: Vec<AppGroup> = apps
        .into_iter()
        .map(|(name, versions)| {
            let mut versions: Vec<VersionGroup> = versions
                .into_values()
                .map(|pending| pending.finish(all_known_ips))
                .collect();
            versions.sort_by(compare_versions);
            AppGroup { name, versions }
        })
        .collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        apps = groups.len(),
        reports = report_count,
        nodes = all_known_ips.len(),
        "merged app reports"
    );
    groups
}

/// Weight first; version string and build only matter when weights collide.
fn compare_versions(a: &VersionGroup, b: &VersionGroup) -> Ordering {
    a.weight
        .total_cmp(&b.weight)
        .then_with(|| a.version.cmp(&b.version))
        .then_with(|| a.build_number.cmp(&b.build_number))
}

/// Per-status member counts across every version of every app.
pub fn status_summary(groups: &[AppGroup]) -> HashMap<MemberStatus, usize> {
    let mut summary = HashMap::new();
    for member in groups
        .iter()
        .flat_map(|app| &app.versions)
        .flat_map(|version| &version.members)
    {
        if let Some(status) = &member.status {
            *summary.entry(status.clone()).or_insert(0) += 1;
        }
    }
    summary
}
