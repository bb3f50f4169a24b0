//! End-to-end: raw node JSON in, merged JSON view out.

use hivegrid_view::{AppReport, MemberStatus, merge_app_info};
use serde_json::json;

fn node_payload() -> serde_json::Value {
    json!([
        {
            "name": "orders", "appId": "orders_2.1.0_7", "ip": "10.0.1.12",
            "version": "2.1.0", "buildNum": 7, "publishAt": 1714000000000u64,
            "isCurrWorking": true, "workerNum": 2, "expectWorkerNum": 2,
            "status": "running", "errorExitCount": 0, "errorExitRecord": []
        },
        {
            "name": "orders", "appId": "orders_2.0.3_41", "ip": "10.0.1.11",
            "version": "2.0.3", "buildNum": "41", "status": "stopped"
        },
        {
            "name": "billing", "appId": "billing_1.0.0_1", "ip": "10.0.1.11",
            "version": "1.0.0", "buildNumber": 1, "status": "error",
            "errorExitCount": 3, "errorExitRecord": [{"code": 1}]
        },
        {
            "name": "orders", "appId": "orders_2.1.0_7", "ip": "10.0.1.11",
            "version": "2.1.0", "buildNum": 7, "isCurrWorking": false,
            "status": "running"
        }
    ])
}

#[test]
fn merges_raw_node_payload() {
    let ips = ["10.0.1.12", "10.0.1.11", "10.0.1.10"];
    let reports = AppReport::list_from_value(node_payload());
    let view = merge_app_info(&ips, reports);

    let names: Vec<_> = view.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["billing", "orders"]);

    let orders = &view[1];
    let ids: Vec<_> = orders.versions.iter().map(|v| v.app_id.as_deref().unwrap()).collect();
    assert_eq!(ids, vec!["orders_2.0.3_41", "orders_2.1.0_7"]);

    for version in &orders.versions {
        assert_eq!(version.members.len(), 3);
        let ips: Vec<_> = version.members.iter().map(|m| m.ip.as_str()).collect();
        assert_eq!(ips, vec!["10.0.1.10", "10.0.1.11", "10.0.1.12"]);
    }

    let current = orders.latest().unwrap();
    assert_eq!(current.is_currently_working, Some(true));
    assert_eq!(current.count_status(&MemberStatus::Running), 2);
    assert_eq!(orders.working().count(), 1);

    let billing = &view[0].versions[0];
    let failing = billing.member("10.0.1.11").unwrap();
    assert_eq!(failing.error_exit_count, Some(3));
    assert_eq!(billing.reported().count(), 1);
}

#[test]
fn serialized_view_shape() {
    let view = merge_app_info(
        &["10.0.0.1", "10.0.0.2"],
        AppReport::list_from_value(json!([
            {"name": "svc", "appId": "svc_1.2.0_5", "ip": "10.0.0.1",
             "version": "1.2.0", "buildNumber": 5, "status": "running"}
        ])),
    );

    let out = serde_json::to_value(&view).unwrap();
    assert_eq!(out[0]["name"], "svc");
    assert_eq!(out[0]["versions"][0]["buildNumber"], 5);
    assert_eq!(out[0]["versions"][0]["members"][0]["status"], "running");
    assert_eq!(
        out[0]["versions"][0]["members"][1],
        json!({"ip": "10.0.0.2", "status": "none"})
    );
}

#[test]
fn merge_is_order_independent() {
    let ips = ["10.0.1.10", "10.0.1.11", "10.0.1.12"];
    let forward = merge_app_info(&ips, AppReport::list_from_value(node_payload()));

    let mut reversed = AppReport::list_from_value(node_payload());
    reversed.reverse();
    let backward = merge_app_info(&ips, reversed);

    let shape = |view: &[hivegrid_view::AppGroup]| -> Vec<(String, Vec<String>)> {
        view.iter()
            .map(|a| {
                let ids = a.versions.iter().map(|v| v.app_id.clone().unwrap()).collect();
                (a.name.clone(), ids)
            })
            .collect()
    };
    assert_eq!(shape(&forward), shape(&backward));
}
