//! Cluster admin operations on top of [`RemoteCaller`].

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use hive_core::{ClusterConfig, ConsoleConfig};
use hivegrid_view::{AppGroup, AppReport, merge_app_info};

use crate::error::{CallError, CallResult};
use crate::remote::{ClusterTarget, RemoteCaller, RemoteRequest};

/// Envelope code for a successful reply.
const SUCCESS: &str = "SUCCESS";

/// Typed access to one cluster's admin API.
pub struct ClusterClient {
    caller: RemoteCaller,
}

impl ClusterClient {
    pub fn new(target: ClusterTarget) -> CallResult<Self> {
        Ok(Self {
            caller: RemoteCaller::new(target)?,
        })
    }

    pub fn from_config(config: &ClusterConfig) -> CallResult<Self> {
        Self::new(ClusterTarget::from_config(config)?)
    }

    /// Client for the cluster registered under `code`.
    pub fn for_cluster(config: &ConsoleConfig, code: &str) -> CallResult<Self> {
        Self::from_config(config.cluster(code)?)
    }

    pub fn caller(&self) -> &RemoteCaller {
        &self.caller
    }

    /// Every app on every node, merged into one view.
    pub async fn app_status(&self) -> CallResult<Vec<AppGroup>> {
        let reply = self.caller.call("/api/apps", RemoteRequest::get()).await?;
        let reports = reports_from_reply(reply)?;
        debug!(reports = reports.len(), "received app reports");
        Ok(merge_app_info(&self.caller.target().member_ips, reports))
    }

    /// Current config of `app`, where `kind` is e.g. `app` or `server`.
    pub async fn app_config(&self, kind: &str, app: &str) -> CallResult<Value> {
        let path = config_path(kind, app);
        self.caller.call(&path, RemoteRequest::get()).await
    }

    /// Push a new config for `app` to the cluster.
    pub async fn set_app_config(&self, kind: &str, app: &str, config: Value) -> CallResult<Value> {
        let path = config_path(kind, app);
        let reply = self.caller.call(&path, RemoteRequest::post(config)).await?;
        check_envelope(&reply)?;
        info!(%kind, %app, "app config updated");
        Ok(reply)
    }
}

/// Send the same request to several clusters at once.
///
/// Results come back in the order of `callers`; one failure does not
/// affect the others.
pub async fn broadcast(
    callers: &[RemoteCaller],
    path: &str,
    request: &RemoteRequest,
) -> Vec<CallResult<Value>> {
    let calls = callers
        .iter()
        .map(|caller| caller.call(path, request.clone()));
    let results = join_all(calls).await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!(%path, failed, total = results.len(), "broadcast had failures");
    }
    results
}

fn config_path(kind: &str, app: &str) -> String {
    format!(
        "/api/config/{}/{}",
        urlencoding::encode(kind),
        urlencoding::encode(app)
    )
}

/// Pull the report list out of an `/api/apps` reply.
///
/// Accepts a bare array, `{"data": [...]}` or `{"data": {"success": [...]}}`.
fn reports_from_reply(reply: Value) -> CallResult<Vec<AppReport>> {
    check_envelope(&reply)?;
    let list = match reply {
        Value::Array(_) => reply,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => Value::Array(items),
            Some(Value::Object(mut data)) => data.remove("success").unwrap_or(Value::Null),
            _ => Value::Null,
        },
        _ => Value::Null,
    };
    if list.is_null() {
        warn!("app status reply carried no report list");
    }
    Ok(AppReport::list_from_value(list))
}

/// Turn a `{"code": "...", "message": "..."}` error envelope into an error.
fn check_envelope(reply: &Value) -> CallResult<()> {
    let Some(code) = reply.get("code").and_then(Value::as_str) else {
        return Ok(());
    };
    if code == SUCCESS {
        return Ok(());
    }
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(CallError::Remote {
        code: code.to_string(),
        message,
    })
}
