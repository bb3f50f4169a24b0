//! Signed calls to one cluster endpoint.
//!
//! A call appends the cluster's member list as `ips=`, signs the result,
//! sends it over HTTP/1.1 (optionally TLS) and decodes the JSON reply.
//! Every call is bounded by the target's timeout. Nothing is retried.

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use hive_core::ClusterConfig;
use hive_core::config::DEFAULT_TIMEOUT;

use crate::error::{CallError, CallResult, SignError};
use crate::query;
use crate::signer::{self, RequestDescriptor, SignedRequest};
use crate::tls;

/// Query parameter carrying the cluster's member list.
pub const IPS_PARAM: &str = "ips";

/// Where and how to reach a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTarget {
    /// Base URL, e.g. `https://10.0.0.1:8443/`. A trailing slash is ignored.
    pub endpoint: String,
    pub shared_secret: String,
    pub member_ips: Vec<String>,
    pub timeout: Duration,
    /// Skip TLS certificate verification for this cluster.
    pub trust_cluster_certs: bool,
}

impl ClusterTarget {
    pub fn new(endpoint: &str, shared_secret: &str, member_ips: Vec<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            shared_secret: shared_secret.to_string(),
            member_ips,
            timeout: DEFAULT_TIMEOUT,
            trust_cluster_certs: true,
        }
    }

    pub fn from_config(config: &ClusterConfig) -> CallResult<Self> {
        Ok(Self {
            endpoint: config.endpoint.clone(),
            shared_secret: config.token.clone(),
            member_ips: config.ips.clone(),
            timeout: config.timeout()?,
            trust_cluster_certs: config.trust_cluster_certs,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trust_cluster_certs(mut self, trust: bool) -> Self {
        self.trust_cluster_certs = trust;
        self
    }
}

/// Per-call options. Defaults to a GET without body or extra headers.
#[derive(Debug, Clone, Default)]
pub struct RemoteRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Http,
    Https,
}

/// A parsed cluster endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Path prefix without trailing slash, usually empty.
    base_path: String,
}

impl Endpoint {
    fn parse(raw: &str) -> CallResult<Self> {
        let invalid = |reason: &str| CallError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim().trim_end_matches('/');
        let uri: Uri = trimmed.parse().map_err(|_| invalid("not a valid url"))?;

        let scheme = match uri.scheme_str() {
            Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            Some(_) => return Err(invalid("scheme must be http or https")),
            None => return Err(invalid("missing scheme")),
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(match scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        });
        if uri.query().is_some() {
            return Err(invalid("endpoint must not carry a query string"));
        }
        let base_path = uri.path().trim_end_matches('/').to_string();

        Ok(Self {
            scheme,
            host,
            port,
            base_path,
        })
    }

    fn authority(&self) -> String {
        let default_port = match self.scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == default_port {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Issues signed calls to one cluster endpoint.
pub struct RemoteCaller {
    target: ClusterTarget,
    endpoint: Endpoint,
    tls: Option<TlsConnector>,
}

impl RemoteCaller {
    /// Validate the target and prepare TLS. No network I/O happens here.
    pub fn new(target: ClusterTarget) -> CallResult<Self> {
        if target.shared_secret.is_empty() {
            return Err(SignError::MissingSecret.into());
        }
        let endpoint = Endpoint::parse(&target.endpoint)?;
        let tls = match endpoint.scheme {
            Scheme::Https => Some(TlsConnector::from(tls::client_config(
                target.trust_cluster_certs,
            )?)),
            Scheme::Http => None,
        };

        Ok(Self {
            target,
            endpoint,
            tls,
        })
    }

    pub fn target(&self) -> &ClusterTarget {
        &self.target
    }

    /// Build the signed request for `path` without sending it.
    pub fn prepare(&self, path: &str, request: &RemoteRequest) -> CallResult<SignedRequest> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = query::append_param(&path, IPS_PARAM, &self.target.member_ips.join(","));

        let descriptor = RequestDescriptor {
            method: request.method.clone(),
            path,
            headers: request.headers.clone(),
            body: request.body.clone(),
        };
        Ok(signer::sign(&descriptor, &self.target.shared_secret)?)
    }

    /// Sign and send one request, returning the decoded JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    pub async fn call(&self, path: &str, request: RemoteRequest) -> CallResult<Value> {
        let signed = self.prepare(path, &request)?;
        let method = signed.method.clone();
        let uri_path = format!("{}{}", self.endpoint.base_path, signed.path);
        debug!(
            %method,
            endpoint = %self.target.endpoint,
            path = %uri_path,
            "calling cluster endpoint"
        );

        let exchange = self.send(&uri_path, signed);
        let result = match tokio::time::timeout(self.target.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(self.target.timeout)),
        };

        if let Err(e) = &result {
            warn!(
                %method,
                endpoint = %self.target.endpoint,
                path = %uri_path,
                error = %e,
                "cluster call failed"
            );
        }
        result
    }

    async fn send(&self, uri_path: &str, signed: SignedRequest) -> CallResult<Value> {
        let mut builder = Request::builder()
            .method(signed.method)
            .uri(uri_path)
            .header(HOST, self.endpoint.authority())
            .header(ACCEPT, signer::ACCEPT)
            .header(USER_AGENT, "hivegrid-cluster/0.1");
        if let Some(headers) = builder.headers_mut() {
            headers.extend(signed.headers);
        }
        let request = builder.body(Full::new(signed.body.unwrap_or_default()))?;

        let addr = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let stream = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(|source| CallError::Connect {
                addr: addr.clone(),
                source,
            })?;

        match &self.tls {
            None => exchange(TokioIo::new(stream), request).await,
            Some(connector) => {
                let server_name = ServerName::try_from(self.endpoint.host.clone()).map_err(|_| {
                    CallError::InvalidEndpoint {
                        endpoint: self.target.endpoint.clone(),
                        reason: "host is not a valid tls server name".to_string(),
                    }
                })?;
                let stream = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|source| CallError::Tls {
                        host: addr.clone(),
                        source,
                    })?;
                exchange(TokioIo::new(stream), request).await
            }
        }
    }
}

async fn exchange<T>(io: T, request: Request<Full<Bytes>>) -> CallResult<Value>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "cluster connection closed with error");
        }
    });

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if !status.is_success() {
        return Err(CallError::Status {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&body)?)
}

/// One-shot call without keeping a [`RemoteCaller`] around.
pub async fn call_remote(
    path: &str,
    target: &ClusterTarget,
    request: RemoteRequest,
) -> CallResult<Value> {
    RemoteCaller::new(target.clone())?.call(path, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;

    fn target() -> ClusterTarget {
        ClusterTarget::new(
            "http://10.0.0.1:8080/",
            "s3cret",
            vec!["10.0.0.1".into(), "10.0.0.2".into()],
        )
    }

    #[test]
    fn endpoint_parsing() {
        let ep = Endpoint::parse("https://cluster.local/").unwrap();
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.host, "cluster.local");
        assert_eq!(ep.port, 443);
        assert_eq!(ep.base_path, "");
        assert_eq!(ep.authority(), "cluster.local");

        let ep = Endpoint::parse("http://10.0.0.1:9000/admin/").unwrap();
        assert_eq!(ep.port, 9000);
        assert_eq!(ep.base_path, "/admin");
        assert_eq!(ep.authority(), "10.0.0.1:9000");

        let ep = Endpoint::parse("http://[::1]:9000").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.authority(), "[::1]:9000");
    }

    #[test]
    fn rejects_bad_endpoints() {
        for bad in ["", "not a url", "ftp://host", "10.0.0.1:8080", "http://host?x=1"] {
            assert!(
                matches!(Endpoint::parse(bad), Err(CallError::InvalidEndpoint { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_secret_fails_before_io() {
        let mut t = target();
        t.shared_secret.clear();
        let err = RemoteCaller::new(t).err().unwrap();
        assert!(matches!(err, CallError::Sign(SignError::MissingSecret)));
        assert!(err.is_precondition());
    }

    #[test]
    fn prepare_appends_member_list() {
        let caller = RemoteCaller::new(target()).unwrap();
        let signed = caller.prepare("/api/apps", &RemoteRequest::get()).unwrap();
        assert_eq!(signed.path, "/api/apps?ips=10.0.0.1,10.0.0.2");

        let signed = caller.prepare("api/apps?verbose=1", &RemoteRequest::get()).unwrap();
        assert_eq!(signed.path, "/api/apps?verbose=1&ips=10.0.0.1,10.0.0.2");
    }

    #[test]
    fn prepare_keeps_credentials_out_of_headers() {
        let caller = RemoteCaller::new(target()).unwrap();
        let signed = caller
            .prepare("/api/config/app/svc", &RemoteRequest::post(serde_json::json!({"a": 1})))
            .unwrap();

        for (name, value) in &signed.headers {
            let value = value.to_str().unwrap();
            assert!(!value.contains("s3cret"), "{name} leaks the secret");
            assert!(!value.contains("10.0.0.1:8080"), "{name} leaks the endpoint");
        }
        assert!(signed.headers.contains_key(AUTHORIZATION));
        assert!(signed.body.is_some());
    }

    #[test]
    fn target_from_config() {
        let mut config = ClusterConfig::new("prod", "https://x", "t", vec!["1.1.1.1".into()]);
        config.timeout = Some("2s".into());
        config.trust_cluster_certs = false;

        let target = ClusterTarget::from_config(&config).unwrap();
        assert_eq!(target.timeout, Duration::from_secs(2));
        assert!(!target.trust_cluster_certs);
        assert_eq!(target.shared_secret, "t");
    }
}
