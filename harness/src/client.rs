use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::{debug, error, info, warn};
use relay_probe_lib::messages::encode_payload;
use relay_probe_lib::{ParticipantDescriptor, PeerRecord, RawDescriptor, RawMessage, SchemaError};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::error::{BoxError, ClientError};
use crate::polling::wait_for;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

/// Status and body of a request whose outcome the caller interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    /// The relay API acknowledges subscriptions and publishes with a bare `OK`.
    pub fn is_acknowledged(&self) -> bool {
        self.status == StatusCode::OK && self.body == "OK"
    }
}

/// HTTP access to one participant's REST surface.
///
/// Holds only the address of the participant; process lifetime belongs to
/// the provisioner. Single-shot calls never retry.
pub struct ParticipantClient {
    base_url: Url,
    port: u16,
    http: Client<HttpConnector, Full<Bytes>>,
    peer_id: Option<String>,
}

fn transport<E: Into<BoxError>>(url: &Url, e: E) -> ClientError {
    ClientError::Transport {
        url: url.to_string(),
        source: e.into(),
    }
}

fn expect_success(url: &Url, reply: HttpReply) -> Result<HttpReply, ClientError> {
    if reply.status.is_success() {
        Ok(reply)
    } else {
        Err(ClientError::Status {
            url: url.to_string(),
            status: reply.status,
            body: reply.body,
        })
    }
}

impl ParticipantClient {
    pub fn new(host: &str, port: u16) -> Result<Self, ClientError> {
        let base_url = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| ClientError::Url(e.to_string()))?;
        let http = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            base_url,
            port,
            http,
            peer_id: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Each segment is percent-encoded, `/` included, so content topics can be
    // used as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
        accept: &'static str,
        limit: Duration,
    ) -> Result<HttpReply, ClientError> {
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| ClientError::Url(e.to_string()))?;

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACCEPT, accept);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, JSON);
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| transport(url, e))?;

        debug!("{} {}", request.method(), url);
        let exchange = async {
            let response = self
                .http
                .request(request)
                .await
                .map_err(|e| transport(url, e))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| transport(url, e))?
                .to_bytes();
            Ok::<_, ClientError>(HttpReply {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        };

        match tokio::time::timeout(limit, exchange).await {
            Ok(reply) => reply,
            Err(_) => Err(ClientError::RequestTimeout {
                url: url.to_string(),
                after: limit,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        let reply = self
            .execute(Method::GET, &url, None, JSON, REQUEST_TIMEOUT)
            .await?;
        let reply = expect_success(&url, reply)?;
        serde_json::from_str(&reply.body).map_err(|e| ClientError::Schema(SchemaError::Json(e)))
    }

    async fn post_json(
        &self,
        segments: &[&str],
        body: serde_json::Value,
    ) -> Result<HttpReply, ClientError> {
        let url = self.endpoint(segments)?;
        let reply = self
            .execute(
                Method::POST,
                &url,
                Some(body.to_string().into_bytes()),
                TEXT,
                REQUEST_TIMEOUT,
            )
            .await?;
        expect_success(&url, reply)
    }

    /// Fetches and validates the participant's descriptor.
    pub async fn get_descriptor(&self) -> Result<ParticipantDescriptor, ClientError> {
        let raw: RawDescriptor = self.get_json(&["debug", "v1", "info"]).await?;
        Ok(ParticipantDescriptor::try_from(raw)?)
    }

    pub async fn identity_uri(&self) -> Result<String, ClientError> {
        Ok(self.get_descriptor().await?.identity_uri().to_string())
    }

    /// `true` only for a 200 from `/health`.
    ///
    /// Transport failures are deliberately folded into `false` here so that
    /// readiness polling sees "not up yet" and "refused" the same way. This is
    /// the only call that does so.
    pub async fn check_health(&self) -> bool {
        let url = match self.endpoint(&["health"]) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build health URL for port {}: {}", self.port, e);
                return false;
            }
        };
        match self
            .execute(Method::GET, &url, None, TEXT, HEALTH_TIMEOUT)
            .await
        {
            Ok(reply) => reply.status == StatusCode::OK,
            Err(e) => {
                debug!("Health check on port {} failed: {}", self.port, e);
                false
            }
        }
    }

    pub async fn subscribe(&self, topic: &str) -> Result<HttpReply, ClientError> {
        self.post_json(&["relay", "v1", "auto", "subscriptions"], json!([topic]))
            .await
    }

    pub async fn publish(&self, topic: &str, text: &str) -> Result<HttpReply, ClientError> {
        self.post_json(
            &["relay", "v1", "auto", "messages"],
            json!({
                "payload": encode_payload(text),
                "contentTopic": topic,
            }),
        )
        .await
    }

    /// Messages currently buffered by the participant for `topic`, in its order.
    pub async fn fetch_messages(&self, topic: &str) -> Result<Vec<RawMessage>, ClientError> {
        self.get_json(&["relay", "v1", "auto", "messages", topic])
            .await
    }

    /// Whether any buffered message on `topic` carries `text` as its payload.
    pub async fn has_message(&self, topic: &str, text: &str) -> Result<bool, ClientError> {
        let encoded = encode_payload(text);
        Ok(self
            .fetch_messages(topic)
            .await?
            .iter()
            .any(|m| m.has_payload(&encoded)))
    }

    pub async fn list_peers(&self) -> Result<Vec<PeerRecord>, ClientError> {
        self.get_json(&["admin", "v1", "peers"]).await
    }

    pub async fn peer_ids(&self) -> Result<Vec<String>, ClientError> {
        Ok(self
            .list_peers()
            .await?
            .iter()
            .filter_map(|p| p.peer_id().map(str::to_string))
            .collect())
    }

    /// See [`PeerRecord::matches`] for the matching rules.
    pub async fn has_peer(&self, identifier: &str) -> Result<bool, ClientError> {
        Ok(self
            .list_peers()
            .await?
            .iter()
            .any(|p| p.matches(identifier)))
    }

    /// The participant's own peer identifier, resolved from its listen addresses.
    ///
    /// Cached once resolved. While unresolved every call asks the participant
    /// again.
    pub async fn peer_id(&mut self) -> Result<Option<String>, ClientError> {
        if self.peer_id.is_none() {
            self.peer_id = self.get_descriptor().await?.resolve_peer_id();
            if self.peer_id.is_none() {
                debug!("Peer id of node on port {} not resolvable yet", self.port);
            }
        }
        Ok(self.peer_id.clone())
    }

    pub fn cached_peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    /// Polls the peer table until a peer whose multiaddress contains
    /// `fragment` reports the relay protocol as connected.
    pub async fn verify_peer_connection(
        &self,
        fragment: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<PeerRecord, ClientError> {
        info!(
            "Verifying peer connection for {} on port {}",
            fragment, self.port
        );

        let result = wait_for(
            move || async move {
                match self.list_peers().await {
                    Ok(peers) => {
                        debug!("Found {} peers", peers.len());
                        let found = peers
                            .into_iter()
                            .find(|p| p.multiaddr.contains(fragment) && p.is_relay_connected());
                        if found.is_none() {
                            debug!("Peer {} not relay-connected yet, retrying...", fragment);
                        }
                        Ok(found)
                    }
                    Err(e) if e.is_transport() => {
                        warn!("Peer list request failed: {}", e);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            },
            timeout,
            poll_interval,
            Some(format!(
                "failed to establish peer connection for {} on port {} within {:?}",
                fragment, self.port, timeout
            )),
        )
        .await;

        match &result {
            Ok(_) => info!(
                "Peer connection established for {} on port {}",
                fragment, self.port
            ),
            Err(e) => error!("{}", e),
        }
        result
    }

    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ClientError> {
        self.wait_until_ready_every(timeout, READY_POLL_INTERVAL)
            .await
    }

    pub async fn wait_until_ready_every(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), ClientError> {
        info!("Waiting for node on port {} to become ready...", self.port);
        let result = wait_for(
            move || async move { Ok::<_, ClientError>(self.check_health().await.then_some(())) },
            timeout,
            poll_interval,
            Some(format!(
                "node on port {} failed to become ready within {:?}",
                self.port, timeout
            )),
        )
        .await;

        match &result {
            Ok(()) => info!("Node on port {} is ready", self.port),
            Err(e) => error!("{}", e),
        }
        result
    }
}
