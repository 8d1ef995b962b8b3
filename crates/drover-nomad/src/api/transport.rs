use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use drover_core::config::NomadTlsConfig;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use reqwest::{Method, header::CONTENT_TYPE};
use tokio::net::UnixStream;
use tokio_tungstenite::{
    Connector,
    tungstenite::{client::IntoClientRequest, http::HeaderValue},
};
use tracing::{debug, trace};
use url::Url;

use crate::{
    api::{ExecStreams, exec, tls},
    error::{NomadError, NomadResult},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_HEADER: &str = "x-nomad-token";
const UNIX_BASE: &str = "http://localhost/";

pub(crate) struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Wire to the Nomad agent: TCP (plain or TLS) through `reqwest`, or a
/// local unix socket through a bare hyper connection.
pub(crate) enum Transport {
    Tcp {
        client: reqwest::Client,
        tls: Arc<rustls::ClientConfig>,
        base: Url,
    },
    Unix { socket: PathBuf, base: Url },
}

impl Transport {
    pub fn from_address(address: &str, tls_cfg: &NomadTlsConfig) -> NomadResult<Self> {
        let address = address.trim();
        if let Some(path) = address.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(NomadError::InvalidAddress(address.to_string()));
            }
            let base = Url::parse(UNIX_BASE)
                .map_err(|e| NomadError::InvalidAddress(format!("{address}: {e}")))?;
            return Ok(Transport::Unix {
                socket: PathBuf::from(path),
                base,
            });
        }

        let mut base =
            Url::parse(address).map_err(|e| NomadError::InvalidAddress(format!("{address}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(NomadError::InvalidAddress(address.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let tls = tls::client_config(tls_cfg)?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .use_preconfigured_tls(rustls::ClientConfig::clone(&tls))
            .build()?;
        Ok(Transport::Tcp { client, tls, base })
    }

    /// Absolute request URL for an API path (`v1/...`) with query pairs.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> NomadResult<Url> {
        let base = match self {
            Transport::Tcp { base, .. } | Transport::Unix { base, .. } => base,
        };
        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|e| NomadError::InvalidRequest(format!("{path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub async fn send(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> NomadResult<RawResponse> {
        trace!(%method, url = %url, "nomad request");
        match self {
            Transport::Tcp { client, .. } => {
                let mut req = client.request(method, url);
                if let Some(token) = token {
                    req = req.header(TOKEN_HEADER, token);
                }
                if let Some(body) = body {
                    req = req.header(CONTENT_TYPE, "application/json").body(body);
                }
                let res = req.send().await?;
                let status = res.status().as_u16();
                let body = res.bytes().await?;
                Ok(RawResponse { status, body })
            }
            Transport::Unix { socket, .. } => {
                let stream = UnixStream::connect(socket).await?;
                let (mut sender, conn) =
                    hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(error = %e, "unix socket connection closed");
                    }
                });

                let target = match url.query() {
                    Some(q) => format!("{}?{q}", url.path()),
                    None => url.path().to_string(),
                };
                let mut builder = hyper::Request::builder()
                    .method(method)
                    .uri(target)
                    .header(hyper::header::HOST, "localhost");
                if let Some(token) = token {
                    builder = builder.header(TOKEN_HEADER, token);
                }
                if body.is_some() {
                    builder = builder.header(CONTENT_TYPE, "application/json");
                }
                let req = builder
                    .body(Full::new(Bytes::from(body.unwrap_or_default())))
                    .map_err(|e| NomadError::InvalidRequest(e.to_string()))?;

                let res = sender.send_request(req).await?;
                let status = res.status().as_u16();
                let body = res.into_body().collect().await?.to_bytes();
                Ok(RawResponse { status, body })
            }
        }
    }

    /// Open the exec websocket at `url` and run the session to completion.
    pub async fn exec(
        &self,
        mut url: Url,
        token: Option<&str>,
        streams: ExecStreams<'_>,
    ) -> NomadResult<i32> {
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| NomadError::InvalidRequest(format!("cannot use {scheme} for {url}")))?;

        let mut req = url.as_str().into_client_request()?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| NomadError::InvalidRequest(format!("token header: {e}")))?;
            req.headers_mut().insert(TOKEN_HEADER, value);
        }
        debug!(url = %url, "opening exec session");

        match self {
            Transport::Tcp { tls, .. } => {
                let connector = Connector::Rustls(tls.clone());
                let (ws, _) =
                    tokio_tungstenite::connect_async_tls_with_config(req, None, false, Some(connector))
                        .await?;
                exec::run_session(ws, streams).await
            }
            Transport::Unix { socket, .. } => {
                let stream = UnixStream::connect(socket).await?;
                let (ws, _) = tokio_tungstenite::client_async(req, stream).await?;
                exec::run_session(ws, streams).await
            }
        }
    }
}
