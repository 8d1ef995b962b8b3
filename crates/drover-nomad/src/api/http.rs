use async_trait::async_trait;
use drover_core::config::NomadConfig;
use drover_model::nomad::{
    Allocation, AllocationListStub, Evaluation, Job, JobRegisterResponse, JobValidateResponse,
};
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::{
    api::{
        ExecStreams, SchedulerApi,
        transport::{RawResponse, Transport},
    },
    error::{NomadError, NomadResult},
};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobRequest<'a> {
    job: &'a Job,
}

/// [`SchedulerApi`] over Nomad's HTTP API.
pub struct HttpApi {
    transport: Transport,
    token: Option<String>,
    region: Option<String>,
    namespace: Option<String>,
}

impl HttpApi {
    /// Create a client for `cfg.address`.
    ///
    /// TLS files are read here, so a bad CA or client key fails before any
    /// request is made. Empty token, region and namespace are treated as unset.
    pub fn new(cfg: &NomadConfig) -> NomadResult<Self> {
        let transport = Transport::from_address(&cfg.address, &cfg.tls)?;
        debug!(address = %cfg.address, region = ?cfg.region, namespace = ?cfg.namespace, "nomad client configured");
        Ok(Self {
            transport,
            token: cfg.token.clone().filter(|t| !t.is_empty()),
            region: cfg.region.clone().filter(|r| !r.is_empty()),
            namespace: cfg.namespace.clone().filter(|n| !n.is_empty()),
        })
    }

    /// Query pairs every request carries, followed by `extra`.
    fn query(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut q = Vec::with_capacity(extra.len() + 2);
        if let Some(region) = &self.region {
            q.push(("region", region.clone()));
        }
        if let Some(namespace) = &self.namespace {
            q.push(("namespace", namespace.clone()));
        }
        q.extend(extra.iter().cloned());
        q
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        extra: &[(&'static str, String)],
        body: Option<Vec<u8>>,
    ) -> NomadResult<RawResponse> {
        let url = self.transport.url(path, &self.query(extra))?;
        self.transport
            .send(method, url, self.token.as_deref(), body)
            .await
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        extra: &[(&'static str, String)],
        body: Option<Vec<u8>>,
    ) -> NomadResult<T> {
        let res = self.request(method, path, extra, body).await?;
        if !res.is_success() {
            return Err(NomadError::Api {
                status: res.status,
                message: res.text(),
            });
        }
        Ok(serde_json::from_slice(&res.body)?)
    }

    fn job_body(job: &Job) -> NomadResult<Option<Vec<u8>>> {
        Ok(Some(serde_json::to_vec(&JobRequest { job })?))
    }
}

#[async_trait]
impl SchedulerApi for HttpApi {
    #[instrument(level = "trace", skip_all, fields(job_id = %job.id))]
    async fn validate_job(&self, job: &Job) -> NomadResult<JobValidateResponse> {
        self.json(Method::PUT, "v1/validate/job", &[], Self::job_body(job)?)
            .await
    }

    #[instrument(level = "trace", skip_all, fields(job_id = %job.id))]
    async fn register_job(&self, job: &Job) -> NomadResult<JobRegisterResponse> {
        self.json(Method::PUT, "v1/jobs", &[], Self::job_body(job)?)
            .await
    }

    async fn evaluation(&self, eval_id: &str) -> NomadResult<Evaluation> {
        self.json(Method::GET, &format!("v1/evaluation/{eval_id}"), &[], None)
            .await
    }

    async fn job_allocations(&self, job_id: &str) -> NomadResult<Vec<AllocationListStub>> {
        self.json(Method::GET, &format!("v1/job/{job_id}/allocations"), &[], None)
            .await
    }

    async fn allocation(&self, alloc_id: &str) -> NomadResult<Allocation> {
        self.json(Method::GET, &format!("v1/allocation/{alloc_id}"), &[], None)
            .await
    }

    async fn read_file(&self, alloc_id: &str, path: &str) -> NomadResult<Option<Vec<u8>>> {
        let res = self
            .request(
                Method::GET,
                &format!("v1/client/fs/cat/{alloc_id}"),
                &[("path", path.to_string())],
                None,
            )
            .await?;
        if res.is_success() {
            return Ok(Some(res.body.to_vec()));
        }
        let message = res.text();
        if res.status == 404 || message.contains("no such file or directory") {
            return Ok(None);
        }
        Err(NomadError::Api {
            status: res.status,
            message,
        })
    }

    #[instrument(level = "trace", skip(self, streams))]
    async fn exec(
        &self,
        alloc_id: &str,
        task: &str,
        command: &[String],
        streams: ExecStreams<'_>,
    ) -> NomadResult<i32> {
        let query = self.query(&[
            ("task", task.to_string()),
            ("tty", "false".to_string()),
            ("command", serde_json::to_string(command)?),
        ]);
        let url = self
            .transport
            .url(&format!("v1/client/allocation/{alloc_id}/exec"), &query)?;
        self.transport
            .exec(url, self.token.as_deref(), streams)
            .await
    }

    async fn deregister_job(&self, job_id: &str) -> NomadResult<()> {
        let res = self
            .request(
                Method::DELETE,
                &format!("v1/job/{job_id}"),
                &[("purge", "false".to_string())],
                None,
            )
            .await?;
        if !res.is_success() {
            return Err(NomadError::Api {
                status: res.status,
                message: res.text(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use base64::{Engine, engine::general_purpose::STANDARD as STANDARD_B64};
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
    };
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    use super::*;

    fn api_for(address: &str) -> HttpApi {
        HttpApi::new(&NomadConfig {
            address: address.to_string(),
            token: Some("secret".into()),
            region: Some("eu".into()),
            namespace: Some("ci".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn job() -> Job {
        Job {
            id: "runner-1-project-2-job-3".into(),
            job_type: "batch".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_sends_wrapped_job_with_auth_and_scope() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/jobs"))
            .and(header("X-Nomad-Token", "secret"))
            .and(query_param("region", "eu"))
            .and(query_param("namespace", "ci"))
            .and(body_partial_json(json!({"Job": {"ID": "runner-1-project-2-job-3", "Type": "batch"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"EvalID": "e-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let res = api_for(&server.uri()).register_job(&job()).await.unwrap();
        assert_eq!(res.eval_id, "e-1");
    }

    #[tokio::test]
    async fn validate_returns_scheduler_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/validate/job"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ValidationErrors": ["Missing job datacenters"],
                "Error": "1 error occurred"
            })))
            .mount(&server)
            .await;

        let res = api_for(&server.uri()).validate_job(&job()).await.unwrap();
        assert_eq!(res.failure().unwrap(), "Missing job datacenters");
    }

    #[tokio::test]
    async fn allocations_and_allocation_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/job/j1/allocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ID": "a1", "ClientStatus": "running", "CreateIndex": 3,
                 "TaskStates": {"job": {"State": "running"}}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/allocation/a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "a1", "JobID": "j1", "ClientStatus": "running", "DesiredStatus": "run"
            })))
            .mount(&server)
            .await;

        let api = api_for(&server.uri());
        let stubs = api.job_allocations("j1").await.unwrap();
        assert_eq!(stubs.len(), 1);
        assert!(stubs[0].all_tasks_running());

        let alloc = api.allocation("a1").await.unwrap();
        assert_eq!(alloc.job_id, "j1");
        assert!(!alloc.terminated());
    }

    #[tokio::test]
    async fn read_file_maps_missing_log_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/client/fs/cat/a1"))
            .and(query_param("path", "alloc/logs/job.stdout.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("/bin/bash\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/client/fs/cat/a2"))
            .respond_with(ResponseTemplate::new(404).set_body_string("file not found"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/client/fs/cat/a3"))
            .respond_with(ResponseTemplate::new(500).set_body_string("rpc error: permission denied"))
            .mount(&server)
            .await;

        let api = api_for(&server.uri());
        let got = api.read_file("a1", "alloc/logs/job.stdout.0").await.unwrap();
        assert_eq!(got.as_deref(), Some(&b"/bin/bash\n"[..]));
        assert!(api.read_file("a2", "alloc/logs/job.stdout.0").await.unwrap().is_none());
        match api.read_file("a3", "alloc/logs/job.stdout.0").await {
            Err(NomadError::Api { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deregister_does_not_purge() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/job/j1"))
            .and(query_param("purge", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"EvalID": "e-2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/job/j2"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Permission denied"))
            .mount(&server)
            .await;

        let api = api_for(&server.uri());
        api.deregister_job("j1").await.unwrap();
        match api.deregister_job("j2").await {
            Err(NomadError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Permission denied");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exec_pumps_stdin_and_returns_exit_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen_uri = Arc::new(Mutex::new(String::new()));
        let seen_token = Arc::new(Mutex::new(String::new()));

        let (uri_slot, token_slot) = (seen_uri.clone(), seen_token.clone());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, res: Response| {
                *uri_slot.lock().unwrap() = req.uri().to_string();
                if let Some(v) = req.headers().get("X-Nomad-Token") {
                    *token_slot.lock().unwrap() = v.to_str().unwrap().to_string();
                }
                Ok::<_, ErrorResponse>(res)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();

            let mut stdin = Vec::new();
            while let Some(msg) = ws.next().await {
                let frame: serde_json::Value = match msg.unwrap() {
                    Message::Text(t) => serde_json::from_str(&t).unwrap(),
                    _ => continue,
                };
                if frame["stdin"]["close"] == true {
                    break;
                }
                let data = frame["stdin"]["data"].as_str().unwrap();
                stdin.extend(STANDARD_B64.decode(data).unwrap());
            }

            let echo = STANDARD_B64.encode(&stdin);
            ws.send(Message::Text(json!({"stdout": {"data": echo}}).to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(json!({"stderr": {"data": STANDARD_B64.encode("killed\n")}}).to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(json!({"exited": true, "result": {"exit_code": 137}}).to_string()))
                .await
                .unwrap();
        });

        let api = api_for(&format!("http://{addr}"));
        let mut stdin: &[u8] = b"echo hello\n";
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = api
            .exec(
                "a1",
                "job",
                &["/bin/bash".to_string()],
                ExecStreams {
                    stdin: &mut stdin,
                    stdout: &mut stdout,
                    stderr: &mut stderr,
                },
            )
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(code, 137);
        assert_eq!(stdout, b"echo hello\n");
        assert_eq!(stderr, b"killed\n");

        let uri = seen_uri.lock().unwrap().clone();
        assert!(uri.starts_with("/v1/client/allocation/a1/exec?"), "uri: {uri}");
        assert!(uri.contains("task=job"));
        assert!(uri.contains("tty=false"));
        assert!(uri.contains("namespace=ci"));
        assert!(uri.contains("command=%5B%22%2Fbin%2Fbash%22%5D"), "uri: {uri}");
        assert_eq!(*seen_token.lock().unwrap(), "secret");
    }
}
