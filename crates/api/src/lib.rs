use async_trait::async_trait;
use ecm_core::backend::{AuthBackend, Credentials, InstanceBackend};
use ecm_core::error::{ConsoleError, ConsoleResult};
use ecm_core::model::{CreateInstanceParams, Instance, User};
use ecm_core::session::AuthSession;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// REST client for the provisioning backend.
///
/// The bearer token is read from the shared session on every request, and a
/// 401 from any endpoint tears that session down.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<AuthSession>,
}

#[derive(Deserialize)]
struct InstancesEnvelope {
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
struct InstanceEnvelope {
    instance: Instance,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisassociateRequest<'a> {
    allocation_id: &'a str,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<AuthSession>) -> ApiClient {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> ConsoleResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::Config(format!("Invalid API URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ConsoleError::Config(format!("Invalid API URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ConsoleResult<T> {
        let body = self.execute(Method::GET, segments, None::<&()>).await?;
        decode(&body)
    }

    async fn post<T: DeserializeOwned, P: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        payload: Option<&P>,
    ) -> ConsoleResult<T> {
        let body = self.execute(Method::POST, segments, payload).await?;
        decode(&body)
    }

    /// POST without a body, ignoring whatever the backend answers on success.
    async fn post_action(&self, segments: &[&str]) -> ConsoleResult<()> {
        self.execute(Method::POST, segments, None::<&()>).await.map(|_| ())
    }

    async fn execute<P: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        payload: Option<&P>,
    ) -> ConsoleResult<String> {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        let token = self.session.token();
        let mut request: RequestBuilder = self
            .http
            .request(method.clone(), url)
            .header("accept", "application/json");
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        debug!("{} {}", method, path);
        let response = request
            .send()
            .await
            .map_err(|e| ConsoleError::Network(format!("Request failed: {}", e)))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = &token {
                if self.session.force_logout(token) {
                    warn!("{} {} was rejected with 401, session cleared", method, path);
                }
            }
            return Err(ConsoleError::Auth(format!("{} {} returned 401", method, path)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ConsoleError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = body.message.or(body.error).unwrap_or_default();
            return Err(ConsoleError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ConsoleResult<T> {
    serde_json::from_str(body).map_err(|e| {
        ConsoleError::InvalidResponse(format!("Failed to parse response: {} - Response body: {}", e, body))
    })
}

#[async_trait]
impl InstanceBackend for ApiClient {
    async fn list_instances(&self) -> ConsoleResult<Vec<Instance>> {
        let envelope: InstancesEnvelope = self.get(&["instances"]).await?;
        Ok(envelope.instances)
    }

    async fn get_instance(&self, id: &str) -> ConsoleResult<Instance> {
        let envelope: InstanceEnvelope = self.get(&["instances", id]).await?;
        Ok(envelope.instance)
    }

    async fn create_instance(&self, params: &CreateInstanceParams) -> ConsoleResult<Instance> {
        let envelope: InstanceEnvelope = self.post(&["instances"], Some(params)).await?;
        Ok(envelope.instance)
    }

    async fn start_instance(&self, id: &str) -> ConsoleResult<()> {
        self.post_action(&["instances", id, "start"]).await
    }

    async fn stop_instance(&self, id: &str) -> ConsoleResult<()> {
        self.post_action(&["instances", id, "stop"]).await
    }

    async fn terminate_instance(&self, id: &str) -> ConsoleResult<()> {
        self.post_action(&["instances", id, "terminate"]).await
    }

    async fn associate_elastic_ip(&self, id: &str) -> ConsoleResult<Instance> {
        let envelope: InstanceEnvelope = self
            .post(&["instances", id, "elastic-ip", "associate"], None::<&()>)
            .await?;
        Ok(envelope.instance)
    }

    async fn disassociate_elastic_ip(&self, id: &str, allocation_id: &str) -> ConsoleResult<Instance> {
        let payload = DisassociateRequest { allocation_id };
        let envelope: InstanceEnvelope = self
            .post(&["instances", id, "elastic-ip", "disassociate"], Some(&payload))
            .await?;
        Ok(envelope.instance)
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> ConsoleResult<Credentials> {
        self.post(&["auth", "login"], Some(&LoginRequest { email, password })).await
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> ConsoleResult<Credentials> {
        let payload = RegisterRequest {
            username,
            email,
            password,
        };
        self.post(&["auth", "register"], Some(&payload)).await
    }

    async fn current_user(&self) -> ConsoleResult<User> {
        let envelope: UserEnvelope = self.get(&["auth", "me"]).await?;
        Ok(envelope.user)
    }
}
