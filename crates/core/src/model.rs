use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port the instance-hosted application listens on.
pub const CONSOLE_PORT: u16 = 3000;

/// Lifecycle state as reported by the backend.
///
/// Anything the backend sends outside the known set is kept verbatim in
/// `Other` so it can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Other(s) => s,
        }
    }
}

impl From<String> for InstanceState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            _ => InstanceState::Other(value),
        }
    }
}

impl From<&str> for InstanceState {
    fn from(value: &str) -> Self {
        InstanceState::from(value.to_string())
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        match state {
            InstanceState::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticIp {
    pub allocation_id: String,
    pub public_ip: String,
    pub association_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub instance_type: String,
    pub region: String,
    pub state: InstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(rename = "elasticIP", default, skip_serializing_if = "Option::is_none")]
    pub elastic_ip: Option<ElasticIp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// The address users should connect to: the elastic IP when bound, the ephemeral one otherwise.
    pub fn access_ip(&self) -> Option<&str> {
        self.elastic_ip
            .as_ref()
            .map(|eip| eip.public_ip.as_str())
            .or(self.public_ip.as_deref())
    }

    /// Link to the application served by a running instance.
    pub fn console_url(&self) -> Option<String> {
        if self.state != InstanceState::Running {
            return None;
        }
        self.access_ip()
            .map(|ip| format!("http://{}:{}", ip, CONSOLE_PORT))
    }

    pub fn bound_allocation(&self) -> Option<&str> {
        self.elastic_ip.as_ref().map(|eip| eip.allocation_id.as_str())
    }
}

/// Body of `POST /instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceParams {
    pub name: String,
    pub instance_type: String,
    pub region: String,
    #[serde(rename = "elasticIP")]
    pub elastic_ip: bool,
}

impl CreateInstanceParams {
    pub fn new(name: impl Into<String>) -> Self {
        CreateInstanceParams {
            name: name.into(),
            instance_type: crate::catalog::DEFAULT_INSTANCE_TYPE.to_string(),
            region: crate::catalog::DEFAULT_REGION.to_string(),
            elastic_ip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn instance(id: &str, state: InstanceState) -> Instance {
        let ts = DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Instance {
            id: id.to_string(),
            name: format!("{id}-box"),
            instance_type: "t3.medium".to_string(),
            region: "ap-northeast-1".to_string(),
            state,
            public_ip: None,
            private_ip: None,
            elastic_ip: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn elastic_ip(allocation_id: &str, public_ip: &str) -> ElasticIp {
        ElasticIp {
            allocation_id: allocation_id.to_string(),
            public_ip: public_ip.to_string(),
            association_id: format!("eipassoc-{allocation_id}"),
        }
    }
}
