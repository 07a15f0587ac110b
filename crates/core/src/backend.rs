use crate::error::ConsoleResult;
use crate::model::{CreateInstanceParams, Instance, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Instance operations offered by the provisioning backend.
#[async_trait]
pub trait InstanceBackend: Send + Sync {
    async fn list_instances(&self) -> ConsoleResult<Vec<Instance>>;
    async fn get_instance(&self, id: &str) -> ConsoleResult<Instance>;
    async fn create_instance(&self, params: &CreateInstanceParams) -> ConsoleResult<Instance>;
    async fn start_instance(&self, id: &str) -> ConsoleResult<()>;
    async fn stop_instance(&self, id: &str) -> ConsoleResult<()>;
    async fn terminate_instance(&self, id: &str) -> ConsoleResult<()>;
    /// Returns the instance with the newly bound address.
    async fn associate_elastic_ip(&self, id: &str) -> ConsoleResult<Instance>;
    async fn disassociate_elastic_ip(&self, id: &str, allocation_id: &str) -> ConsoleResult<Instance>;
}

/// What a successful login or registration returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: User,
    pub token: String,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> ConsoleResult<Credentials>;
    async fn register(&self, username: &str, email: &str, password: &str) -> ConsoleResult<Credentials>;
    async fn current_user(&self) -> ConsoleResult<User>;
}
