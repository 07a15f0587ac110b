pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod labels;
pub mod lifecycle;
pub mod model;
pub mod poller;
pub mod session;
pub mod store;
pub mod validation;
pub mod view;

pub use backend::{AuthBackend, Credentials, InstanceBackend};
pub use config::ConsoleConfig;
pub use controller::{LifecycleController, TerminateConfirmation};
pub use error::{ActionError, ConsoleError, ConsoleResult};
pub use lifecycle::Action;
pub use model::{CreateInstanceParams, ElasticIp, Instance, InstanceState, User};
pub use session::{AuthSession, AuthStatus};
pub use store::InstanceStore;
pub use view::{DetailView, ListView};
