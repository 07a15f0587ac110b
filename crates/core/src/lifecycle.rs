use crate::error::ActionError;
use crate::model::{Instance, InstanceState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-triggered mutation of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Start,
    Stop,
    Terminate,
    AssociateElasticIp,
    DisassociateElasticIp,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Start,
        Action::Stop,
        Action::Terminate,
        Action::AssociateElasticIp,
        Action::DisassociateElasticIp,
    ];

    /// Whether `action` may be issued against `instance` in its current state.
    pub fn check(self, instance: &Instance) -> Result<(), ActionError> {
        let allowed = match self {
            Action::Start => instance.state == InstanceState::Stopped,
            Action::Stop => instance.state == InstanceState::Running,
            Action::Terminate => matches!(
                instance.state,
                InstanceState::Running | InstanceState::Stopped
            ),
            Action::AssociateElasticIp => {
                if instance.elastic_ip.is_some() {
                    return Err(ActionError::NotEligible {
                        id: instance.id.clone(),
                        action: self,
                        state: instance.state.clone(),
                    });
                }
                instance.state == InstanceState::Running
            }
            Action::DisassociateElasticIp => {
                if instance.elastic_ip.is_none() {
                    return Err(ActionError::NoElasticIp {
                        id: instance.id.clone(),
                    });
                }
                !matches!(
                    instance.state,
                    InstanceState::ShuttingDown | InstanceState::Terminated
                )
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(ActionError::NotEligible {
                id: instance.id.clone(),
                action: self,
                state: instance.state.clone(),
            })
        }
    }

    /// State shown locally while the request is in flight.
    ///
    /// Elastic IP actions have none: the address is assigned by the server.
    pub fn optimistic_state(self) -> Option<InstanceState> {
        match self {
            Action::Start => Some(InstanceState::Pending),
            Action::Stop => Some(InstanceState::Stopping),
            Action::Terminate => Some(InstanceState::ShuttingDown),
            Action::AssociateElasticIp | Action::DisassociateElasticIp => None,
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Action::Start => "インスタンスの起動中にエラーが発生しました。",
            Action::Stop => "インスタンスの停止中にエラーが発生しました。",
            Action::Terminate => "インスタンスの終了中にエラーが発生しました。",
            Action::AssociateElasticIp => "Elastic IPの関連付け中にエラーが発生しました。",
            Action::DisassociateElasticIp => {
                "Elastic IPの関連付け解除中にエラーが発生しました。"
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Terminate => "terminate",
            Action::AssociateElasticIp => "associate-ip",
            Action::DisassociateElasticIp => "disassociate-ip",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Instance {
    /// Every action that may currently be issued. Empty for terminated and transitional states.
    pub fn available_actions(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| action.check(self).is_ok())
            .collect()
    }
}
