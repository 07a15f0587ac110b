//! User-facing Japanese strings.

use crate::lifecycle::Action;
use crate::model::InstanceState;

pub const LIST_LOAD_FAILURE: &str = "インスタンスの読み込み中にエラーが発生しました。";
pub const DETAIL_LOAD_FAILURE: &str = "インスタンスの読み込み中にエラーが発生しました。";
pub const CREATE_FAILURE: &str = "インスタンスの作成中にエラーが発生しました。";
pub const NETWORK_FAILURE: &str = "サーバーに接続できませんでした。";
pub const UNEXPECTED_RESPONSE: &str = "サーバーから予期しない応答がありました。";
pub const SESSION_EXPIRED: &str = "セッションの有効期限が切れました。再度ログインしてください。";
pub const SESSION_STORAGE_FAILURE: &str = "ログイン情報の保存に失敗しました。";
pub const ACTION_IN_PROGRESS: &str = "他の操作を実行中です。";
pub const INSTANCE_NOT_FOUND: &str = "インスタンスが見つかりません。";
pub const NO_ELASTIC_IP: &str = "Elastic IPが割り当てられていません。";
pub const STALE_ALLOCATION: &str =
    "表示中のElastic IPは既に変更されています。最新の状態を確認してください。";
pub const LOGIN_FAILURE: &str = "ログインに失敗しました";
pub const REGISTER_FAILURE: &str = "ユーザー登録に失敗しました";
pub const CURRENT_USER_FAILURE: &str = "ユーザー情報の取得に失敗しました";
pub const NOT_ASSIGNED: &str = "割り当てなし";

/// How a state should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Active,
    Inactive,
    Transitional,
    Gone,
}

pub fn status_text(state: &InstanceState) -> &str {
    match state {
        InstanceState::Running => "実行中",
        InstanceState::Stopped => "停止中",
        InstanceState::Pending => "起動中",
        InstanceState::Stopping => "停止処理中",
        InstanceState::ShuttingDown => "終了処理中",
        InstanceState::Terminated => "終了済み",
        InstanceState::Other(raw) => raw,
    }
}

pub fn status_tone(state: &InstanceState) -> StatusTone {
    match state {
        InstanceState::Running => StatusTone::Active,
        InstanceState::Stopped => StatusTone::Inactive,
        InstanceState::Pending | InstanceState::Stopping | InstanceState::ShuttingDown => {
            StatusTone::Transitional
        }
        InstanceState::Terminated | InstanceState::Other(_) => StatusTone::Gone,
    }
}

pub fn action_text(action: Action) -> &'static str {
    match action {
        Action::Start => "起動",
        Action::Stop => "停止",
        Action::Terminate => "終了",
        Action::AssociateElasticIp => "Elastic IPを割り当て",
        Action::DisassociateElasticIp => "Elastic IPの割り当てを解除",
    }
}

pub fn not_eligible(action: Action) -> String {
    format!("現在の状態では「{}」を実行できません。", action_text(action))
}
