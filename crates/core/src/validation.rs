use crate::catalog;
use crate::model::CreateInstanceParams;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid")
});

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in a form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.errors.iter().map(|e| e.field).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

pub fn validate_create_instance(params: &CreateInstanceParams) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if params.name.trim().is_empty() {
        errors.push("name", "インスタンス名を入力してください。");
    }
    if catalog::instance_type(&params.instance_type).is_none() {
        errors.push("instanceType", "インスタンスタイプを選択してください。");
    }
    if catalog::region(&params.region).is_none() {
        errors.push("region", "リージョンを選択してください。");
    }

    errors.into_result()
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.push("password", "パスワードを入力してください");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.username.is_empty() {
            errors.push("username", "ユーザー名を入力してください");
        } else if self.username.chars().count() < MIN_USERNAME_LEN {
            errors.push("username", "ユーザー名は3文字以上で入力してください");
        }

        check_email(&self.email, &mut errors);

        if self.password.is_empty() {
            errors.push("password", "パスワードを入力してください");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push("password", "パスワードは6文字以上で入力してください");
        }

        if self.confirm_password.is_empty() {
            errors.push("confirmPassword", "パスワード（確認）を入力してください");
        } else if self.password != self.confirm_password {
            errors.push("confirmPassword", "パスワードが一致しません");
        }

        errors.into_result()
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.push("email", "メールアドレスを入力してください");
    } else if !EMAIL.is_match(email) {
        errors.push("email", "有効なメールアドレスを入力してください");
    }
}
