use crate::backend::AuthBackend;
use crate::error::ConsoleResult;
use crate::model::User;
use crate::session::AuthSession;
use crate::validation::{LoginForm, RegisterForm};
use tracing::{info, warn};

pub async fn login<B: AuthBackend + ?Sized>(
    backend: &B,
    session: &AuthSession,
    form: &LoginForm,
) -> ConsoleResult<User> {
    form.validate()?;
    let credentials = backend.login(&form.email, &form.password).await?;
    let user = credentials.user.clone();
    session.store(credentials)?;
    info!(user = %user.username, "logged in");
    Ok(user)
}

pub async fn register<B: AuthBackend + ?Sized>(
    backend: &B,
    session: &AuthSession,
    form: &RegisterForm,
) -> ConsoleResult<User> {
    form.validate()?;
    let credentials = backend
        .register(&form.username, &form.email, &form.password)
        .await?;
    let user = credentials.user.clone();
    session.store(credentials)?;
    info!(user = %user.username, "registered");
    Ok(user)
}

/// Re-read the current user. A session the backend no longer accepts is cleared.
pub async fn refresh_current_user<B: AuthBackend + ?Sized>(
    backend: &B,
    session: &AuthSession,
) -> ConsoleResult<User> {
    match backend.current_user().await {
        Ok(user) => {
            session.update_user(user.clone())?;
            Ok(user)
        }
        Err(e) => {
            warn!("failed to fetch current user: {}", e);
            if let Err(clear_err) = session.logout() {
                warn!("failed to clear session: {}", clear_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Credentials;
    use crate::error::ConsoleError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAuth {
        calls: Mutex<u32>,
        reject: bool,
    }

    fn user(name: &str) -> User {
        User {
            id: 1,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            created_at: None,
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        async fn login(&self, email: &str, _password: &str) -> ConsoleResult<Credentials> {
            *self.calls.lock().unwrap() += 1;
            if self.reject {
                return Err(ConsoleError::Backend {
                    status: 400,
                    message: "メールアドレスまたはパスワードが正しくありません".to_string(),
                });
            }
            let name = email.split('@').next().unwrap_or_default();
            Ok(Credentials {
                user: user(name),
                token: "tok-login".to_string(),
            })
        }

        async fn register(&self, username: &str, _email: &str, _password: &str) -> ConsoleResult<Credentials> {
            *self.calls.lock().unwrap() += 1;
            Ok(Credentials {
                user: user(username),
                token: "tok-register".to_string(),
            })
        }

        async fn current_user(&self) -> ConsoleResult<User> {
            *self.calls.lock().unwrap() += 1;
            if self.reject {
                Err(ConsoleError::Auth("expired".to_string()))
            } else {
                Ok(user("renamed"))
            }
        }
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let backend = FakeAuth::default();
        let session = AuthSession::in_memory();
        let form = LoginForm {
            email: "dev@example.com".to_string(),
            password: "secret1".to_string(),
        };
        let user = login(&backend, &session, &form).await.unwrap();
        assert_eq!(user.username, "dev");
        assert_eq!(session.token().as_deref(), Some("tok-login"));
    }

    #[tokio::test]
    async fn test_invalid_login_never_reaches_backend() {
        let backend = FakeAuth::default();
        let session = AuthSession::in_memory();
        let form = LoginForm {
            email: "dev".to_string(),
            password: String::new(),
        };
        let err = login(&backend, &session, &form).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        assert_eq!(*backend.calls.lock().unwrap(), 0);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_login_keeps_backend_message() {
        let backend = FakeAuth {
            reject: true,
            ..Default::default()
        };
        let session = AuthSession::in_memory();
        let form = LoginForm {
            email: "dev@example.com".to_string(),
            password: "wrong".to_string(),
        };
        let err = login(&backend, &session, &form).await.unwrap_err();
        assert_eq!(err.localized(), "メールアドレスまたはパスワードが正しくありません");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_then_refresh_user() {
        let backend = FakeAuth::default();
        let session = AuthSession::in_memory();
        let form = RegisterForm {
            username: "dev".to_string(),
            email: "dev@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };
        register(&backend, &session, &form).await.unwrap();
        assert_eq!(session.token().as_deref(), Some("tok-register"));

        refresh_current_user(&backend, &session).await.unwrap();
        assert_eq!(session.user().unwrap().username, "renamed");
        assert_eq!(session.token().as_deref(), Some("tok-register"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let backend = FakeAuth {
            reject: true,
            ..Default::default()
        };
        let session = AuthSession::in_memory();
        session
            .store(Credentials {
                user: user("dev"),
                token: "tok-old".to_string(),
            })
            .unwrap();
        assert!(refresh_current_user(&backend, &session).await.is_err());
        assert!(!session.is_authenticated());
    }
}
