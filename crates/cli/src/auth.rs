use dialoguer::{Input, Password};
use ecm_core::auth;
use ecm_core::labels;
use ecm_core::validation::{LoginForm, RegisterForm};

use crate::spinner::create_spinner;
use crate::{CliResult, Context};

fn prompt_email(email: Option<String>) -> CliResult<String> {
    match email {
        Some(email) => Ok(email),
        None => Ok(Input::<String>::new().with_prompt("メールアドレス").interact_text()?),
    }
}

pub async fn handle_login(ctx: &Context, email: Option<String>) -> CliResult {
    let form = LoginForm {
        email: prompt_email(email)?,
        password: Password::new().with_prompt("パスワード").interact()?,
    };

    let spinner = create_spinner("ログインしています...");
    let result = auth::login(ctx.client.as_ref(), &ctx.session, &form).await;
    spinner.finish_and_clear();
    match result {
        Ok(user) => {
            println!("{} としてログインしました。", user.username);
            Ok(())
        }
        Err(e) if e.is_auth() => Err(labels::LOGIN_FAILURE.into()),
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_register(ctx: &Context, username: Option<String>, email: Option<String>) -> CliResult {
    let username = match username {
        Some(username) => username,
        None => Input::<String>::new().with_prompt("ユーザー名").interact_text()?,
    };
    let email = prompt_email(email)?;
    let password = Password::new().with_prompt("パスワード").interact()?;
    let confirm_password = Password::new().with_prompt("パスワード（確認）").interact()?;
    let form = RegisterForm {
        username,
        email,
        password,
        confirm_password,
    };

    let spinner = create_spinner("ユーザーを登録しています...");
    let result = auth::register(ctx.client.as_ref(), &ctx.session, &form).await;
    spinner.finish_and_clear();
    match result {
        Ok(user) => {
            println!("{} として登録し、ログインしました。", user.username);
            Ok(())
        }
        Err(e) if e.is_auth() => Err(labels::REGISTER_FAILURE.into()),
        Err(e) => Err(e.into()),
    }
}

pub fn handle_logout(ctx: &Context) -> CliResult {
    ctx.session.logout()?;
    println!("ログアウトしました。");
    Ok(())
}

/// Asks the backend rather than trusting the stored user.
pub async fn handle_whoami(ctx: &Context) -> CliResult {
    if !ctx.session.is_authenticated() {
        println!("ログインしていません。");
        return Ok(());
    }
    match auth::refresh_current_user(ctx.client.as_ref(), &ctx.session).await {
        Ok(user) => {
            println!("{} <{}>", user.username, user.email);
            Ok(())
        }
        Err(e) if e.is_auth() => Err(e.into()),
        Err(_) => Err(labels::CURRENT_USER_FAILURE.into()),
    }
}
