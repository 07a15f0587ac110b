use colored_json::to_colored_json_auto;
use dialoguer::Confirm;
use ecm_api::ApiClient;
use ecm_core::controller::LifecycleController;
use ecm_core::error::ConsoleResult;
use ecm_core::labels;
use ecm_core::lifecycle::Action;
use ecm_core::model::{CreateInstanceParams, Instance};
use ecm_core::session::AuthStatus;
use ecm_core::store::InstanceStore;
use ecm_core::view::{refresh_detail, refresh_list, DetailView, ListView};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::ls;
use crate::spinner::create_spinner;
use crate::{CliResult, Context};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

fn print_json<T: Serialize>(value: &T) -> CliResult {
    let value = serde_json::to_value(value)?;
    println!("{}", to_colored_json_auto(&value)?);
    Ok(())
}

/// Fetch `id` into a fresh store and bind a controller to it.
async fn load(ctx: &Context, id: &str) -> CliResult<LifecycleController<ApiClient>> {
    let spinner = create_spinner("インスタンスを読み込んでいます...");
    let store = InstanceStore::new(ctx.config.terminated_retention);
    let result = refresh_detail(ctx.client.as_ref(), &store, id).await;
    spinner.finish_and_clear();
    result?;
    Ok(LifecycleController::new(Arc::clone(&ctx.client), store))
}

fn report(spinner: ProgressBar, action: Action, result: ConsoleResult<Instance>) -> CliResult {
    match result {
        Ok(instance) => {
            spinner.finish_with_message(format!(
                "{}を受け付けました: {} ({})",
                labels::action_text(action),
                instance.id,
                labels::status_text(&instance.state)
            ));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

pub async fn handle_ls(ctx: &Context, json: bool) -> CliResult {
    let spinner = create_spinner("インスタンス一覧を読み込んでいます...");
    let store = InstanceStore::new(ctx.config.terminated_retention);
    let result = refresh_list(ctx.client.as_ref(), &store).await;
    spinner.finish_and_clear();
    result?;

    let instances = store.visible_instances();
    if json {
        return print_json(&instances);
    }
    if instances.is_empty() {
        println!("インスタンスがありません。`ecm create --name <名前>` で作成できます。");
    } else {
        println!("{}", ls::instances_table(&instances));
    }
    Ok(())
}

pub async fn handle_show(ctx: &Context, id: String, json: bool) -> CliResult {
    let controller = load(ctx, &id).await?;
    let store = controller.store();
    let Some(instance) = store.get(&id) else {
        return Err(format!("Instance '{}' not found", id).into());
    };
    if json {
        return print_json(&instance);
    }
    println!("{}", ls::instance_table(&instance, store.in_flight(&id).is_some()));
    Ok(())
}

pub async fn handle_create(ctx: &Context, params: CreateInstanceParams) -> CliResult {
    let controller = LifecycleController::new(
        Arc::clone(&ctx.client),
        InstanceStore::new(ctx.config.terminated_retention),
    );
    let spinner = create_spinner(format!("インスタンス「{}」を作成しています...", params.name.trim()));
    match controller.create(params).await {
        Ok(instance) => {
            spinner.finish_with_message("インスタンスの作成を開始しました。");
            println!("{}", ls::instance_table(&instance, false));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

pub async fn handle_start(ctx: &Context, id: String) -> CliResult {
    let controller = load(ctx, &id).await?;
    let spinner = create_spinner("インスタンスを起動しています...");
    let result = controller.start(&id).await;
    report(spinner, Action::Start, result)
}

pub async fn handle_stop(ctx: &Context, id: String) -> CliResult {
    let controller = load(ctx, &id).await?;
    let spinner = create_spinner("インスタンスを停止しています...");
    let result = controller.stop(&id).await;
    report(spinner, Action::Stop, result)
}

pub async fn handle_associate(ctx: &Context, id: String) -> CliResult {
    let controller = load(ctx, &id).await?;
    let spinner = create_spinner("Elastic IPを割り当てています...");
    let result = controller.associate_elastic_ip(&id).await;
    let shown = result.as_ref().ok().cloned();
    report(spinner, Action::AssociateElasticIp, result)?;
    if let Some(instance) = shown {
        println!("{}", ls::instance_table(&instance, false));
    }
    Ok(())
}

/// Without `allocation_id`, the allocation currently bound is released.
pub async fn handle_disassociate(ctx: &Context, id: String, allocation_id: Option<String>) -> CliResult {
    let controller = load(ctx, &id).await?;
    let allocation_id = match allocation_id {
        Some(allocation_id) => allocation_id,
        None => controller
            .store()
            .get(&id)
            .and_then(|instance| instance.bound_allocation().map(str::to_string))
            .unwrap_or_default(),
    };
    let spinner = create_spinner(format!("Elastic IP {} の割り当てを解除しています...", allocation_id));
    let result = controller.disassociate_elastic_ip(&id, &allocation_id).await;
    report(spinner, Action::DisassociateElasticIp, result)
}

/// Ask for confirmation, terminate, then follow the instance until the grace period ends.
pub async fn handle_terminate(ctx: &Context, id: String, yes: bool) -> CliResult {
    let view = DetailView::open(Arc::clone(&ctx.client), id.clone(), &ctx.config);
    let spinner = create_spinner("インスタンスを読み込んでいます...");
    let loaded = view.first_load().await;
    spinner.finish_and_clear();
    if loaded.is_none() {
        let message = view
            .store()
            .error()
            .unwrap_or_else(|| labels::SESSION_EXPIRED.to_string());
        return Err(message.into());
    }

    let confirmation = view.prepare_terminate()?;
    if !yes {
        let target = confirmation.instance();
        println!("この操作は取り消せません。インスタンスを終了すると、すべてのデータが失われます。");
        let confirmed = Confirm::new()
            .with_prompt(format!("インスタンス「{}」({}) を終了しますか？", target.name, target.id))
            .default(false)
            .interact()?;
        if !confirmed {
            confirmation.cancel();
            println!("キャンセルしました。");
            return Ok(());
        }
    }

    let spinner = create_spinner("インスタンスを終了しています...");
    let result = view.terminate(confirmation).await;
    report(spinner, Action::Terminate, result)?;

    let mut changes = view.store().subscribe();
    let spinner = create_spinner("");
    loop {
        if let Some(instance) = view.instance() {
            spinner.set_message(format!("状態: {}", labels::status_text(&instance.state)));
        }
        tokio::select! {
            _ = view.wait_for_exit() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    spinner.finish_and_clear();
    Ok(())
}

async fn session_lost(auth: &mut watch::Receiver<AuthStatus>) {
    loop {
        if matches!(*auth.borrow_and_update(), AuthStatus::LoggedOut { .. }) {
            return;
        }
        if auth.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn render_banner(store: &InstanceStore) {
    if let Some(error) = store.error() {
        println!("\n{}", error);
    }
    if store.is_loading() {
        println!("更新中...");
    }
}

/// Live view of the list, or of one instance, until Ctrl-C or the session ends.
pub async fn handle_watch(ctx: &Context, id: Option<String>) -> CliResult {
    let mut auth = ctx.session.subscribe();
    match id {
        None => {
            let mut view = ListView::open(Arc::clone(&ctx.client), &ctx.config);
            let mut changes = view.store().subscribe();
            let lost = loop {
                print!("{}", CLEAR_SCREEN);
                let instances = view.instances();
                if instances.is_empty() {
                    println!("インスタンスがありません。");
                } else {
                    println!("{}", ls::instances_table(&instances));
                }
                render_banner(view.store());

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break false,
                    _ = session_lost(&mut auth) => break true,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break false;
                        }
                    }
                }
            };
            view.close();
            finish_watch(lost)
        }
        Some(id) => {
            let mut view = DetailView::open(Arc::clone(&ctx.client), id.clone(), &ctx.config);
            let mut changes = view.store().subscribe();
            let lost = loop {
                print!("{}", CLEAR_SCREEN);
                match view.instance() {
                    Some(instance) => {
                        let in_flight = view.store().in_flight(&id).is_some();
                        println!("{}", ls::instance_table(&instance, in_flight));
                    }
                    None => println!("インスタンス {} を読み込んでいます...", id),
                }
                render_banner(view.store());

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break false,
                    _ = session_lost(&mut auth) => break true,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break false;
                        }
                    }
                }
            };
            view.close();
            finish_watch(lost)
        }
    }
}

fn finish_watch(session_lost: bool) -> CliResult {
    if session_lost {
        debug!("watch ended by logout");
        return Err(labels::SESSION_EXPIRED.into());
    }
    Ok(())
}
