use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, Table};
use ecm_core::catalog::{INSTANCE_TYPES, REGIONS};
use ecm_core::labels::{self, StatusTone};
use ecm_core::model::{Instance, InstanceState};

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn status_cell(state: &InstanceState) -> Cell {
    let color = match labels::status_tone(state) {
        StatusTone::Active => Color::Green,
        StatusTone::Inactive => Color::Red,
        StatusTone::Transitional => Color::Yellow,
        StatusTone::Gone => Color::DarkGrey,
    };
    Cell::new(labels::status_text(state)).fg(color)
}

pub fn instances_table(instances: &[Instance]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "名前", "インスタンスタイプ", "リージョン", "状態", "IPアドレス", "作成日時"]);

    for instance in instances {
        table.add_row(vec![
            Cell::new(&instance.id),
            Cell::new(&instance.name),
            Cell::new(&instance.instance_type),
            Cell::new(&instance.region),
            status_cell(&instance.state),
            Cell::new(instance.access_ip().unwrap_or("-")),
            Cell::new(format_timestamp(&instance.created_at)),
        ]);
    }
    table
}

/// Key/value view of one instance, with the actions it currently allows.
pub fn instance_table(instance: &Instance, in_flight: bool) -> Table {
    let mut table = Table::new();
    let elastic_ip = instance
        .elastic_ip
        .as_ref()
        .map(|eip| format!("{} ({})", eip.public_ip, eip.allocation_id))
        .unwrap_or_else(|| labels::NOT_ASSIGNED.to_string());
    let actions = if in_flight {
        labels::ACTION_IN_PROGRESS.to_string()
    } else {
        let available: Vec<&str> = instance
            .available_actions()
            .into_iter()
            .map(labels::action_text)
            .collect();
        if available.is_empty() {
            "-".to_string()
        } else {
            available.join(", ")
        }
    };

    table.set_header(vec![Cell::new(&instance.name), status_cell(&instance.state)]);
    table.add_row(vec!["インスタンスID", instance.id.as_str()]);
    table.add_row(vec!["インスタンスタイプ", instance.instance_type.as_str()]);
    table.add_row(vec!["リージョン", instance.region.as_str()]);
    table.add_row(vec!["作成日時".to_string(), format_timestamp(&instance.created_at)]);
    table.add_row(vec!["更新日時".to_string(), format_timestamp(&instance.updated_at)]);
    table.add_row(vec![
        "パブリックIPアドレス",
        instance.public_ip.as_deref().unwrap_or(labels::NOT_ASSIGNED),
    ]);
    table.add_row(vec![
        "プライベートIPアドレス",
        instance.private_ip.as_deref().unwrap_or(labels::NOT_ASSIGNED),
    ]);
    table.add_row(vec!["Elastic IP".to_string(), elastic_ip]);
    if let Some(url) = instance.console_url() {
        table.add_row(vec!["URL".to_string(), url]);
    }
    table.add_row(vec!["操作".to_string(), actions]);
    table
}

pub fn types_table() -> Table {
    let mut table = Table::new();
    table.set_header(vec!["インスタンスタイプ", "スペック", "料金"]);
    for option in INSTANCE_TYPES {
        table.add_row(vec![option.id, option.description, option.price]);
    }
    table
}

pub fn regions_table() -> Table {
    let mut table = Table::new();
    table.set_header(vec!["リージョン", "名前"]);
    for option in REGIONS {
        table.add_row(vec![option.id, option.name]);
    }
    table
}
