use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use gummy_core::orchestrator::Profile;
use gummy_core::store::{HostRow, PortRow};

const MAX_CELL: usize = 30;

/// Cuts long cell values to `MAX_CELL` characters plus an ellipsis.
pub fn truncate(value: &str) -> String {
    if value.chars().count() > MAX_CELL {
        let head: String = value.chars().take(MAX_CELL).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn opt(value: &Option<String>) -> Cell {
    Cell::new(truncate(value.as_deref().unwrap_or("-")))
}

pub fn hosts(rows: &[HostRow]) -> Table {
    let mut table = new_table(vec!["Address", "Hostname", "Vendor", "Open", "TCP", "UDP"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.addr),
            opt(&row.hostname),
            opt(&row.vendor),
            Cell::new(row.open_count),
            Cell::new(truncate(&row.tcp.join(","))),
            Cell::new(truncate(&row.udp.join(","))),
        ]);
    }
    table
}

pub fn ports(rows: &[PortRow]) -> Table {
    let mut table = new_table(vec!["Port", "Count", "Rating", "Description", "Hosts"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.key()),
            Cell::new(row.count()),
            Cell::new(format!("{:.3}", row.rating)),
            Cell::new(truncate(&row.descriptions.join("; "))),
            Cell::new(truncate(&row.hosts.join(","))),
        ]);
    }
    table
}

pub fn profiles(profiles: &[Profile]) -> Table {
    let mut table = new_table(vec!["Id", "Profile", "Description"]);
    for profile in profiles {
        table.add_row(vec![
            Cell::new(profile.id),
            Cell::new(profile.name),
            Cell::new(profile.description),
        ]);
    }
    table
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
