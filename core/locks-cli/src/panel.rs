//! Detail panel: the lock list as a table.

use chrono::Local;
use lfs_locks_core::{LockSnapshot, PresentationSurface};

pub const EMPTY_MESSAGE: &str = "No active Git LFS locks found.";

const HEADERS: [&str; 4] = ["ID", "File Path", "Locked By", "Locked At"];

/// Prints every snapshot it is shown as a table on stdout.
#[derive(Debug, Default)]
pub struct PanelSurface;

impl PresentationSurface for PanelSurface {
    fn update(&self, snapshot: &LockSnapshot) {
        if let Some(at) = snapshot.fetched_at() {
            println!(
                "Git LFS locks (refreshed {})",
                at.with_timezone(&Local).format("%H:%M:%S")
            );
        }
        print!("{}", render_table(snapshot));
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn notice(&self, message: &str) {
        println!("{}", message);
    }
}

/// Renders the snapshot as an aligned table, one lock per row.
pub fn render_table(snapshot: &LockSnapshot) -> String {
    if snapshot.is_empty() {
        return format!("{}\n", EMPTY_MESSAGE);
    }

    let rows: Vec<[String; 4]> = snapshot
        .records()
        .iter()
        .map(|r| {
            [
                r.id().to_string(),
                r.path().to_string(),
                r.owner_name().to_string(),
                r.display_locked_at(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(str::to_string), &widths);
    push_row(&mut out, &widths.map(|w| "-".repeat(w)), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}
