use super::ScoreRow;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use refinery::sync::{SyncAction, SyncReport};

pub fn score_report(rows: &[ScoreRow], jobs: usize) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Id").add_attribute(Attribute::Bold),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Weight"),
        Cell::new("1st Draw"),
    ]);

    for i in 1..=3 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    let mut total: i64 = 0;
    let mut eligible = 0;
    for row in rows {
        let score_cell = match &row.score {
            Ok(s) => {
                total += s;
                Cell::new(s).fg(Color::Cyan)
            }
            Err(e) => Cell::new(e).fg(Color::Red),
        };
        if row.weight > 0 {
            eligible += 1;
        }

        table.add_row(vec![
            Cell::new(row.id).add_attribute(Attribute::Bold),
            score_cell,
            Cell::new(row.weight),
            Cell::new(format!("{:.1}%", row.share * 100.0)),
        ]);
    }

    println!("\n{}", table);
    println!(
        "Total score: {} | Eligible: {}/{} | Next batch size: {}",
        total,
        eligible,
        rows.len(),
        jobs.min(eligible)
    );
}

pub fn sync_report(report: &SyncReport) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Id").add_attribute(Attribute::Bold),
        Cell::new("Local"),
        Cell::new("Pool"),
        Cell::new("Action"),
    ]);

    for i in 1..=2 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    let fmt_score = |s: Option<i64>| s.map_or("-".to_string(), |v| v.to_string());

    for entry in &report.entries {
        let color = match entry.action {
            SyncAction::Synced => Color::Green,
            SyncAction::Kept => Color::Reset,
            SyncAction::Skipped => Color::Red,
        };
        table.add_row(vec![
            Cell::new(entry.id).add_attribute(Attribute::Bold),
            Cell::new(fmt_score(entry.local)),
            Cell::new(fmt_score(entry.pool)),
            Cell::new(entry.action).fg(color),
        ]);
    }

    println!("\n{}", table);
    println!(
        "Synced {} files | the next submission will improve the global score by {}",
        report.synced(),
        report.net_delta
    );
}
