use comfy_table::{Cell, Table};

use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::fmt::percent;
use crate::patterns::{learn_patterns, list_patterns};
use crate::settings::load_settings;

pub fn learn(user: Option<&str>, min_occurrences: Option<i64>, min_confidence: Option<f64>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let settings = load_settings();
    let result = learn_patterns(
        &conn,
        user.id,
        min_occurrences.unwrap_or(settings.min_pattern_occurrences),
        min_confidence.unwrap_or(settings.min_pattern_confidence),
    )?;
    println!("{} patterns learned from {} merchants", result.patterns, result.groups);
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;

    let mut table = Table::new();
    table.set_header(vec!["Pattern", "Category", "Subcategory", "Spend", "Seen", "Confidence"]);
    for p in list_patterns(&conn, user.id)? {
        table.add_row(vec![
            Cell::new(p.pattern),
            Cell::new(p.category),
            Cell::new(p.subcategory.unwrap_or_default()),
            Cell::new(p.spend_type),
            Cell::new(p.occurrences),
            Cell::new(percent(p.confidence)),
        ]);
    }
    println!("Learned patterns\n{table}");
    Ok(())
}
