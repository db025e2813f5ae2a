use comfy_table::{Cell, Table};

use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::matcher::MatchType;
use crate::models::SpendType;
use crate::rules::{add_rule, delete_rule, list_rules, update_rule, Direction, NewRule, RuleUpdate};

pub struct RuleArgs {
    pub pattern: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub spend_type: String,
    pub match_type: String,
    pub direction: String,
    pub priority: i64,
    pub global: bool,
}

pub fn add(user: Option<&str>, args: RuleArgs) -> Result<()> {
    let conn = open_db()?;
    let user_id = if args.global {
        None
    } else {
        Some(current_user(&conn, user)?.id)
    };
    let rule = NewRule {
        user_id,
        pattern: args.pattern,
        match_type: MatchType::parse(&args.match_type)?,
        direction: Direction::parse(&args.direction)?,
        category: args.category,
        subcategory: args.subcategory,
        spend_type: SpendType::parse(&args.spend_type)?,
        priority: args.priority,
    };
    let id = add_rule(&conn, &rule)?;
    println!("Added rule {id}: '{}' \u{2192} {}", rule.pattern, rule.category);
    Ok(())
}

pub fn list(user: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    // Without a resolvable user only the global rules are shown.
    let user_id = current_user(&conn, user).ok().map(|u| u.id);

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Pattern", "Match", "Direction", "Category", "Subcategory", "Spend", "Priority", "Hits", "Scope",
    ]);
    for r in list_rules(&conn, user_id)? {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(r.pattern),
            Cell::new(r.match_type.as_str()),
            Cell::new(r.direction.as_str()),
            Cell::new(r.category),
            Cell::new(r.subcategory.unwrap_or_default()),
            Cell::new(r.spend_type),
            Cell::new(r.priority),
            Cell::new(r.hit_count),
            Cell::new(if r.user_id.is_some() { "user" } else { "global" }),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn update(
    id: i64,
    pattern: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    spend_type: Option<&str>,
    match_type: Option<&str>,
    direction: Option<&str>,
    priority: Option<i64>,
) -> Result<()> {
    let conn = open_db()?;
    let update = RuleUpdate {
        pattern,
        match_type: match_type.map(MatchType::parse).transpose()?,
        direction: direction.map(Direction::parse).transpose()?,
        category,
        // An empty --subcategory clears it.
        subcategory: subcategory.map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        spend_type: spend_type.map(SpendType::parse).transpose()?,
        priority,
    };
    update_rule(&conn, id, &update)?;
    println!("Updated rule {id}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    delete_rule(&conn, id)?;
    println!("Deleted rule {id}");
    Ok(())
}
