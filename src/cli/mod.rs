pub mod banks;
pub mod budgets;
pub mod classify;
pub mod exclusions;
pub mod import;
pub mod init;
pub mod patterns;
pub mod report;
pub mod review;
pub mod rules;
pub mod status;
pub mod users;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{FinError, Result};
use crate::models::User;
use crate::settings::{db_path, resolve_user_email};
use crate::users::find_active_user;

/// Open the ledger database; it must have been created by `finbook init`.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(FinError::Other(format!(
            "Database not found at {}. Run `finbook init` to set up.",
            path.display()
        )));
    }
    get_connection(&path)
}

/// The user a command acts on: `--user` or the configured default.
pub(crate) fn current_user(conn: &Connection, explicit: Option<&str>) -> Result<User> {
    let email = resolve_user_email(explicit)?;
    find_active_user(conn, &email)
}

#[derive(Parser)]
#[command(name = "finbook", version, about = "Personal finance tracker: import statements, deduplicate and classify spending.")]
pub struct Cli {
    /// Email of the user to act on (default: `default_user` from settings)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for finbook data (default: ~/Documents/finbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Import a bank statement or card invoice (CSV, XLS, XLSX, OFX).
    Import {
        /// Path to the file to import
        file: String,
        /// Bank the file comes from, e.g. nubank
        #[arg(long)]
        bank: String,
        /// Document kind: statement (extrato) or invoice (fatura)
        #[arg(long, default_value = "statement")]
        kind: String,
        /// File format: csv, xls, xlsx, ofx (default: from the extension)
        #[arg(long)]
        format: Option<String>,
        /// Parse and classify without writing anything
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Re-run the classification cascade on unclassified transactions.
    Classify,
    /// Review unclassified transactions.
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Manage keyword rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage exclusions (transactions that never count as spending).
    Exclusions {
        #[command(subcommand)]
        command: ExclusionsCommands,
    },
    /// Learned merchant patterns.
    Patterns {
        #[command(subcommand)]
        command: PatternsCommands,
    },
    /// Monthly budgets.
    Budgets {
        #[command(subcommand)]
        command: BudgetsCommands,
    },
    /// Supported bank file layouts.
    Banks {
        #[command(subcommand)]
        command: BanksCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show current database and ledger statistics.
    Status,
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Add a user.
    Add {
        name: String,
        email: String,
        /// Make this user the default for commands without --user
        #[arg(long)]
        default: bool,
    },
    /// List users.
    List,
    /// Rename a user.
    Rename { id: i64, name: String },
    /// Deactivate a user (the ledger is kept).
    Deactivate { id: i64 },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List unclassified transactions.
    List,
    /// Classify a transaction by hand.
    Set {
        /// Transaction ID (shown in `finbook review list`)
        id: i64,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        /// Spend type: fixed, flexible, investment, income, transfer, ignored
        #[arg(long = "spend-type", default_value = "flexible")]
        spend_type: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a keyword rule.
    Add {
        /// Pattern matched against the normalized merchant
        pattern: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        /// Spend type: fixed, flexible, investment, income, transfer, ignored
        #[arg(long = "spend-type", default_value = "flexible")]
        spend_type: String,
        /// Match type: contains, starts_with, exact, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        /// Direction: debit, credit, any
        #[arg(long, default_value = "any")]
        direction: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
        /// Share the rule with every user
        #[arg(long)]
        global: bool,
    },
    /// List the rules visible to the user.
    List,
    /// Update an existing rule.
    Update {
        /// Rule ID (shown in `finbook rules list`)
        id: i64,
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// New subcategory; pass an empty value to clear it
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long = "spend-type")]
        spend_type: Option<String>,
        #[arg(long = "match-type")]
        match_type: Option<String>,
        #[arg(long)]
        direction: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
    },
    /// Delete (deactivate) a rule by ID.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ExclusionsCommands {
    /// Add an exclusion.
    Add {
        pattern: String,
        /// Match type: contains, starts_with, exact, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        /// Only apply to files from this bank
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List exclusions.
    List,
    /// Delete (deactivate) an exclusion by ID.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum PatternsCommands {
    /// Rebuild learned patterns from the classified ledger.
    Learn {
        /// Minimum entries per merchant (default from settings)
        #[arg(long = "min-occurrences")]
        min_occurrences: Option<i64>,
        /// Minimum share of the dominant category, 0-1 (default from settings)
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
    },
    /// List learned patterns.
    List,
}

#[derive(Subcommand)]
pub enum BudgetsCommands {
    /// Set (or replace) a category budget for a month.
    Set {
        category: String,
        amount: f64,
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// List budgets.
    List {
        #[arg(long)]
        month: Option<String>,
    },
    /// Delete a budget by ID.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum BanksCommands {
    /// List known bank layouts.
    List,
    /// Register a bank layout.
    Add {
        bank: String,
        /// statement or invoice
        #[arg(long)]
        kind: String,
        /// csv, xls, xlsx, ofx
        #[arg(long)]
        format: String,
        /// Date column header (`|` separates alternatives)
        #[arg(long = "date-column", default_value = "")]
        date_column: String,
        #[arg(long = "description-column", default_value = "")]
        description_column: String,
        #[arg(long = "amount-column", default_value = "")]
        amount_column: String,
        /// chrono format of the date column, e.g. %d/%m/%Y
        #[arg(long = "date-format")]
        date_format: Option<String>,
        /// ok, tbd, unsupported
        #[arg(long, default_value = "tbd")]
        status: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change the support status of a layout.
    Status { id: i64, status: String },
    /// Delete a layout.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Spending by category and income for a month.
    Monthly {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Budget against actual spending for a month.
    Budget {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
}
