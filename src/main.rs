mod budgets;
mod classifier;
mod cli;
mod compatibility;
mod db;
mod dedup;
mod error;
mod exclusions;
mod fmt;
mod identity;
mod importer;
mod installment;
mod matcher;
mod models;
mod normalizer;
mod patterns;
mod reader;
mod reports;
mod reviewer;
mod rules;
mod settings;
mod users;

use clap::Parser;

use cli::{
    BanksCommands, BudgetsCommands, Cli, Commands, ExclusionsCommands, PatternsCommands,
    ReportCommands, ReviewCommands, RulesCommands, UsersCommands,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let user = cli.user.as_deref();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Users { command } => match command {
            UsersCommands::Add { name, email, default } => cli::users::add(&name, &email, default),
            UsersCommands::List => cli::users::list(),
            UsersCommands::Rename { id, name } => cli::users::rename(id, &name),
            UsersCommands::Deactivate { id } => cli::users::deactivate(id),
        },
        Commands::Import {
            file,
            bank,
            kind,
            format,
            dry_run,
        } => cli::import::run(user, &file, &bank, &kind, format.as_deref(), dry_run),
        Commands::Classify => cli::classify::run(user),
        Commands::Review { command } => match command {
            ReviewCommands::List => cli::review::list(user),
            ReviewCommands::Set {
                id,
                category,
                subcategory,
                spend_type,
            } => cli::review::set(user, id, &category, subcategory.as_deref(), &spend_type),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                subcategory,
                spend_type,
                match_type,
                direction,
                priority,
                global,
            } => cli::rules::add(
                user,
                cli::rules::RuleArgs {
                    pattern,
                    category,
                    subcategory,
                    spend_type,
                    match_type,
                    direction,
                    priority,
                    global,
                },
            ),
            RulesCommands::List => cli::rules::list(user),
            RulesCommands::Update {
                id,
                pattern,
                category,
                subcategory,
                spend_type,
                match_type,
                direction,
                priority,
            } => cli::rules::update(
                id,
                pattern,
                category,
                subcategory,
                spend_type.as_deref(),
                match_type.as_deref(),
                direction.as_deref(),
                priority,
            ),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Exclusions { command } => match command {
            ExclusionsCommands::Add {
                pattern,
                match_type,
                bank,
                reason,
            } => cli::exclusions::add(user, &pattern, &match_type, bank.as_deref(), reason.as_deref()),
            ExclusionsCommands::List => cli::exclusions::list(user),
            ExclusionsCommands::Delete { id } => cli::exclusions::delete(user, id),
        },
        Commands::Patterns { command } => match command {
            PatternsCommands::Learn {
                min_occurrences,
                min_confidence,
            } => cli::patterns::learn(user, min_occurrences, min_confidence),
            PatternsCommands::List => cli::patterns::list(user),
        },
        Commands::Budgets { command } => match command {
            BudgetsCommands::Set {
                category,
                amount,
                month,
            } => cli::budgets::set(user, &category, amount, &month),
            BudgetsCommands::List { month } => cli::budgets::list(user, month.as_deref()),
            BudgetsCommands::Delete { id } => cli::budgets::delete(user, id),
        },
        Commands::Banks { command } => match command {
            BanksCommands::List => cli::banks::list(),
            BanksCommands::Add {
                bank,
                kind,
                format,
                date_column,
                description_column,
                amount_column,
                date_format,
                status,
                notes,
            } => cli::banks::add(cli::banks::FormatArgs {
                bank,
                kind,
                format,
                date_column,
                description_column,
                amount_column,
                date_format,
                status,
                notes,
            }),
            BanksCommands::Status { id, status } => cli::banks::status(id, &status),
            BanksCommands::Delete { id } => cli::banks::delete(id),
        },
        Commands::Report { command } => match command {
            ReportCommands::Monthly { month } => cli::report::monthly(user, &month),
            ReportCommands::Budget { month } => cli::report::budget(user, &month),
        },
        Commands::Status => cli::status::run(user),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
