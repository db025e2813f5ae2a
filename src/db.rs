use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS bank_formats (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    kind TEXT NOT NULL,
    file_format TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'tbd',
    date_column TEXT NOT NULL DEFAULT '',
    description_column TEXT NOT NULL DEFAULT '',
    amount_column TEXT NOT NULL DEFAULT '',
    date_format TEXT,
    notes TEXT,
    UNIQUE (bank, kind, file_format)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    bank TEXT NOT NULL,
    kind TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    imported_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    transaction_id TEXT NOT NULL UNIQUE,
    user_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    establishment TEXT NOT NULL,
    establishment_base TEXT NOT NULL,
    amount REAL NOT NULL,
    installment_current INTEGER,
    installment_total INTEGER,
    parcela_id TEXT,
    bank TEXT,
    category TEXT NOT NULL,
    subcategory TEXT,
    spend_type TEXT NOT NULL,
    source TEXT NOT NULL,
    is_ignored INTEGER DEFAULT 0,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_base ON transactions (user_id, establishment_base);
CREATE INDEX IF NOT EXISTS idx_transactions_parcela ON transactions (parcela_id);

CREATE TABLE IF NOT EXISTS keyword_rules (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    pattern TEXT NOT NULL,
    match_type TEXT DEFAULT 'contains',
    direction TEXT DEFAULT 'any',
    category TEXT NOT NULL,
    subcategory TEXT,
    spend_type TEXT NOT NULL DEFAULT 'flexible',
    priority INTEGER DEFAULT 0,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS exclusions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    pattern TEXT NOT NULL,
    match_type TEXT DEFAULT 'contains',
    bank TEXT,
    reason TEXT,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS learned_patterns (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT,
    spend_type TEXT NOT NULL,
    occurrences INTEGER NOT NULL,
    confidence REAL NOT NULL,
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (user_id, pattern),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    month TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    UNIQUE (user_id, month, category),
    FOREIGN KEY (user_id) REFERENCES users(id)
);
";

// (bank, kind, file_format, status, date_column, description_column, amount_column, notes)
const DEFAULT_BANK_FORMATS: &[(&str, &str, &str, &str, &str, &str, &str, &str)] = &[
    ("generic", "statement", "csv", "ok", "Data", "Descrição|Histórico|Lançamento", "Valor", "Header row with date, description and amount columns"),
    ("generic", "invoice", "csv", "ok", "Data", "Lançamento|Descrição|Estabelecimento", "Valor", "Card invoice export"),
    ("generic", "statement", "xlsx", "ok", "Data", "Descrição|Histórico|Lançamento", "Valor", "First worksheet"),
    ("generic", "invoice", "xlsx", "ok", "Data", "Lançamento|Descrição|Estabelecimento", "Valor", "First worksheet"),
    ("generic", "statement", "xls", "ok", "Data", "Descrição|Histórico|Lançamento", "Valor", "First worksheet"),
    ("generic", "invoice", "xls", "tbd", "Data", "Lançamento|Descrição|Estabelecimento", "Valor", "Legacy Excel invoices vary by issuer"),
    ("generic", "statement", "ofx", "ok", "", "", "", "STMTTRN blocks"),
    ("generic", "invoice", "ofx", "ok", "", "", "", "STMTTRN blocks"),
];

// (pattern, match_type, direction, category, subcategory, spend_type, priority)
const DEFAULT_KEYWORD_RULES: &[(&str, &str, &str, &str, &str, &str, i64)] = &[
    ("SALARIO", "contains", "credit", "Receita", "Salário", "income", 20),
    ("RENDIMENTO", "contains", "credit", "Receita", "Rendimentos", "income", 10),
    ("APLICACAO", "contains", "debit", "Investimentos", "Aplicação", "investment", 10),
    ("ALUGUEL", "contains", "debit", "Moradia", "Aluguel", "fixed", 10),
    ("NETFLIX", "contains", "any", "Assinaturas", "Streaming", "fixed", 5),
    ("SPOTIFY", "contains", "any", "Assinaturas", "Streaming", "fixed", 5),
    ("IFOOD", "contains", "debit", "Alimentação", "Delivery", "flexible", 5),
    ("SUPERMERCADO", "contains", "debit", "Alimentação", "Supermercado", "flexible", 0),
    ("PADARIA", "contains", "debit", "Alimentação", "Padaria", "flexible", 0),
    ("RESTAURANTE", "contains", "debit", "Alimentação", "Restaurante", "flexible", 0),
    ("POSTO", "starts_with", "debit", "Transporte", "Combustível", "flexible", 0),
    ("UBER", "starts_with", "debit", "Transporte", "Aplicativo", "flexible", 0),
    ("DROGARIA", "contains", "debit", "Saúde", "Farmácia", "flexible", 0),
    ("FARMACIA", "contains", "debit", "Saúde", "Farmácia", "flexible", 0),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    for f in DEFAULT_BANK_FORMATS {
        conn.execute(
            "INSERT OR IGNORE INTO bank_formats (bank, kind, file_format, status, date_column, description_column, amount_column, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![f.0, f.1, f.2, f.3, f.4, f.5, f.6, f.7],
        )?;
    }

    let count: i64 = conn.query_row("SELECT count(*) FROM keyword_rules", [], |row| row.get(0))?;
    if count == 0 {
        for r in DEFAULT_KEYWORD_RULES {
            conn.execute(
                "INSERT INTO keyword_rules (pattern, match_type, direction, category, subcategory, spend_type, priority) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![r.0, r.1, r.2, r.3, r.4, r.5, r.6],
            )?;
        }
    }
    Ok(())
}
