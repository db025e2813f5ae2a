use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::classifier::ClassifierContext;
use crate::compatibility::{resolve_format, DocumentKind, FileFormat};
use crate::dedup::{existing_ids, partition};
use crate::error::Result;
use crate::identity::{assign_sequences, transaction_id};
use crate::installment::{contract_id, detect};
use crate::models::{Candidate, Classification, ClassificationSource, RawRow};
use crate::normalizer::{establishment_base, normalize_establishment, parse_amount, parse_date};
use crate::reader::read_rows;
use crate::rules::record_hits;
use crate::settings::Settings;
use crate::users::find_active_user;

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

pub struct ImportRequest {
    pub path: PathBuf,
    pub user_email: String,
    pub bank: String,
    pub kind: DocumentKind,
    /// Taken from the file extension when not given.
    pub file_format: Option<FileFormat>,
    pub dry_run: bool,
}

#[derive(Default)]
pub struct ImportResult {
    pub parsed: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub by_source: BTreeMap<ClassificationSource, usize>,
    pub duplicate_file: bool,
    /// Every fresh row with its classification, in file order.
    pub preview: Vec<(Candidate, Classification)>,
}

/// Turn raw rows into candidates: parse, detect installments, assign sequence and ID.
///
/// Rows without a usable date, amount or description are dropped and counted.
pub fn build_candidates(
    rows: &[RawRow],
    user_id: i64,
    bank: &str,
    date_format: Option<&str>,
) -> (Vec<Candidate>, usize) {
    let mut parsed = Vec::new();
    let mut invalid = 0usize;
    for (line, row) in rows.iter().enumerate() {
        let description = row.description.trim();
        let date = parse_date(&row.date, date_format);
        let amount = parse_amount(&row.amount);
        match (date, amount) {
            (Some(date), Some(amount)) if !normalize_establishment(description).is_empty() => {
                parsed.push((date, description.to_string(), amount));
            }
            _ => {
                log::warn!(
                    "skipping row {}: date={:?} description={:?} amount={:?}",
                    line + 1,
                    row.date,
                    row.description,
                    row.amount
                );
                invalid += 1;
            }
        }
    }

    let sequences = assign_sequences(parsed.iter().map(|(d, desc, a)| (*d, desc.as_str(), *a)));
    let candidates = parsed
        .into_iter()
        .zip(sequences)
        .map(|((date, description, amount), sequence)| {
            let installment = detect(&description);
            let parcela_id = installment
                .as_ref()
                .map(|i| contract_id(user_id, &i.base, i.total, amount));
            Candidate {
                transaction_id: transaction_id(user_id, date, &description, amount, sequence),
                user_id,
                date,
                establishment: normalize_establishment(&description),
                base: establishment_base(&description),
                description,
                amount,
                sequence,
                installment,
                parcela_id,
                bank: bank.trim().to_lowercase(),
            }
        })
        .collect();
    (candidates, invalid)
}

pub fn import_file(conn: &Connection, request: &ImportRequest, settings: &Settings) -> Result<ImportResult> {
    let user = find_active_user(conn, &request.user_email)?;

    let checksum = compute_checksum(&request.path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND user_id = ?2")?;
        if stmt.exists(rusqlite::params![checksum, user.id])? {
            log::info!("{} was already imported for {}", request.path.display(), user.email);
            return Ok(ImportResult {
                duplicate_file: true,
                ..Default::default()
            });
        }
    }

    let file_format = match request.file_format {
        Some(f) => f,
        None => FileFormat::from_path(&request.path)?,
    };
    let format = resolve_format(conn, &request.bank, request.kind, file_format)?;
    let rows = read_rows(&request.path, &format)?;

    let (candidates, invalid) = build_candidates(&rows, user.id, &request.bank, format.date_format.as_deref());
    let parsed = candidates.len();

    let existing = existing_ids(conn, user.id)?;
    let batch = partition(candidates, &existing, |c| c.transaction_id.as_str());

    let mut ctx = ClassifierContext::load(conn, user.id, settings)?;
    let mut by_source: BTreeMap<ClassificationSource, usize> = BTreeMap::new();
    let mut preview = Vec::with_capacity(batch.fresh.len());
    for candidate in batch.fresh {
        let classification = ctx.classify(&candidate);
        *by_source.entry(classification.source).or_default() += 1;
        preview.push((candidate, classification));
    }

    let mut result = ImportResult {
        parsed,
        imported: 0,
        duplicates: batch.duplicates.len(),
        invalid,
        by_source,
        duplicate_file: false,
        preview,
    };

    if request.dry_run {
        log::info!(
            "dry run of {}: {} new, {} duplicates, {} invalid",
            request.path.display(),
            result.preview.len(),
            result.duplicates,
            result.invalid
        );
        return Ok(result);
    }

    let tx = conn.unchecked_transaction()?;
    let dates: Vec<String> = result
        .preview
        .iter()
        .map(|(c, _)| c.date.format("%Y-%m-%d").to_string())
        .collect();
    tx.execute(
        "INSERT INTO imports (user_id, filename, bank, kind, record_count, imported_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            user.id,
            request.path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            request.bank.trim().to_lowercase(),
            request.kind.as_str(),
            rows.len() as i64,
            result.preview.len() as i64,
            dates.iter().min(),
            dates.iter().max(),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    for (c, class) in &result.preview {
        insert_transaction(&tx, c, class, import_id)?;
    }
    record_hits(&tx, ctx.rule_hits())?;
    tx.commit()?;

    result.imported = result.preview.len();
    log::info!(
        "imported {} of {} rows from {} ({} duplicates, {} invalid)",
        result.imported,
        result.parsed,
        request.path.display(),
        result.duplicates,
        result.invalid
    );
    Ok(result)
}

fn insert_transaction(conn: &Connection, c: &Candidate, class: &Classification, import_id: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO transactions (transaction_id, user_id, date, description, establishment, establishment_base, amount, \
         installment_current, installment_total, parcela_id, bank, category, subcategory, spend_type, source, is_ignored, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )?;
    stmt.execute(rusqlite::params![
        c.transaction_id,
        c.user_id,
        c.date.format("%Y-%m-%d").to_string(),
        c.description,
        c.establishment,
        c.base,
        c.amount,
        c.installment.as_ref().map(|i| i.current),
        c.installment.as_ref().map(|i| i.total),
        c.parcela_id,
        c.bank,
        class.category,
        class.subcategory,
        class.spend_type.as_str(),
        class.source.as_str(),
        class.ignored as i32,
        import_id,
    ])?;
    Ok(())
}

pub struct ReclassifyResult {
    pub examined: usize,
    pub updated: usize,
    pub by_source: BTreeMap<ClassificationSource, usize>,
}

/// Run the cascade again over a user's unclassified entries, oldest first.
pub fn reclassify(conn: &Connection, user_id: i64, settings: &Settings) -> Result<ReclassifyResult> {
    let mut stmt = conn.prepare(
        "SELECT id, transaction_id, date, description, establishment, establishment_base, amount, parcela_id, bank \
         FROM transactions WHERE user_id = ?1 AND source = 'unclassified' ORDER BY date ASC, id ASC",
    )?;
    type Row = (
        i64,
        String,
        String,
        String,
        String,
        String,
        f64,
        Option<String>,
        Option<String>,
    );
    let rows: Vec<Row> = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut ctx = ClassifierContext::load(conn, user_id, settings)?;
    let mut updates = Vec::new();
    let mut by_source: BTreeMap<ClassificationSource, usize> = BTreeMap::new();
    let examined = rows.len();
    for (id, txn_id, date, description, establishment, base, amount, parcela_id, bank) in rows {
        let Some(date) = parse_date(&date, Some("%Y-%m-%d")) else {
            log::warn!("transaction {id} has an unreadable date {date:?}");
            continue;
        };
        let installment = detect(&description);
        let candidate = Candidate {
            transaction_id: txn_id,
            user_id,
            date,
            description,
            establishment,
            base,
            amount,
            sequence: 0,
            installment,
            parcela_id,
            bank: bank.unwrap_or_default(),
        };
        let class = ctx.classify(&candidate);
        if class.is_classified() {
            *by_source.entry(class.source).or_default() += 1;
            updates.push((id, class));
        }
    }

    let tx = conn.unchecked_transaction()?;
    for (id, class) in &updates {
        tx.execute(
            "UPDATE transactions SET category = ?1, subcategory = ?2, spend_type = ?3, source = ?4, is_ignored = ?5 WHERE id = ?6",
            rusqlite::params![
                class.category,
                class.subcategory,
                class.spend_type.as_str(),
                class.source.as_str(),
                class.ignored as i32,
                id,
            ],
        )?;
    }
    record_hits(&tx, ctx.rule_hits())?;
    tx.commit()?;

    log::info!("reclassified {} of {examined} unclassified entries for user {user_id}", updates.len());
    Ok(ReclassifyResult {
        examined,
        updated: updates.len(),
        by_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::users::add_user;
    use std::io::Write;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        add_user(&conn, "Ana", "ana@example.com").unwrap();
        (dir, conn)
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn request(path: PathBuf) -> ImportRequest {
        ImportRequest {
            path,
            user_email: "ana@example.com".to_string(),
            bank: "Nubank".to_string(),
            kind: DocumentKind::Invoice,
            file_format: None,
            dry_run: false,
        }
    }

    const INVOICE: &str = "Data;Lançamento;Valor\n\
        05/03/2025;SUPERMERCADO DIA;-120,50\n\
        05/03/2025;SUPERMERCADO DIA;-120,50\n\
        06/03/2025;PAGAMENTO RECEBIDO;1.500,00\n\
        07/03/2025;LOJA NOVA 01/03;-99,90\n\
        xx/03/2025;LINHA RUIM;-1,00\n\
        08/03/2025;Salário ACME;5.000,00\n";

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_import_classifies_and_counts() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        let result = import_file(&conn, &request(path), &Settings::default()).unwrap();

        assert_eq!(result.parsed, 5);
        assert_eq!(result.invalid, 1);
        assert_eq!(result.duplicates, 0);
        assert_eq!(result.imported, 5);
        assert_eq!(count(&conn), 5);
        assert_eq!(result.by_source.get(&ClassificationSource::Keyword), Some(&3));
        assert_eq!(result.by_source.get(&ClassificationSource::CardPayment), Some(&1));
        assert_eq!(result.by_source.get(&ClassificationSource::Unclassified), Some(&1));

        let (parcela, current): (Option<String>, Option<i64>) = conn
            .query_row(
                "SELECT parcela_id, installment_current FROM transactions WHERE establishment_base = 'LOJA NOVA'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(parcela.is_some());
        assert_eq!(current, Some(1));
    }

    #[test]
    fn test_identical_rows_in_one_file_are_kept() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        import_file(&conn, &request(path), &Settings::default()).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT transaction_id) FROM transactions WHERE establishment = 'SUPERMERCADO DIA'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_reimport_same_file_short_circuits() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        import_file(&conn, &request(path.clone()), &Settings::default()).unwrap();
        let again = import_file(&conn, &request(path), &Settings::default()).unwrap();
        assert!(again.duplicate_file);
        assert_eq!(count(&conn), 5);
    }

    #[test]
    fn test_overlapping_file_only_adds_new_rows() {
        let (dir, conn) = test_db();
        let first = write_csv(dir.path(), "a.csv", INVOICE);
        import_file(&conn, &request(first), &Settings::default()).unwrap();

        let overlap = format!("{INVOICE}09/03/2025;PADARIA CENTRAL;-12,00\n");
        let second = write_csv(dir.path(), "b.csv", &overlap);
        let result = import_file(&conn, &request(second), &Settings::default()).unwrap();
        assert_eq!(result.duplicates, 5);
        assert_eq!(result.imported, 1);
        assert_eq!(count(&conn), 6);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        let mut req = request(path.clone());
        req.dry_run = true;
        let result = import_file(&conn, &req, &Settings::default()).unwrap();
        assert_eq!(result.preview.len(), 5);
        assert_eq!(result.imported, 0);
        assert_eq!(count(&conn), 0);

        // A dry run does not record the checksum either.
        let real = import_file(&conn, &request(path), &Settings::default()).unwrap();
        assert!(!real.duplicate_file);
    }

    #[test]
    fn test_malformed_rows_are_counted_as_invalid() {
        let (dir, conn) = test_db();
        let content = "Data;Lançamento;Valor\n\
            05/03/2025;MERCADO;-10,00\n\
            06/03/2025;;-5,00\n\
            07/03/2025;LOJA\n\
            08/03/2025;PADARIA;\n\
            ;;\n";
        let path = write_csv(dir.path(), "fatura.csv", content);
        let mut req = request(path);
        req.dry_run = true;
        let result = import_file(&conn, &req, &Settings::default()).unwrap();
        assert_eq!(result.parsed, 1);
        assert_eq!(result.invalid, 3);
    }

    #[test]
    fn test_failed_import_rolls_back() {
        let (dir, conn) = test_db();
        conn.execute_batch(
            "CREATE TRIGGER reject_loja BEFORE INSERT ON transactions \
             WHEN NEW.establishment_base = 'LOJA NOVA' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        assert!(import_file(&conn, &request(path.clone()), &Settings::default()).is_err());

        let imports: i64 = conn.query_row("SELECT COUNT(*) FROM imports", [], |r| r.get(0)).unwrap();
        assert_eq!(imports, 0);
        assert_eq!(count(&conn), 0);
        let hits: i64 = conn
            .query_row("SELECT COALESCE(SUM(hit_count), 0) FROM keyword_rules", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hits, 0);

        conn.execute_batch("DROP TRIGGER reject_loja;").unwrap();
        let retry = import_file(&conn, &request(path), &Settings::default()).unwrap();
        assert!(!retry.duplicate_file);
        assert_eq!(retry.imported, 5);
        assert_eq!(count(&conn), 5);
    }

    #[test]
    fn test_later_installment_links_to_classified_one() {
        let (dir, conn) = test_db();
        let first = write_csv(dir.path(), "mar.csv", "Data;Lançamento;Valor\n07/03/2025;LOJA NOVA 01/03;-99,90\n");
        import_file(&conn, &request(first), &Settings::default()).unwrap();
        conn.execute(
            "UPDATE transactions SET category = 'Casa', spend_type = 'flexible', source = 'manual'",
            [],
        )
        .unwrap();

        let second = write_csv(dir.path(), "abr.csv", "Data;Lançamento;Valor\n07/04/2025;LOJA NOVA 02/03;-99,90\n");
        let result = import_file(&conn, &request(second), &Settings::default()).unwrap();
        let (_, class) = &result.preview[0];
        assert_eq!(class.source, ClassificationSource::Installment);
        assert_eq!(class.category, "Casa");
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        let mut req = request(path);
        req.user_email = "nobody@example.com".to_string();
        assert!(import_file(&conn, &req, &Settings::default()).is_err());
    }

    #[test]
    fn test_keyword_hits_are_recorded() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        import_file(&conn, &request(path), &Settings::default()).unwrap();
        let hits: i64 = conn
            .query_row("SELECT hit_count FROM keyword_rules WHERE pattern = 'SUPERMERCADO'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_reclassify_picks_up_new_rules() {
        let (dir, conn) = test_db();
        let path = write_csv(dir.path(), "fatura.csv", INVOICE);
        import_file(&conn, &request(path), &Settings::default()).unwrap();
        conn.execute(
            "INSERT INTO keyword_rules (pattern, category, spend_type) VALUES ('LOJA NOVA', 'Compras', 'flexible')",
            [],
        )
        .unwrap();

        let user = find_active_user(&conn, "ana@example.com").unwrap();
        let result = reclassify(&conn, user.id, &Settings::default()).unwrap();
        assert_eq!(result.examined, 1);
        assert_eq!(result.updated, 1);
        let category: String = conn
            .query_row("SELECT category FROM transactions WHERE establishment_base = 'LOJA NOVA'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(category, "Compras");
    }

    #[test]
    fn test_build_candidates_assigns_sequences() {
        let rows = vec![
            RawRow { date: "01/02/2025".into(), description: "CAFE".into(), amount: "-5,00".into() },
            RawRow { date: "01/02/2025".into(), description: "Café".into(), amount: "-5,00".into() },
            RawRow { date: "".into(), description: "CAFE".into(), amount: "-5,00".into() },
        ];
        let (candidates, invalid) = build_candidates(&rows, 1, "Itau", None);
        assert_eq!(invalid, 1);
        assert_eq!(candidates[0].sequence, 0);
        assert_eq!(candidates[1].sequence, 1);
        assert_ne!(candidates[0].transaction_id, candidates[1].transaction_id);
        assert_eq!(candidates[0].bank, "itau");
    }
}
