use crate::cli::{current_user, open_db};
use crate::error::Result;
use crate::importer::reclassify;
use crate::settings::load_settings;

pub fn run(user: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = current_user(&conn, user)?;
    let result = reclassify(&conn, user.id, &load_settings())?;
    println!(
        "{} classified, {} still unclassified",
        result.updated,
        result.examined - result.updated
    );
    for (source, n) in &result.by_source {
        println!("  {source:<16} {n}");
    }
    Ok(())
}
