use std::collections::HashMap;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::normalizer::{amount_cents, normalize_establishment};

/// Bumped whenever the hashed fields or their canonical form change.
pub const ID_SCHEME: &str = "v3";

/// Deterministic transaction ID: re-importing the same row always yields the same value.
pub fn transaction_id(
    user_id: i64,
    date: NaiveDate,
    establishment: &str,
    amount: f64,
    sequence: u32,
) -> String {
    let input = format!(
        "{ID_SCHEME}|{user_id}|{}|{}|{}|{sequence}",
        date.format("%Y-%m-%d"),
        normalize_establishment(establishment),
        amount_cents(amount),
    );
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..16])
}

/// Occurrence index of each row among identical (date, merchant, amount) rows earlier in the batch.
pub fn assign_sequences<'a, I>(rows: I) -> Vec<u32>
where
    I: IntoIterator<Item = (NaiveDate, &'a str, f64)>,
{
    let mut seen: HashMap<(NaiveDate, String, i64), u32> = HashMap::new();
    rows.into_iter()
        .map(|(date, establishment, amount)| {
            let key = (date, normalize_establishment(establishment), amount_cents(amount));
            let counter = seen.entry(key).or_insert(0);
            let sequence = *counter;
            *counter += 1;
            sequence
        })
        .collect()
}
