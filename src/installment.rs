use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::normalizer::{amount_cents, normalize_establishment};

/// A parsed "N/M" marker: installment `current` of `total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installment {
    pub current: u32,
    pub total: u32,
    /// Description with the marker stripped.
    pub base: String,
}

fn slash_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<base>.*?)(?:^|[\s\-*(]+)(?:PARC(?:ELA)?\.?\s*)?(?P<n>\d{1,2})\s*/\s*(?P<m>\d{1,2})\s*\)?\s*$",
        )
        .expect("valid installment regex")
    })
}

fn word_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<base>.*?)(?:^|[\s\-*(]+)(?:PARC(?:ELA)?\.?\s*)?(?P<n>\d{1,2})\s+DE\s+(?P<m>\d{1,2})\s*\)?\s*$",
        )
        .expect("valid installment regex")
    })
}

/// Detect a trailing installment marker such as `03/10`, `PARC 3/10`, `(3/10)` or `3 DE 10`.
pub fn detect(description: &str) -> Option<Installment> {
    let text = description.trim();
    let caps = slash_marker()
        .captures(text)
        .or_else(|| word_marker().captures(text))?;

    let current: u32 = caps["n"].parse().ok()?;
    let total: u32 = caps["m"].parse().ok()?;
    if current < 1 || current > total || !(2..=99).contains(&total) {
        return None;
    }

    let base = caps["base"]
        .trim_end_matches(|c: char| c.is_whitespace() || c == '-' || c == '*' || c == '(')
        .to_string();
    Some(Installment {
        current,
        total,
        base,
    })
}

/// Contract ("parcela") identifier shared by every installment of one purchase.
///
/// Derived from the merchant without its marker, the installment count and the
/// installment value, so it never depends on which installment is being looked at.
pub fn contract_id(user_id: i64, base: &str, total: u32, amount: f64) -> String {
    let input = format!(
        "parcela|{user_id}|{}|{total}|{}",
        normalize_establishment(base),
        amount_cents(amount).abs()
    );
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_plain_slash() {
        let inst = detect("MAGAZINE LUIZA 03/10").unwrap();
        assert_eq!(inst.current, 3);
        assert_eq!(inst.total, 10);
        assert_eq!(inst.base, "MAGAZINE LUIZA");
    }

    #[test]
    fn test_detect_variants() {
        let cases = [
            ("LOJAS AMERICANAS PARC 2/6", 2, 6, "LOJAS AMERICANAS"),
            ("Loja X parcela 04/12", 4, 12, "Loja X"),
            ("NETSHOES (1/3)", 1, 3, "NETSHOES"),
            ("DECATHLON - 5 DE 5", 5, 5, "DECATHLON"),
            ("AMAZON*MARKETPLACE 1 / 2", 1, 2, "AMAZON*MARKETPLACE"),
        ];
        for (desc, n, m, base) in cases {
            let inst = detect(desc).unwrap_or_else(|| panic!("no marker in {desc}"));
            assert_eq!((inst.current, inst.total), (n, m), "{desc}");
            assert_eq!(inst.base, base, "{desc}");
        }
    }

    #[test]
    fn test_detect_rejects_non_installments() {
        assert!(detect("NETFLIX.COM").is_none());
        assert!(detect("PIX RECEBIDO 15/03").is_none());
        assert!(detect("LOJA 0/10").is_none());
        assert!(detect("LOJA 1/1").is_none());
        assert!(detect("LOJA 02/10 CENTRO").is_none());
        assert!(detect("POSTO 123/10").is_none());
    }

    #[test]
    fn test_contract_id_independent_of_index() {
        let a = detect("MAGAZINE LUIZA 03/10").unwrap();
        let b = detect("Magazine Luiza PARC 04/10").unwrap();
        assert_eq!(
            contract_id(1, &a.base, a.total, -199.9),
            contract_id(1, &b.base, b.total, -199.9)
        );
    }

    #[test]
    fn test_contract_id_separates_purchases() {
        let base = contract_id(1, "MAGAZINE LUIZA", 10, -199.9);
        assert_ne!(base, contract_id(2, "MAGAZINE LUIZA", 10, -199.9));
        assert_ne!(base, contract_id(1, "MAGAZINE LUIZA", 12, -199.9));
        assert_ne!(base, contract_id(1, "MAGAZINE LUIZA", 10, -99.9));
        assert_eq!(base.len(), 32);
    }
}
