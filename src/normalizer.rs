use chrono::NaiveDate;

use crate::installment;

fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        'Ñ' => 'N',
        'Ý' => 'Y',
        other => other,
    }
}

/// Canonical merchant name: uppercase ASCII words separated by single spaces.
pub fn normalize_establishment(raw: &str) -> String {
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized merchant with any trailing installment marker removed.
pub fn establishment_base(raw: &str) -> String {
    match installment::detect(raw) {
        Some(inst) => normalize_establishment(&inst.base),
        None => normalize_establishment(raw),
    }
}

pub fn amount_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Parse a monetary string in either Brazilian (`1.234,56`) or US (`1,234.56`) notation.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .replace('"', "")
        .replace("R$", "")
        .replace('$', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if let Some(rest) = s.strip_suffix(|c: char| c == 'D' || c == 'd') {
        negative = true;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_suffix(|c: char| c == 'C' || c == 'c') {
        s = rest.to_string();
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = !negative;
        s = inner.to_string();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (None, Some(comma)) => {
            let decimals = s.len() - comma - 1;
            if s.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Parse a statement date. `hint` is a chrono format tried before the built-in ones.
pub fn parse_date(raw: &str, hint: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(fmt) = hint {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    // OFX: YYYYMMDD optionally followed by time and timezone
    if let Some(prefix) = raw.get(..8) {
        if prefix.chars().all(|c| c.is_ascii_digit()) {
            return NaiveDate::parse_from_str(prefix, "%Y%m%d").ok();
        }
    }

    let token = raw.split_whitespace().next()?;
    let token = token.split('T').next().unwrap_or(token);

    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() == 3 && parts[0].len() != 4 && parts[2].len() == 2 {
        return NaiveDate::parse_from_str(token, "%d/%m/%y").ok();
    }
    if parts.len() == 3 && parts[2].len() != 4 && parts[0].len() != 4 {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_establishment() {
        assert_eq!(normalize_establishment("  Padaria São João  "), "PADARIA SAO JOAO");
        assert_eq!(normalize_establishment("IFOOD*Restaurante-Açaí"), "IFOOD RESTAURANTE ACAI");
        assert_eq!(normalize_establishment("uber   *trip"), "UBER TRIP");
        assert_eq!(normalize_establishment(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_establishment("Drogaria  Araújo - Loja 12");
        assert_eq!(normalize_establishment(&once), once);
    }

    #[test]
    fn test_establishment_base_strips_installment() {
        assert_eq!(establishment_base("MAGAZINE LUIZA 03/10"), "MAGAZINE LUIZA");
        assert_eq!(establishment_base("Magazine Luiza PARC 4/10"), "MAGAZINE LUIZA");
        assert_eq!(establishment_base("NETFLIX.COM"), "NETFLIX COM");
    }

    #[test]
    fn test_parse_amount_brazilian() {
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("R$ -50,00"), Some(-50.0));
        assert_eq!(parse_amount("\"12,5\""), Some(12.5));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
    }

    #[test]
    fn test_parse_amount_us() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("$-42.50"), Some(-42.5));
        assert_eq!(parse_amount("1,000"), Some(1000.0));
    }

    #[test]
    fn test_parse_amount_markers() {
        assert_eq!(parse_amount("(500,00)"), Some(-500.0));
        assert_eq!(parse_amount("150,00 D"), Some(-150.0));
        assert_eq!(parse_amount("150,00 C"), Some(150.0));
        assert_eq!(parse_amount("75,10-"), Some(-75.1));
        assert_eq!(parse_amount("+150,00"), Some(150.0));
        assert_eq!(parse_amount("+100.00"), Some(100.0));
        assert_eq!(parse_amount("R$ +1.234,56"), Some(1234.56));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("+"), None);
        assert_eq!(parse_amount("+-5"), None);
    }

    #[test]
    fn test_amount_cents_rounds() {
        assert_eq!(amount_cents(19.99), 1999);
        assert_eq!(amount_cents(-0.1 - 0.2), -30);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("15/01/2025", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("15/01/25", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("2025-01-15", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("15-01-2025", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("15.01.2025", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("20250115120000[-3:BRT]", None), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date("2025-01-15 00:00:00", None), Some(ymd(2025, 1, 15)));
    }

    #[test]
    fn test_parse_date_hint_first() {
        assert_eq!(parse_date("01/15/2025", Some("%m/%d/%Y")), Some(ymd(2025, 1, 15)));
    }

    #[test]
    fn test_parse_date_rejects_invalid() {
        assert_eq!(parse_date("30/02/2025", None), None);
        assert_eq!(parse_date("2025/13/01", None), None);
        assert_eq!(parse_date("ontem", None), None);
        assert_eq!(parse_date("", None), None);
    }
}
