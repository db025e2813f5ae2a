use std::fmt;

use chrono::NaiveDate;

use crate::error::{FinError, Result};
use crate::installment::Installment;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendType {
    Fixed,
    Flexible,
    Investment,
    Income,
    Transfer,
    Ignored,
}

impl SpendType {
    pub const ALL: [SpendType; 6] = [
        Self::Fixed,
        Self::Flexible,
        Self::Investment,
        Self::Income,
        Self::Transfer,
        Self::Ignored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Flexible => "flexible",
            Self::Investment => "investment",
            Self::Income => "income",
            Self::Transfer => "transfer",
            Self::Ignored => "ignored",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|t| t.as_str() == key)
            .copied()
            .ok_or_else(|| FinError::invalid("spend type", raw))
    }
}

impl fmt::Display for SpendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which cascade tier (or person) produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClassificationSource {
    Installment,
    CardPayment,
    Exclusion,
    LearnedPattern,
    History,
    Keyword,
    Manual,
    Unclassified,
}

impl ClassificationSource {
    pub const ALL: [ClassificationSource; 8] = [
        Self::Installment,
        Self::CardPayment,
        Self::Exclusion,
        Self::LearnedPattern,
        Self::History,
        Self::Keyword,
        Self::Manual,
        Self::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installment => "installment",
            Self::CardPayment => "card_payment",
            Self::Exclusion => "exclusion",
            Self::LearnedPattern => "learned_pattern",
            Self::History => "history",
            Self::Keyword => "keyword",
            Self::Manual => "manual",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|s| s.as_str() == raw)
            .copied()
            .ok_or_else(|| FinError::invalid("classification source", raw))
    }
}

impl fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub const UNCLASSIFIED_CATEGORY: &str = "Não Classificado";
pub const CARD_PAYMENT_CATEGORY: &str = "Pagamento Cartão";
pub const EXCLUDED_CATEGORY: &str = "Excluído";

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub subcategory: Option<String>,
    pub spend_type: SpendType,
    pub source: ClassificationSource,
    /// Ignored entries stay in the ledger for deduplication but never count as spending.
    pub ignored: bool,
}

impl Classification {
    pub fn unclassified() -> Self {
        Self {
            category: UNCLASSIFIED_CATEGORY.to_string(),
            subcategory: None,
            spend_type: SpendType::Flexible,
            source: ClassificationSource::Unclassified,
            ignored: false,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.source != ClassificationSource::Unclassified
    }

    /// Same category data, attributed to another source.
    pub fn with_source(&self, source: ClassificationSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}

/// Intermediate representation from a file reader: untouched strings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: String,
    pub description: String,
    pub amount: String,
}

/// A row after normalization and identity assignment, ready for dedup and classification.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub transaction_id: String,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// `normalize_establishment(description)`, installment marker included.
    pub establishment: String,
    /// Establishment with the installment marker stripped.
    pub base: String,
    pub amount: f64,
    pub sequence: u32,
    pub installment: Option<Installment>,
    pub parcela_id: Option<String>,
    pub bank: String,
}
