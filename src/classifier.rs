//! Layered classification cascade.
//!
//! Tiers run in a fixed order and the first one that answers wins:
//! installment linkage, card-payment filter, exclusions, learned patterns,
//! history, keyword rules. Anything left is unclassified.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::Result;
use crate::exclusions::list_exclusions;
use crate::matcher::Matcher;
use crate::models::{
    Candidate, Classification, ClassificationSource, SpendType, CARD_PAYMENT_CATEGORY,
    EXCLUDED_CATEGORY,
};
use crate::normalizer::normalize_establishment;
use crate::patterns::{list_patterns, LearnedPattern};
use crate::rules::{list_rules, Direction, KeywordRule};
use crate::settings::Settings;

struct CompiledExclusion {
    matcher: Matcher,
    bank: Option<String>,
}

struct CompiledRule {
    id: i64,
    matcher: Matcher,
    direction: Direction,
    category: String,
    subcategory: Option<String>,
    spend_type: SpendType,
}

/// Everything the cascade consults, loaded once per batch.
pub struct ClassifierContext {
    card_payment_patterns: Vec<String>,
    exclusions: Vec<CompiledExclusion>,
    /// Longest pattern first so the most specific merchant wins.
    patterns: Vec<LearnedPattern>,
    history: HashMap<String, Classification>,
    installments: HashMap<String, Classification>,
    /// Highest priority first.
    rules: Vec<CompiledRule>,
    rule_hits: HashMap<i64, i64>,
}

impl ClassifierContext {
    pub fn new(card_payment_patterns: &[String]) -> Self {
        Self {
            card_payment_patterns: card_payment_patterns
                .iter()
                .map(|p| normalize_establishment(p))
                .filter(|p| !p.is_empty())
                .collect(),
            exclusions: Vec::new(),
            patterns: Vec::new(),
            history: HashMap::new(),
            installments: HashMap::new(),
            rules: Vec::new(),
            rule_hits: HashMap::new(),
        }
    }

    /// Load the user's exclusions, learned patterns, ledger history and keyword rules.
    pub fn load(conn: &Connection, user_id: i64, settings: &Settings) -> Result<Self> {
        let mut ctx = Self::new(&settings.card_payment_patterns);

        for exclusion in list_exclusions(conn, user_id)? {
            match Matcher::compile(&exclusion.pattern, exclusion.match_type) {
                Ok(matcher) => ctx.add_exclusion(matcher, exclusion.bank.as_deref()),
                Err(e) => log::warn!("skipping exclusion {}: {e}", exclusion.id),
            }
        }

        for pattern in list_patterns(conn, user_id)? {
            ctx.add_pattern(pattern);
        }

        for rule in list_rules(conn, Some(user_id))? {
            let id = rule.id;
            if let Err(e) = ctx.add_rule(rule) {
                log::warn!("skipping keyword rule {id}: {e}");
            }
        }

        let mut stmt = conn.prepare(
            "SELECT establishment_base, parcela_id, category, subcategory, spend_type, source, is_ignored \
             FROM transactions WHERE user_id = ?1 AND source != 'unclassified' \
             ORDER BY date ASC, id ASC",
        )?;
        let rows: Vec<(String, Option<String>, String, Option<String>, String, String, bool)> = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get::<_, i64>(6)? != 0,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Later rows overwrite earlier ones: the most recent classification wins.
        for (base, parcela_id, category, subcategory, spend_type, source, ignored) in rows {
            let classification = Classification {
                category,
                subcategory,
                spend_type: SpendType::parse(&spend_type)?,
                source: ClassificationSource::parse(&source)?,
                ignored,
            };
            if let Some(parcela_id) = &parcela_id {
                ctx.link_installment(parcela_id, classification.clone());
            }
            if !ignored {
                ctx.add_history(&base, classification);
            }
        }

        log::debug!(
            "classifier context for user {user_id}: {} exclusions, {} patterns, {} rules, {} merchants in history",
            ctx.exclusions.len(),
            ctx.patterns.len(),
            ctx.rules.len(),
            ctx.history.len()
        );
        Ok(ctx)
    }

    pub fn add_exclusion(&mut self, matcher: Matcher, bank: Option<&str>) {
        self.exclusions.push(CompiledExclusion {
            matcher,
            bank: bank.map(|b| b.to_string()),
        });
    }

    pub fn add_pattern(&mut self, pattern: LearnedPattern) {
        self.patterns.push(pattern);
        self.patterns
            .sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()).then_with(|| a.pattern.cmp(&b.pattern)));
    }

    /// Rules must be added highest priority first.
    pub fn add_rule(&mut self, rule: KeywordRule) -> Result<()> {
        let matcher = Matcher::compile(&rule.pattern, rule.match_type)?;
        self.rules.push(CompiledRule {
            id: rule.id,
            matcher,
            direction: rule.direction,
            category: rule.category,
            subcategory: rule.subcategory,
            spend_type: rule.spend_type,
        });
        Ok(())
    }

    pub fn add_history(&mut self, establishment_base: &str, classification: Classification) {
        self.history.insert(establishment_base.to_string(), classification);
    }

    pub fn link_installment(&mut self, parcela_id: &str, classification: Classification) {
        self.installments.insert(parcela_id.to_string(), classification);
    }

    /// Keyword rule hits accumulated since the context was built, by rule ID.
    pub fn rule_hits(&self) -> &HashMap<i64, i64> {
        &self.rule_hits
    }

    /// Run the cascade for one transaction.
    ///
    /// Classified installments are remembered so later installments of the same
    /// contract in the batch link to them.
    pub fn classify(&mut self, candidate: &Candidate) -> Classification {
        let result = self.run_tiers(candidate);
        log::debug!(
            "{} {:?} -> {} ({})",
            candidate.date,
            candidate.description,
            result.category,
            result.source
        );
        if result.is_classified() {
            if let Some(parcela_id) = &candidate.parcela_id {
                self.installments
                    .entry(parcela_id.clone())
                    .or_insert_with(|| result.clone());
            }
        }
        result
    }

    fn run_tiers(&mut self, c: &Candidate) -> Classification {
        if let Some(linked) = c.parcela_id.as_ref().and_then(|id| self.installments.get(id)) {
            return linked.with_source(ClassificationSource::Installment);
        }

        if self.is_card_payment(&c.establishment) {
            return Classification {
                category: CARD_PAYMENT_CATEGORY.to_string(),
                subcategory: None,
                spend_type: SpendType::Transfer,
                source: ClassificationSource::CardPayment,
                ignored: true,
            };
        }

        if self.is_excluded(c) {
            return Classification {
                category: EXCLUDED_CATEGORY.to_string(),
                subcategory: None,
                spend_type: SpendType::Ignored,
                source: ClassificationSource::Exclusion,
                ignored: true,
            };
        }

        if let Some(p) = self.learned_pattern(&c.base) {
            return Classification {
                category: p.category.clone(),
                subcategory: p.subcategory.clone(),
                spend_type: p.spend_type,
                source: ClassificationSource::LearnedPattern,
                ignored: false,
            };
        }

        if let Some(previous) = self.history.get(&c.base) {
            return previous.with_source(ClassificationSource::History);
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.direction.accepts(c.amount) && r.matcher.is_match(&c.establishment, &c.description))
        {
            *self.rule_hits.entry(rule.id).or_default() += 1;
            return Classification {
                category: rule.category.clone(),
                subcategory: rule.subcategory.clone(),
                spend_type: rule.spend_type,
                source: ClassificationSource::Keyword,
                ignored: false,
            };
        }

        Classification::unclassified()
    }

    fn is_card_payment(&self, establishment: &str) -> bool {
        self.card_payment_patterns
            .iter()
            .any(|p| establishment.contains(p.as_str()))
    }

    fn is_excluded(&self, c: &Candidate) -> bool {
        self.exclusions.iter().any(|e| {
            let bank_ok = e
                .bank
                .as_deref()
                .map_or(true, |b| b.eq_ignore_ascii_case(c.bank.trim()));
            bank_ok && e.matcher.is_match(&c.establishment, &c.description)
        })
    }

    fn learned_pattern(&self, base: &str) -> Option<&LearnedPattern> {
        if base.is_empty() {
            return None;
        }
        self.patterns.iter().find(|p| {
            base == p.pattern
                || (base.starts_with(p.pattern.as_str())
                    && base[p.pattern.len()..].starts_with(' '))
        })
    }
}
