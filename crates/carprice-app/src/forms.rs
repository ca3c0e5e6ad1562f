// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{ConditionGroup, SelectorChain, SelectorLevel, VehicleSelection};

/// Which radio groups must be answered before the estimate can be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRules {
    pub required_groups: Vec<ConditionGroup>,
}

impl Default for FormRules {
    fn default() -> Self {
        Self {
            required_groups: ConditionGroup::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionAssessment {
    choices: BTreeMap<ConditionGroup, f64>,
}

impl ConditionAssessment {
    /// Checks one radio in `group`, replacing any earlier choice.
    pub fn choose(&mut self, group: ConditionGroup, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            bail!("{} needs a value -- pick one option and retry", group.label());
        }
        let parsed: f64 = trimmed
            .parse()
            .with_context(|| format!("{} value {value:?} is not a number", group.label()))?;
        if !parsed.is_finite() || parsed < 0.0 {
            bail!(
                "{} value must be a non-negative number, got {value:?}",
                group.label()
            );
        }
        self.choices.insert(group, parsed);
        Ok(())
    }

    pub fn clear(&mut self, group: ConditionGroup) {
        self.choices.remove(&group);
    }

    pub fn value(&self, group: ConditionGroup) -> Option<f64> {
        self.choices.get(&group).copied()
    }

    pub fn is_checked(&self, group: ConditionGroup) -> bool {
        self.choices.contains_key(&group)
    }

    pub fn choices(&self) -> impl Iterator<Item = (ConditionGroup, f64)> + '_ {
        self.choices.iter().map(|(group, value)| (*group, *value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Selector(SelectorLevel),
    Condition(ConditionGroup),
}

impl MissingField {
    pub fn message(self) -> String {
        match self {
            Self::Selector(level) => format!(
                "{} is required -- choose a {} and retry",
                level.label(),
                level.as_str()
            ),
            Self::Condition(group) => format!(
                "{} is required -- pick one option and retry",
                group.label()
            ),
        }
    }
}

/// First unanswered field in page order: selectors, then radio groups.
pub fn first_missing(
    chain: &SelectorChain,
    conditions: &ConditionAssessment,
    rules: &FormRules,
) -> Option<MissingField> {
    if let Some(level) = chain.first_missing() {
        return Some(MissingField::Selector(level));
    }
    ConditionGroup::ALL
        .into_iter()
        .filter(|group| rules.required_groups.contains(group))
        .find(|group| !conditions.is_checked(*group))
        .map(MissingField::Condition)
}

pub fn validate_form(
    chain: &SelectorChain,
    conditions: &ConditionAssessment,
    rules: &FormRules,
) -> Result<()> {
    if let Some(missing) = first_missing(chain, conditions, rules) {
        bail!("{}", missing.message());
    }
    Ok(())
}

pub fn is_submittable(
    chain: &SelectorChain,
    conditions: &ConditionAssessment,
    rules: &FormRules,
) -> bool {
    first_missing(chain, conditions, rules).is_none()
}

/// Accepts an empty string (no mileage) or a whole number, with optional
/// thousands separators.
pub fn parse_mileage(raw: &str) -> Result<Option<u64>> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| *ch != ',' && *ch != '_')
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    let mileage = cleaned.parse::<u64>().with_context(|| {
        format!("mileage must be a whole number of kilometres, got {raw:?}")
    })?;
    Ok(Some(mileage))
}

/// Body posted to the estimate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateRequest {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub variant: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_mileage: Option<u64>,
    #[serde(flatten)]
    pub conditions: BTreeMap<String, f64>,
}

impl EstimateRequest {
    pub fn build(
        selection: &VehicleSelection,
        user_mileage: Option<u64>,
        conditions: &ConditionAssessment,
    ) -> Result<Self> {
        let year: i32 = selection
            .year
            .trim()
            .parse()
            .with_context(|| format!("year {:?} is not a number", selection.year))?;
        Ok(Self {
            category: selection.category.clone(),
            brand: selection.brand.clone(),
            model: selection.model.clone(),
            variant: selection.variant.clone(),
            year,
            user_mileage,
            conditions: conditions
                .choices()
                .map(|(group, value)| (group.as_str().to_owned(), value))
                .collect(),
        })
    }
}
