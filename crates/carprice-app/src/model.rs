// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One table row as delivered by the backend: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SelectorLevel {
    Category,
    Brand,
    Model,
    Variant,
    Year,
}

impl SelectorLevel {
    pub const ALL: [Self; 5] = [
        Self::Category,
        Self::Brand,
        Self::Model,
        Self::Variant,
        Self::Year,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Brand => "brand",
            Self::Model => "model",
            Self::Variant => "variant",
            Self::Year => "year",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "category" => Some(Self::Category),
            "brand" => Some(Self::Brand),
            "model" => Some(Self::Model),
            "variant" => Some(Self::Variant),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Category => 0,
            Self::Brand => 1,
            Self::Model => 2,
            Self::Variant => 3,
            Self::Year => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Brand => "Brand",
            Self::Model => "Model",
            Self::Variant => "Variant",
            Self::Year => "Year",
        }
    }

    pub const fn plural(self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Brand => "brands",
            Self::Model => "models",
            Self::Variant => "variants",
            Self::Year => "years",
        }
    }

    /// Path of the option endpoint for this level, relative to the API root.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Category => "/api/categories/",
            Self::Brand => "/api/brands/",
            Self::Model => "/api/models/",
            Self::Variant => "/api/variants/",
            Self::Year => "/api/years/",
        }
    }

    /// Upstream selections sent as query parameters when fetching this level.
    pub const fn query_levels(self) -> &'static [SelectorLevel] {
        match self {
            Self::Category => &[],
            Self::Brand => &[Self::Category],
            Self::Model => &[Self::Brand],
            Self::Variant => &[Self::Brand, Self::Model],
            Self::Year => &[Self::Brand, Self::Model, Self::Variant],
        }
    }

    pub fn parent(self) -> Option<Self> {
        self.index().checked_sub(1).map(|index| Self::ALL[index])
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn below(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().skip(self.index() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionGroup {
    ExteriorCondition,
    InteriorCondition,
    MechanicalCondition,
    AccidentHistory,
    ServiceHistory,
    NumberOfOwners,
    TiresBrakes,
    Modifications,
    MarketDemand,
}

impl ConditionGroup {
    pub const ALL: [Self; 9] = [
        Self::ExteriorCondition,
        Self::InteriorCondition,
        Self::MechanicalCondition,
        Self::AccidentHistory,
        Self::ServiceHistory,
        Self::NumberOfOwners,
        Self::TiresBrakes,
        Self::Modifications,
        Self::MarketDemand,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExteriorCondition => "exterior_condition",
            Self::InteriorCondition => "interior_condition",
            Self::MechanicalCondition => "mechanical_condition",
            Self::AccidentHistory => "accident_history",
            Self::ServiceHistory => "service_history",
            Self::NumberOfOwners => "number_of_owners",
            Self::TiresBrakes => "tires_brakes",
            Self::Modifications => "modifications",
            Self::MarketDemand => "market_demand",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.as_str() == value)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ExteriorCondition => "Exterior condition",
            Self::InteriorCondition => "Interior condition",
            Self::MechanicalCondition => "Mechanical condition",
            Self::AccidentHistory => "Accident history",
            Self::ServiceHistory => "Service history",
            Self::NumberOfOwners => "Number of owners",
            Self::TiresBrakes => "Tires and brakes",
            Self::Modifications => "Modifications",
            Self::MarketDemand => "Market demand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Text form of a cell used for searching, filtering and display.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Numeric reading of a cell; numeric strings count, booleans and nulls do not.
pub fn cell_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Total order over cells: missing and null first, then numbers, then text.
/// Numbers compare by value and everything else by its text form.
pub fn compare_cells(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    match (cell_number(left), cell_number(right)) {
        (Some(left_number), Some(right_number)) => left_number.total_cmp(&right_number),
        _ => cell_rank(left)
            .cmp(&cell_rank(right))
            .then_with(|| cell_text(left).cmp(&cell_text(right))),
    }
}

fn cell_rank(value: &Value) -> u8 {
    if value.is_null() {
        0
    } else if cell_number(value).is_some() {
        1
    } else {
        2
    }
}
