// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use carprice_app::{
    EstimatorRuntime, OptionRequest, Record, SelectorLevel, SortDirection, SubmitRequest,
    SubmitResponse, TablePage, cell_text, compare_cells,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

/// (category, brand, model, variant, years)
type CatalogEntry = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static [u16],
);

const CATALOG: [CatalogEntry; 12] = [
    ("Hatchback", "Perodua", "Myvi", "1.5 AV", &[2022, 2019, 2017]),
    ("Hatchback", "Perodua", "Myvi", "1.3 G", &[2018, 2016]),
    ("Hatchback", "Proton", "Iriz", "1.6 Executive", &[2020]),
    ("MPV", "Perodua", "Alza", "1.5 AV", &[2023, 2022]),
    ("MPV", "Toyota", "Innova", "2.0 G", &[2019]),
    ("Sedan", "Honda", "City", "1.5 V", &[2022, 2020]),
    ("Sedan", "Toyota", "Vios", "1.5 G", &[2021, 2019]),
    ("Sedan", "BMW", "3 Series", "330e M Sport", &[2021]),
    ("SUV", "Honda", "HR-V", "1.5 V", &[2023]),
    ("SUV", "Proton", "X50", "1.5 TGDI Flagship", &[2023, 2021]),
    ("SUV", "Proton", "X70", "1.8 TGDI Premium", &[2022]),
    ("SUV", "Toyota", "Rush", "1.5 S", &[2021, 2019]),
];

const SOURCES: [&str; 2] = ["carlistmy", "mudahmy"];
const LOCATIONS: [&str; 8] = [
    "Kuala Lumpur",
    "Selangor",
    "Penang",
    "Johor",
    "Perak",
    "Sabah",
    "Sarawak",
    "Melaka",
];
const TRANSMISSIONS: [&str; 2] = ["Automatic", "Manual"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.next_u64() % (span as u64)) as i64
    }
}

/// Seeded generator of car listing rows shaped like the admin table feed.
#[derive(Debug, Clone)]
pub struct ListingFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl ListingFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    pub fn listing(&mut self) -> Record {
        let (_, brand, model, variant, years) = CATALOG[self.rng.int_n(CATALOG.len())];
        let year = years[self.rng.int_n(years.len())];
        let age = 2026 - i64::from(year);
        let mileage = self.rng.int_range(8_000, 22_000) * age.max(1);
        let price = self.rng.int_range(35, 180) * 1_000;
        let id = self.next_id;
        self.next_id += 1;

        let source = self.pick(&SOURCES);
        let transmission = self.pick(&TRANSMISSIONS);
        let location = self.pick(&LOCATIONS);
        let mut row = Record::new();
        row.insert("id".to_owned(), json!(id));
        row.insert("source".to_owned(), json!(source));
        row.insert("brand".to_owned(), json!(brand));
        row.insert("model".to_owned(), json!(model));
        row.insert("variant".to_owned(), json!(variant));
        row.insert("year".to_owned(), json!(year));
        row.insert("mileage".to_owned(), json!(mileage));
        row.insert("price".to_owned(), json!(price));
        row.insert("transmission".to_owned(), json!(transmission));
        row.insert("location".to_owned(), json!(location));
        row
    }

    pub fn listings(&mut self, count: usize) -> Vec<Record> {
        (0..count).map(|_| self.listing()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn sample_listings(count: usize) -> Vec<Record> {
    ListingFaker::new(42).listings(count)
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be a JSON object, got {other}"),
    }
}

/// Option lists as the backend would serve them for the fixed catalog.
pub fn catalog_options(level: SelectorLevel, params: &[(String, String)]) -> Result<Vec<String>> {
    let param = |key: SelectorLevel| {
        params
            .iter()
            .find(|(name, _)| name == key.as_str())
            .map(|(_, value)| value.as_str())
    };
    for required in level.query_levels() {
        // brands fall back to the full list without a category
        if level != SelectorLevel::Brand && param(*required).is_none() {
            bail!("{} parameter required", required.label());
        }
    }

    let matches = |entry: &&CatalogEntry| {
        let (category, brand, model, variant, _) = **entry;
        [
            (SelectorLevel::Category, category),
            (SelectorLevel::Brand, brand),
            (SelectorLevel::Model, model),
            (SelectorLevel::Variant, variant),
        ]
        .into_iter()
        .filter(|(key, _)| level.query_levels().contains(key))
        .all(|(key, value)| param(key).is_none_or(|wanted| wanted == value))
    };

    let entries = CATALOG.iter().filter(matches);
    let options = match level {
        SelectorLevel::Year => {
            let years: BTreeSet<u16> = entries
                .flat_map(|(_, _, _, _, years)| years.iter().copied())
                .collect();
            years.into_iter().rev().map(|year| year.to_string()).collect()
        }
        _ => {
            let names: BTreeSet<&str> = entries
                .map(|(category, brand, model, variant, _)| match level {
                    SelectorLevel::Category => *category,
                    SelectorLevel::Brand => *brand,
                    SelectorLevel::Model => *model,
                    _ => *variant,
                })
                .collect();
            names.into_iter().map(str::to_owned).collect()
        }
    };
    Ok(options)
}

/// In-memory runtime over the fixed catalog and a listing table. Every call
/// is recorded for assertions.
#[derive(Debug, Clone)]
pub struct FakeRuntime {
    listings: Vec<Record>,
    failing_levels: BTreeSet<SelectorLevel>,
    table_failure: Option<String>,
    submit_response: SubmitResponse,
    pub option_calls: Vec<OptionRequest>,
    pub table_calls: Vec<(String, Vec<(String, String)>)>,
    pub submissions: Vec<SubmitRequest>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FakeRuntime {
    pub fn new(listings: Vec<Record>) -> Self {
        Self {
            listings,
            failing_levels: BTreeSet::new(),
            table_failure: None,
            submit_response: SubmitResponse {
                success: true,
                errors: BTreeMap::new(),
                error: None,
            },
            option_calls: Vec::new(),
            table_calls: Vec::new(),
            submissions: Vec::new(),
        }
    }

    pub fn fail_level(&mut self, level: SelectorLevel) {
        self.failing_levels.insert(level);
    }

    pub fn heal_level(&mut self, level: SelectorLevel) {
        self.failing_levels.remove(&level);
    }

    pub fn fail_table(&mut self, message: Option<&str>) {
        self.table_failure = message.map(str::to_owned);
    }

    pub fn set_submit_response(&mut self, response: SubmitResponse) {
        self.submit_response = response;
    }
}

impl EstimatorRuntime for FakeRuntime {
    fn fetch_options(&mut self, request: &OptionRequest) -> Result<Vec<String>> {
        self.option_calls.push(request.clone());
        if self.failing_levels.contains(&request.level) {
            bail!("server error (500): {} lookup failed", request.level.as_str());
        }
        catalog_options(request.level, &request.params)
    }

    fn fetch_table(&mut self, endpoint: &str, query: &[(String, String)]) -> Result<TablePage> {
        self.table_calls.push((endpoint.to_owned(), query.to_vec()));
        if let Some(message) = &self.table_failure {
            bail!("{message}");
        }
        serve_table(&self.listings, query)
    }

    fn submit_form(&mut self, request: &SubmitRequest) -> Result<SubmitResponse> {
        self.submissions.push(request.clone());
        Ok(self.submit_response.clone())
    }
}

/// Mimics a server-side table endpoint: without `page` the full set is
/// returned, otherwise search, sort and paging are applied.
pub fn serve_table(listings: &[Record], query: &[(String, String)]) -> Result<TablePage> {
    let lookup = |key: &str| {
        query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    };
    let Some(page) = lookup("page") else {
        return Ok(TablePage {
            records: listings.to_vec(),
            total: listings.len(),
        });
    };
    let page: usize = page.parse()?;
    let size: usize = lookup("size").unwrap_or("25").parse()?;

    let needle = lookup("search").unwrap_or("").to_lowercase();
    let mut rows: Vec<&Record> = listings
        .iter()
        .filter(|row| {
            needle.is_empty()
                || row
                    .values()
                    .any(|value| cell_text(value).to_lowercase().contains(&needle))
        })
        .collect();
    if let Some(field) = lookup("sort") {
        let direction = lookup("direction")
            .and_then(SortDirection::parse)
            .unwrap_or(SortDirection::Asc);
        rows.sort_by(|left, right| {
            let order = compare_cells(left.get(field), right.get(field));
            match direction {
                SortDirection::Asc => order,
                SortDirection::Desc => order.reverse(),
            }
        });
    }

    let total = rows.len();
    let records = rows
        .into_iter()
        .skip(page.saturating_sub(1) * size)
        .take(size)
        .cloned()
        .collect();
    Ok(TablePage { records, total })
}

#[cfg(test)]
mod tests {
    use super::{ListingFaker, catalog_options, serve_table};
    use carprice_app::SelectorLevel;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn catalog_serves_each_level() {
        let categories = catalog_options(SelectorLevel::Category, &[]).expect("categories");
        assert_eq!(categories, vec!["Hatchback", "MPV", "SUV", "Sedan"]);

        let brands = catalog_options(SelectorLevel::Brand, &params(&[("category", "SUV")]))
            .expect("brands");
        assert_eq!(brands, vec!["Honda", "Proton", "Toyota"]);

        let years = catalog_options(
            SelectorLevel::Year,
            &params(&[("brand", "Perodua"), ("model", "Myvi"), ("variant", "1.5 AV")]),
        )
        .expect("years");
        assert_eq!(years, vec!["2022", "2019", "2017"]);
    }

    #[test]
    fn missing_upstream_parameter_is_an_error() {
        assert!(catalog_options(SelectorLevel::Model, &[]).is_err());
        assert!(catalog_options(SelectorLevel::Brand, &[]).is_ok());
    }

    #[test]
    fn faker_is_deterministic() {
        let first = ListingFaker::new(7).listings(5);
        let second = ListingFaker::new(7).listings(5);
        assert_eq!(first, second);
        assert_eq!(first[4]["id"], 5);
    }

    #[test]
    fn served_pages_respect_size() {
        let listings = ListingFaker::new(3).listings(30);
        let page = serve_table(&listings, &params(&[("page", "2"), ("size", "20")]))
            .expect("page");
        assert_eq!(page.total, 30);
        assert_eq!(page.records.len(), 10);
    }
}
