// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{Record, SortDirection, TableToken, cell_number, cell_text, compare_cells};

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// The whole record set is fetched once and paged, filtered and sorted
    /// locally.
    ClientSide,
    /// The backend pages, filters and sorts; only the current page is held.
    ServerSide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Contains(String),
    Equals(String),
    Range { min: Option<f64>, max: Option<f64> },
}

impl FieldFilter {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Contains(text) | Self::Equals(text) => text.trim().is_empty(),
            Self::Range { min, max } => min.is_none() && max.is_none(),
        }
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Self::Contains(needle) => cell_text(value)
                .to_lowercase()
                .contains(&needle.trim().to_lowercase()),
            Self::Equals(expected) => cell_text(value)
                .trim()
                .eq_ignore_ascii_case(expected.trim()),
            Self::Range { min, max } => match cell_number(value) {
                Some(number) => {
                    min.is_none_or(|min| number >= min) && max.is_none_or(|max| number <= max)
                }
                None => false,
            },
        }
    }

    fn query_pairs(&self, field: &str) -> Vec<(String, String)> {
        match self {
            Self::Contains(text) | Self::Equals(text) => {
                vec![(field.to_owned(), text.trim().to_owned())]
            }
            Self::Range { min, max } => {
                let mut pairs = Vec::new();
                if let Some(min) = min {
                    pairs.push((format!("{field}_min"), min.to_string()));
                }
                if let Some(max) = max {
                    pairs.push((format!("{field}_max"), max.to_string()));
                }
                pairs
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

/// Table endpoint payload: either `{data, total}` or a bare array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TableResponse {
    Paged {
        data: Vec<Record>,
        #[serde(default)]
        total: Option<usize>,
    },
    Rows(Vec<Record>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub records: Vec<Record>,
    pub total: usize,
}

impl From<TableResponse> for TablePage {
    fn from(response: TableResponse) -> Self {
        match response {
            TableResponse::Paged { data, total } => {
                let total = total.unwrap_or(data.len());
                Self {
                    records: data,
                    total,
                }
            }
            TableResponse::Rows(records) => {
                let total = records.len();
                Self { records, total }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRequest {
    pub token: TableToken,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableCommand {
    Search(String),
    Filter {
        field: String,
        filter: Option<FieldFilter>,
    },
    ClearFilters,
    Sort(String),
    GoToPage(usize),
    NextPage,
    PrevPage,
    SetPageSize(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    Filtered { matched: usize },
    Sorted(SortSpec),
    PageChanged(usize),
    Unchanged,
    ReloadRequired,
    Loaded { total: usize },
    LoadFailed(String),
    StaleResponse(TableToken),
}

#[derive(Debug, Clone)]
pub struct DataTable {
    mode: TableMode,
    records: Vec<Record>,
    view: Vec<usize>,
    total: usize,
    page: usize,
    page_size: usize,
    search: String,
    filters: BTreeMap<String, FieldFilter>,
    sort: Option<SortSpec>,
    loading: bool,
    error: Option<String>,
    pending: Option<TableToken>,
    last_token: TableToken,
}

impl DataTable {
    pub fn new(mode: TableMode, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            bail!("table page size must be at least 1");
        }
        Ok(Self {
            mode,
            records: Vec::new(),
            view: Vec::new(),
            total: 0,
            page: 1,
            page_size,
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            loading: false,
            error: None,
            pending: None,
            last_token: TableToken::new(0),
        })
    }

    /// Client-side table over an already available record set.
    pub fn with_records(records: Vec<Record>, page_size: usize) -> Result<Self> {
        let mut table = Self::new(TableMode::ClientSide, page_size)?;
        table.records = records;
        table.apply_filters();
        Ok(table)
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Row count after filtering (client side) or as reported by the server.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn filter(&self, field: &str) -> Option<&FieldFilter> {
        self.filters.get(field)
    }

    pub fn source_len(&self) -> usize {
        self.records.len()
    }

    /// Rows on the current page, in display order.
    pub fn rows(&self) -> Vec<&Record> {
        match self.mode {
            TableMode::ServerSide => self.records.iter().collect(),
            TableMode::ClientSide => {
                let start = (self.page - 1).saturating_mul(self.page_size);
                self.view
                    .iter()
                    .skip(start)
                    .take(self.page_size)
                    .filter_map(|index| self.records.get(*index))
                    .collect()
            }
        }
    }

    /// Starts a reload. `params` are merged after the table's own paging,
    /// search, sort and filter keys, so callers can add endpoint-specific
    /// parameters.
    pub fn begin_load(&mut self, params: &[(String, String)]) -> TableRequest {
        self.last_token = self.last_token.next();
        self.pending = Some(self.last_token);
        self.loading = true;
        self.error = None;

        let mut query = Vec::new();
        if self.mode == TableMode::ServerSide {
            query.push(("page".to_owned(), self.page.to_string()));
            query.push(("size".to_owned(), self.page_size.to_string()));
            let search = self.search.trim();
            if !search.is_empty() {
                query.push(("search".to_owned(), search.to_owned()));
            }
            if let Some(sort) = &self.sort {
                query.push(("sort".to_owned(), sort.field.clone()));
                query.push(("direction".to_owned(), sort.direction.as_str().to_owned()));
            }
            for (field, filter) in &self.filters {
                query.extend(filter.query_pairs(field));
            }
        }
        query.extend(params.iter().cloned());

        TableRequest {
            token: self.last_token,
            query,
        }
    }

    /// Completes a reload. On failure prior rows are kept; responses to a
    /// superseded request change nothing.
    pub fn finish_load(
        &mut self,
        token: TableToken,
        result: Result<TablePage, String>,
    ) -> TableEvent {
        if self.pending != Some(token) {
            debug!(token = token.get(), "discarding stale table response");
            return TableEvent::StaleResponse(token);
        }
        self.pending = None;
        self.loading = false;

        match result {
            Ok(page) => {
                match self.mode {
                    TableMode::ClientSide => {
                        self.records = page.records;
                        self.apply_filters();
                    }
                    TableMode::ServerSide => {
                        self.view = (0..page.records.len()).collect();
                        self.records = page.records;
                        self.total = page.total;
                        self.clamp_page();
                    }
                }
                debug!(total = self.total, page = self.page, "table loaded");
                TableEvent::Loaded { total: self.total }
            }
            Err(message) => {
                warn!(error = %message, "table load failed");
                self.error = Some(message.clone());
                TableEvent::LoadFailed(message)
            }
        }
    }

    /// Recomputes the filtered and sorted view. Only meaningful client side.
    pub fn apply_filters(&mut self) -> usize {
        if self.mode == TableMode::ServerSide {
            return self.records.len();
        }

        let needle = self.search.trim().to_lowercase();
        let mut view: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| matches_search(record, &needle))
            .filter(|(_, record)| {
                self.filters
                    .iter()
                    .all(|(field, filter)| filter.matches(record.get(field)))
            })
            .map(|(index, _)| index)
            .collect();

        if let Some(sort) = &self.sort {
            view.sort_by(|left, right| {
                let order = compare_cells(
                    self.records[*left].get(&sort.field),
                    self.records[*right].get(&sort.field),
                );
                match sort.direction {
                    SortDirection::Asc => order,
                    SortDirection::Desc => order.reverse(),
                }
            });
        }

        self.total = view.len();
        self.view = view;
        self.clamp_page();
        self.total
    }

    /// Same field flips direction; a new field starts ascending.
    pub fn sort(&mut self, field: &str) -> TableEvent {
        let direction = match &self.sort {
            Some(current) if current.field == field => current.direction.toggled(),
            _ => SortDirection::Asc,
        };
        let spec = SortSpec {
            field: field.to_owned(),
            direction,
        };
        self.sort = Some(spec.clone());

        match self.mode {
            TableMode::ServerSide => TableEvent::ReloadRequired,
            TableMode::ClientSide => {
                self.apply_filters();
                TableEvent::Sorted(spec)
            }
        }
    }

    pub fn go_to_page(&mut self, page: usize) -> TableEvent {
        if page < 1 || page > self.total_pages() || page == self.page {
            return TableEvent::Unchanged;
        }
        self.page = page;
        match self.mode {
            TableMode::ServerSide => TableEvent::ReloadRequired,
            TableMode::ClientSide => TableEvent::PageChanged(page),
        }
    }

    pub fn dispatch(&mut self, command: TableCommand) -> TableEvent {
        match command {
            TableCommand::Search(term) => {
                self.search = term;
                self.page = 1;
                self.refilter()
            }
            TableCommand::Filter { field, filter } => {
                match filter {
                    Some(filter) if !filter.is_empty() => {
                        self.filters.insert(field, filter);
                    }
                    _ => {
                        self.filters.remove(&field);
                    }
                }
                self.page = 1;
                self.refilter()
            }
            TableCommand::ClearFilters => {
                self.filters.clear();
                self.search.clear();
                self.page = 1;
                self.refilter()
            }
            TableCommand::Sort(field) => self.sort(&field),
            TableCommand::GoToPage(page) => self.go_to_page(page),
            TableCommand::NextPage => self.go_to_page(self.page + 1),
            TableCommand::PrevPage => self.go_to_page(self.page.saturating_sub(1)),
            TableCommand::SetPageSize(size) => {
                if size == 0 || size == self.page_size {
                    return TableEvent::Unchanged;
                }
                self.page_size = size;
                self.page = 1;
                match self.mode {
                    TableMode::ServerSide => TableEvent::ReloadRequired,
                    TableMode::ClientSide => {
                        self.clamp_page();
                        TableEvent::PageChanged(1)
                    }
                }
            }
        }
    }

    /// Up to `width` page numbers centred on the current page.
    pub fn page_window(&self, width: usize) -> Vec<usize> {
        let pages = self.total_pages();
        if pages == 0 || width == 0 {
            return Vec::new();
        }
        let width = width.min(pages);
        let half = width / 2;
        let start = self
            .page
            .saturating_sub(half)
            .max(1)
            .min(pages + 1 - width);
        (start..start + width).collect()
    }

    pub fn range_label(&self) -> String {
        if self.total == 0 {
            return "Showing 0 to 0 of 0 entries".to_owned();
        }
        let first = (self.page - 1) * self.page_size + 1;
        let last = (self.page * self.page_size).min(self.total);
        format!("Showing {first} to {last} of {} entries", self.total)
    }

    fn refilter(&mut self) -> TableEvent {
        match self.mode {
            TableMode::ServerSide => TableEvent::ReloadRequired,
            TableMode::ClientSide => TableEvent::Filtered {
                matched: self.apply_filters(),
            },
        }
    }

    fn clamp_page(&mut self) {
        self.page = self.page.clamp(1, self.total_pages().max(1));
    }
}

fn matches_search(record: &Record, needle: &str) -> bool {
    needle.is_empty()
        || record
            .values()
            .any(|value| cell_text(value).to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{
        DataTable, FieldFilter, TableCommand, TableEvent, TableMode, TablePage, TableResponse,
    };
    use crate::{Record, SortDirection};
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn numbered(count: usize) -> Vec<Record> {
        (1..=count)
            .map(|id| record(json!({ "id": id, "name": format!("car {id}") })))
            .collect()
    }

    fn ids(table: &DataTable) -> Vec<Value> {
        table.rows().iter().map(|row| row["id"].clone()).collect()
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(DataTable::new(TableMode::ClientSide, 0).is_err());
    }

    #[test]
    fn pagination_of_47_rows_by_25() {
        let mut table = DataTable::with_records(numbered(47), 25).expect("valid page size");
        assert_eq!(table.total_pages(), 2);
        assert_eq!(table.rows().len(), 25);

        assert_eq!(table.go_to_page(3), TableEvent::Unchanged);
        assert_eq!(table.page(), 1);
        assert_eq!(table.go_to_page(0), TableEvent::Unchanged);

        assert_eq!(table.go_to_page(2), TableEvent::PageChanged(2));
        assert_eq!(table.rows().len(), 22);
        assert_eq!(table.range_label(), "Showing 26 to 47 of 47 entries");
        assert_eq!(table.dispatch(TableCommand::NextPage), TableEvent::Unchanged);
        assert_eq!(table.dispatch(TableCommand::PrevPage), TableEvent::PageChanged(1));
    }

    #[test]
    fn numeric_sort_is_not_lexicographic() {
        let mut table = DataTable::with_records(
            vec![record(json!({"a": 10})), record(json!({"a": 2}))],
            25,
        )
        .expect("valid page size");
        table.sort("a");
        let values: Vec<Value> = table.rows().iter().map(|row| row["a"].clone()).collect();
        assert_eq!(values, vec![json!(2), json!(10)]);
    }

    #[test]
    fn mixed_numeric_and_text_column_sorts_both_ways() {
        let mut seed: u64 = 1;
        let rows: Vec<Record> = (0..37)
            .map(|id| {
                seed = seed
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let n = (seed >> 33) % 100;
                let price = if (seed >> 20) % 2 == 0 {
                    json!(n)
                } else {
                    json!(format!("{n}a"))
                };
                record(json!({ "id": id, "price": price }))
            })
            .collect();
        let mut table = DataTable::with_records(rows, 50).expect("valid page size");

        table.sort("price");
        let ascending: Vec<Value> = table.rows().iter().map(|row| row["price"].clone()).collect();
        assert_eq!(ascending.len(), 37);
        let first_text = ascending
            .iter()
            .position(Value::is_string)
            .expect("some text prices");
        assert!(ascending[..first_text].iter().all(Value::is_number));
        assert!(ascending[first_text..].iter().all(Value::is_string));
        assert!(
            ascending[..first_text]
                .windows(2)
                .all(|pair| pair[0].as_u64() <= pair[1].as_u64())
        );
        assert!(
            ascending[first_text..]
                .windows(2)
                .all(|pair| pair[0].as_str() <= pair[1].as_str())
        );

        table.sort("price");
        let descending: Vec<Value> = table.rows().iter().map(|row| row["price"].clone()).collect();
        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(descending, reversed);
    }

    #[test]
    fn sort_toggles_on_same_field_and_resets_on_new_field() {
        let mut table = DataTable::with_records(numbered(3), 25).expect("valid page size");

        table.sort("id");
        assert_eq!(table.sort_spec().map(|s| s.direction), Some(SortDirection::Asc));
        table.sort("id");
        assert_eq!(table.sort_spec().map(|s| s.direction), Some(SortDirection::Desc));
        assert_eq!(ids(&table), vec![json!(3), json!(2), json!(1)]);

        table.sort("name");
        let spec = table.sort_spec().expect("sorted");
        assert_eq!(spec.field, "name");
        assert_eq!(spec.direction, SortDirection::Asc);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let mut table = DataTable::with_records(
            vec![
                record(json!({"id": 1, "brand": "Proton", "model": "X50"})),
                record(json!({"id": 2, "brand": "Perodua", "model": "Myvi"})),
                record(json!({"id": 3, "brand": "BMW", "model": "x3"})),
            ],
            25,
        )
        .expect("valid page size");

        let event = table.dispatch(TableCommand::Search("x".to_owned()));
        assert_eq!(event, TableEvent::Filtered { matched: 2 });
        assert_eq!(ids(&table), vec![json!(1), json!(3)]);

        table.dispatch(TableCommand::Search(String::new()));
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn field_filters_intersect_with_search() {
        let mut table = DataTable::with_records(
            vec![
                record(json!({"id": 1, "source": "carlistmy", "price": 45000})),
                record(json!({"id": 2, "source": "mudahmy", "price": "52000"})),
                record(json!({"id": 3, "source": "carlistmy", "price": 90000})),
            ],
            25,
        )
        .expect("valid page size");

        table.dispatch(TableCommand::Filter {
            field: "price".to_owned(),
            filter: Some(FieldFilter::Range {
                min: Some(40_000.0),
                max: Some(60_000.0),
            }),
        });
        assert_eq!(ids(&table), vec![json!(1), json!(2)]);

        table.dispatch(TableCommand::Filter {
            field: "source".to_owned(),
            filter: Some(FieldFilter::Equals("CarlistMY".to_owned())),
        });
        assert_eq!(ids(&table), vec![json!(1)]);

        table.dispatch(TableCommand::Search("mudah".to_owned()));
        assert!(table.rows().is_empty());
        assert_eq!(table.range_label(), "Showing 0 to 0 of 0 entries");

        table.dispatch(TableCommand::ClearFilters);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn empty_filter_is_removed() {
        let mut table = DataTable::with_records(numbered(2), 25).expect("valid page size");
        table.dispatch(TableCommand::Filter {
            field: "name".to_owned(),
            filter: Some(FieldFilter::Contains("  ".to_owned())),
        });
        assert!(table.filter("name").is_none());
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn server_side_query_merges_paging_search_sort_and_filters() {
        let mut table = DataTable::new(TableMode::ServerSide, 10).expect("valid page size");
        assert_eq!(
            table.dispatch(TableCommand::Search("myvi".to_owned())),
            TableEvent::ReloadRequired
        );
        assert_eq!(table.sort("price"), TableEvent::ReloadRequired);
        table.dispatch(TableCommand::Filter {
            field: "year".to_owned(),
            filter: Some(FieldFilter::Range {
                min: Some(2018.0),
                max: None,
            }),
        });

        let request = table.begin_load(&[("source".to_owned(), "mudahmy".to_owned())]);
        let pairs: Vec<(&str, &str)> = request
            .query
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("page", "1"),
                ("size", "10"),
                ("search", "myvi"),
                ("sort", "price"),
                ("direction", "asc"),
                ("year_min", "2018"),
                ("source", "mudahmy"),
            ]
        );
        assert!(table.is_loading());
    }

    #[test]
    fn server_side_load_holds_one_page_and_reported_total() {
        let mut table = DataTable::new(TableMode::ServerSide, 10).expect("valid page size");
        let request = table.begin_load(&[]);
        let event = table.finish_load(
            request.token,
            Ok(TablePage {
                records: numbered(10),
                total: 95,
            }),
        );
        assert_eq!(event, TableEvent::Loaded { total: 95 });
        assert_eq!(table.total_pages(), 10);
        assert_eq!(table.rows().len(), 10);
        assert!(!table.is_loading());

        assert_eq!(table.go_to_page(4), TableEvent::ReloadRequired);
        let request = table.begin_load(&[]);
        assert_eq!(request.query[0], ("page".to_owned(), "4".to_owned()));
    }

    #[test]
    fn failed_load_keeps_previous_rows_and_clears_loading() {
        let mut table = DataTable::new(TableMode::ClientSide, 25).expect("valid page size");
        let first = table.begin_load(&[]);
        table.finish_load(
            first.token,
            Ok(TablePage {
                records: numbered(5),
                total: 5,
            }),
        );

        let second = table.begin_load(&[]);
        let event = table.finish_load(second.token, Err("server error (500)".to_owned()));
        assert_eq!(event, TableEvent::LoadFailed("server error (500)".to_owned()));
        assert_eq!(table.error(), Some("server error (500)"));
        assert!(!table.is_loading());
        assert_eq!(table.total(), 5);
    }

    #[test]
    fn stale_load_response_is_ignored() {
        let mut table = DataTable::new(TableMode::ClientSide, 25).expect("valid page size");
        let older = table.begin_load(&[]);
        let newer = table.begin_load(&[]);

        let event = table.finish_load(
            older.token,
            Ok(TablePage {
                records: numbered(1),
                total: 1,
            }),
        );
        assert_eq!(event, TableEvent::StaleResponse(older.token));
        assert!(table.is_loading());
        assert_eq!(table.total(), 0);

        table.finish_load(
            newer.token,
            Ok(TablePage {
                records: numbered(4),
                total: 4,
            }),
        );
        assert_eq!(table.total(), 4);
        assert!(!table.is_loading());
    }

    #[test]
    fn client_side_load_sends_only_caller_params() {
        let mut table = DataTable::new(TableMode::ClientSide, 25).expect("valid page size");
        table.dispatch(TableCommand::Search("x".to_owned()));
        let request = table.begin_load(&[("brand".to_owned(), "BMW".to_owned())]);
        assert_eq!(request.query, vec![("brand".to_owned(), "BMW".to_owned())]);
    }

    #[test]
    fn page_window_stays_within_bounds() {
        let mut table = DataTable::with_records(numbered(100), 10).expect("valid page size");
        assert_eq!(table.page_window(5), vec![1, 2, 3, 4, 5]);
        table.go_to_page(6);
        assert_eq!(table.page_window(5), vec![4, 5, 6, 7, 8]);
        table.go_to_page(10);
        assert_eq!(table.page_window(5), vec![6, 7, 8, 9, 10]);
        assert_eq!(table.page_window(50).len(), 10);
    }

    #[test]
    fn page_size_change_returns_to_first_page() {
        let mut table = DataTable::with_records(numbered(47), 25).expect("valid page size");
        table.go_to_page(2);
        assert_eq!(
            table.dispatch(TableCommand::SetPageSize(10)),
            TableEvent::PageChanged(1)
        );
        assert_eq!(table.total_pages(), 5);
        assert_eq!(table.dispatch(TableCommand::SetPageSize(0)), TableEvent::Unchanged);
    }

    #[test]
    fn response_shapes_decode_into_pages() {
        let paged: TableResponse =
            serde_json::from_str(r#"{"data":[{"id":1}],"total":40}"#).expect("paged shape");
        assert_eq!(TablePage::from(paged).total, 40);

        let rows: TableResponse =
            serde_json::from_str(r#"[{"id":1},{"id":2}]"#).expect("array shape");
        assert_eq!(TablePage::from(rows).total, 2);
    }
}
