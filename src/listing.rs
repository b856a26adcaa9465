//! Search, sort and incremental pagination over an in-memory record list.
//!
//! Every dataset table is one `ListController` configured with its own
//! searchable fields, sortable fields and page size. The derived view is
//! recomputed from scratch on each state change.

use derive_setters::Setters;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::dataset::{Dataset, Record, Value, distinct_values};

/// Selected category value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Records below `min` on `field` are not eligible for the list at all.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumSample {
    pub field: String,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct ListConfig {
    pub search_fields: Vec<String>,
    pub sort_fields: Vec<(String, FieldType)>,
    pub default_sort: String,
    pub page_size: usize,
    pub identity_field: String,
    #[setters(strip_option)]
    pub category_field: Option<String>,
    #[setters(strip_option)]
    pub minimum_sample: Option<MinimumSample>,
}

impl ListConfig {
    pub fn new(default_sort: &str, page_size: usize) -> Self {
        ListConfig {
            search_fields: Vec::new(),
            sort_fields: Vec::new(),
            default_sort: default_sort.to_string(),
            page_size: page_size.max(1),
            identity_field: String::new(),
            category_field: None,
            minimum_sample: None,
        }
    }

    /// Config for a dataset without a preset: every text column is searchable,
    /// every column sortable by its loaded type.
    pub fn infer(dataset: &Dataset) -> Self {
        let default_sort = dataset
            .columns
            .iter()
            .find(|c| c.field_type == FieldType::Number)
            .or(dataset.columns.first())
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let identity = dataset
            .columns
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_default();

        ListConfig::new(&default_sort, 50)
            .with_search_fields(
                dataset
                    .columns
                    .iter()
                    .filter(|c| c.field_type == FieldType::Text)
                    .map(|c| c.name.clone())
                    .collect(),
            )
            .with_sort_fields(
                dataset
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.field_type))
                    .collect(),
            )
            .with_identity_field(identity)
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.sort_fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, t)| *t)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.field_type(field).is_some()
    }

    /// The sort key actually used for `key`: unknown keys fall back to the default.
    pub fn resolve_sort<'a>(&'a self, key: &'a str) -> (&'a str, FieldType) {
        match self.field_type(key) {
            Some(field_type) => (key, field_type),
            None => (
                self.default_sort.as_str(),
                self.field_type(&self.default_sort).unwrap_or(FieldType::Text),
            ),
        }
    }
}

/// Mutable search/sort/pagination state of one rendered list.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub query: String,
    pub sort_key: String,
    pub sort_direction: SortDirection,
    pub visible_count: usize,
    pub category: String,
}

impl ViewState {
    pub fn initial(config: &ListConfig) -> Self {
        ViewState {
            query: String::new(),
            sort_key: config.default_sort.clone(),
            sort_direction: SortDirection::Descending,
            visible_count: config.page_size,
            category: String::new(),
        }
    }

    fn category_filter(&self) -> Option<&str> {
        let category = self.category.as_str();
        if category.is_empty() || category == ALL_CATEGORIES {
            None
        } else {
            Some(category)
        }
    }
}

/// The materialized rows plus the total number of matches.
#[derive(Debug, PartialEq)]
pub struct ListView<'a> {
    pub rows: Vec<&'a Record>,
    pub total: usize,
}

impl ListView<'_> {
    pub fn has_more(&self) -> bool {
        self.rows.len() < self.total
    }

    pub fn caption(&self) -> String {
        format!("Showing {} of {}", self.rows.len(), self.total)
    }
}

fn is_eligible(record: &Record, config: &ListConfig) -> bool {
    match &config.minimum_sample {
        Some(sample) => record
            .get(&sample.field)
            .as_number()
            .is_some_and(|v| v >= sample.min),
        None => true,
    }
}

fn matches_category(record: &Record, config: &ListConfig, category: Option<&str>) -> bool {
    match (&config.category_field, category) {
        (Some(field), Some(selected)) => {
            record.get(field).as_text().is_some_and(|v| v == selected)
        }
        _ => true,
    }
}

/// `query` must already be lowercased.
fn matches_query(record: &Record, search_fields: &[String], query: &str) -> bool {
    query.is_empty()
        || search_fields.iter().any(|field| {
            record
                .get(field)
                .as_text()
                .is_some_and(|text| text.to_lowercase().contains(query))
        })
}

/// Case-insensitive compare; missing values sort lowest.
fn compare_text(a: &Value, b: &Value) -> Ordering {
    match (a.as_text(), b.as_text()) {
        (Some(a), Some(b)) => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Missing and non-numeric values sort lowest.
fn compare_number(a: &Value, b: &Value) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn matching<'a>(
    records: &'a [Record],
    state: &ViewState,
    config: &ListConfig,
) -> impl Iterator<Item = &'a Record> {
    let query = state.query.to_lowercase();
    let category = state.category_filter().map(str::to_string);
    records.iter().filter(move |record| {
        is_eligible(record, config)
            && matches_category(record, config, category.as_deref())
            && matches_query(record, &config.search_fields, &query)
    })
}

/// Filter, sort and truncate `records` for the given state.
///
/// Pure: the same inputs always give the same rows in the same order.
/// Equal sort values keep their input order in both directions.
pub fn compute_view<'a>(
    records: &'a [Record],
    state: &ViewState,
    config: &ListConfig,
) -> ListView<'a> {
    let mut rows: Vec<&Record> = matching(records, state, config).collect();
    let total = rows.len();

    let (key, field_type) = config.resolve_sort(&state.sort_key);
    let compare = match field_type {
        FieldType::Text => compare_text,
        FieldType::Number => compare_number,
    };
    let direction = state.sort_direction;
    rows.sort_by(|a, b| {
        let ord = compare(a.get(key), b.get(key));
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    rows.truncate(state.visible_count);

    trace!(
        "View: query \"{}\", sort {} {:?}, {} of {}",
        state.query,
        key,
        direction,
        rows.len(),
        total
    );
    ListView { rows, total }
}

/// Owns one dataset's records, its configuration and its view state.
pub struct ListController {
    records: Arc<Vec<Record>>,
    config: ListConfig,
    state: ViewState,
}

impl ListController {
    pub fn new(records: Arc<Vec<Record>>, config: ListConfig) -> Self {
        if !config.is_sortable(&config.default_sort) {
            warn!(
                "Default sort key \"{}\" is not declared sortable",
                config.default_sort
            );
        }
        let state = ViewState::initial(&config);
        ListController {
            records,
            config,
            state,
        }
    }

    pub fn view(&self) -> ListView<'_> {
        compute_view(&self.records, &self.state, &self.config)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Number of records matching the current filters, without sorting.
    pub fn match_count(&self) -> usize {
        matching(&self.records, &self.state, &self.config).count()
    }

    /// A new search starts from the first page again.
    pub fn on_query_change(&mut self, query: impl Into<String>) {
        self.state.query = query.into();
        self.state.visible_count = self.config.page_size;
        debug!("Query changed to \"{}\"", self.state.query);
    }

    /// Same field flips the direction, a new field starts descending.
    /// The number of loaded rows is kept.
    pub fn on_sort_toggle(&mut self, field: &str) {
        if field == self.state.sort_key {
            self.state.sort_direction = self.state.sort_direction.flipped();
        } else {
            if !self.config.is_sortable(field) {
                warn!("Sorting by undeclared field \"{field}\", falling back to default");
            }
            self.state.sort_key = field.to_string();
            self.state.sort_direction = SortDirection::Descending;
        }
        debug!(
            "Sort by {} {:?}",
            self.state.sort_key, self.state.sort_direction
        );
    }

    /// Sets key and direction directly, for an initial sort order.
    /// The number of loaded rows is kept.
    pub fn set_sort(&mut self, field: &str, direction: SortDirection) {
        if !self.config.is_sortable(field) {
            warn!("Sorting by undeclared field \"{field}\", falling back to default");
        }
        self.state.sort_key = field.to_string();
        self.state.sort_direction = direction;
        debug!("Sort set to {field} {direction:?}");
    }

    /// Loads one more page. Returns false when every match is already shown.
    pub fn on_show_more(&mut self) -> bool {
        let total = self.match_count();
        if self.state.visible_count >= total {
            return false;
        }
        self.state.visible_count += self.config.page_size;
        debug!("Showing up to {} of {}", self.state.visible_count, total);
        true
    }

    pub fn on_category_filter_change(&mut self, value: impl Into<String>) {
        self.state.category = value.into();
        self.state.visible_count = self.config.page_size;
        debug!("Category changed to \"{}\"", self.state.category);
    }

    /// "All" followed by the category values of eligible records, most frequent first.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        if let Some(field) = &self.config.category_field {
            let eligible = self
                .records
                .iter()
                .filter(|record| is_eligible(record, &self.config));
            categories.extend(distinct_values(eligible, field).into_iter().map(|(v, _)| v));
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(brand: &str, cost: Option<f64>) -> Record {
        Record::new().with("brandName", brand).with("cost", cost)
    }

    fn drug_config(page_size: usize) -> ListConfig {
        ListConfig::new("cost", page_size)
            .with_search_fields(vec!["brandName".to_string(), "genericName".to_string()])
            .with_sort_fields(vec![
                ("brandName".to_string(), FieldType::Text),
                ("cost".to_string(), FieldType::Number),
            ])
            .with_identity_field("brandName".to_string())
    }

    fn brands(view: &ListView) -> Vec<String> {
        view.rows
            .iter()
            .map(|r| r.get("brandName").display())
            .collect()
    }

    fn numbered(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| drug(&format!("drug-{i}"), Some(i as f64)))
            .collect()
    }

    #[test]
    fn equal_costs_keep_input_order_descending() {
        let records = vec![
            drug("A", Some(100.0)),
            drug("B", Some(500.0)),
            drug("C", Some(50.0)),
            drug("D", Some(500.0)),
            drug("E", Some(10.0)),
        ];
        let config = drug_config(50);
        let state = ViewState::initial(&config);

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["B", "D", "A", "C", "E"]);
        assert_eq!(view.total, 5);
    }

    #[test]
    fn equal_values_keep_input_order_ascending() {
        let records = vec![
            drug("first", Some(5.0)),
            drug("low", Some(1.0)),
            drug("second", Some(5.0)),
        ];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);
        state.sort_direction = SortDirection::Ascending;

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["low", "first", "second"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let records = vec![
            drug("Eliquis", Some(1.0)),
            drug("Xarelto", Some(2.0)),
            drug("eliquis-generic", Some(3.0)),
        ];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);
        state.query = "eliquis".to_string();

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["eliquis-generic", "Eliquis"]);
        assert_eq!(view.total, 2);

        state.query = "ELIQ".to_string();
        assert_eq!(compute_view(&records, &state, &config).total, 2);
    }

    #[test]
    fn search_matches_any_declared_field_only() {
        let records = vec![
            Record::new()
                .with("brandName", "Zzz")
                .with("genericName", "apixaban")
                .with("city", "Apex"),
            Record::new().with("brandName", "Yyy").with("city", "apixaban town"),
        ];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);
        state.query = "apix".to_string();

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["Zzz"]);
    }

    #[test]
    fn empty_query_matches_everything() {
        let records = numbered(7);
        let config = drug_config(50);
        let state = ViewState::initial(&config);
        assert_eq!(compute_view(&records, &state, &config).total, 7);
    }

    #[test]
    fn compute_view_is_pure() {
        let records = vec![
            drug("b", Some(2.0)),
            drug("a", Some(2.0)),
            drug("c", None),
            drug("d", Some(9.0)),
        ];
        let snapshot = records.clone();
        let config = drug_config(3);
        let state = ViewState::initial(&config);

        let first = compute_view(&records, &state, &config);
        let second = compute_view(&records, &state, &config);
        assert_eq!(first, second);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn missing_numbers_sort_lowest() {
        let records = vec![
            drug("none", None),
            drug("text", None).with("cost", "n/a"),
            drug("ten", Some(10.0)),
            drug("negative", Some(-1.0)),
        ];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["ten", "negative", "none", "text"]);

        state.sort_direction = SortDirection::Ascending;
        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["none", "text", "negative", "ten"]);
    }

    #[test]
    fn numeric_text_sorts_as_number() {
        let records = vec![
            drug("nine", None).with("cost", "9"),
            drug("eleven", None).with("cost", "11"),
        ];
        let config = drug_config(50);
        let state = ViewState::initial(&config);
        assert_eq!(
            brands(&compute_view(&records, &state, &config)),
            vec!["eleven", "nine"]
        );
    }

    #[test]
    fn text_sort_ignores_case() {
        let records = vec![
            drug("banana", Some(1.0)),
            drug("Apple", Some(1.0)),
            drug("cherry", Some(1.0)),
            drug("apple", Some(1.0)),
        ];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);
        state.sort_key = "brandName".to_string();
        state.sort_direction = SortDirection::Ascending;

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["Apple", "apple", "banana", "cherry"]);

        state.sort_direction = SortDirection::Descending;
        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["cherry", "banana", "Apple", "apple"]);
    }

    #[test]
    fn unknown_sort_key_falls_back_to_default() {
        let records = vec![drug("cheap", Some(1.0)), drug("pricey", Some(99.0))];
        let config = drug_config(50);
        let mut state = ViewState::initial(&config);
        state.sort_key = "doesNotExist".to_string();

        let view = compute_view(&records, &state, &config);
        assert_eq!(brands(&view), vec!["pricey", "cheap"]);
    }

    #[test]
    fn empty_records_give_empty_view() {
        let config = drug_config(50);
        let state = ViewState::initial(&config);
        let view = compute_view(&[], &state, &config);
        assert!(view.rows.is_empty());
        assert_eq!(view.total, 0);
        assert!(!view.has_more());
    }

    #[test]
    fn view_truncates_to_visible_count() {
        let records = numbered(60);
        let config = drug_config(25);
        let state = ViewState::initial(&config);

        let view = compute_view(&records, &state, &config);
        assert_eq!(view.rows.len(), 25);
        assert_eq!(view.total, 60);
        assert!(view.has_more());
        assert_eq!(view.caption(), "Showing 25 of 60");
    }

    #[test]
    fn show_more_then_search_resets_depth() {
        let mut list = ListController::new(Arc::new(numbered(200)), drug_config(50));
        assert_eq!(list.state().visible_count, 50);

        assert!(list.on_show_more());
        assert!(list.on_show_more());
        assert_eq!(list.state().visible_count, 150);

        list.on_query_change("x");
        assert_eq!(list.state().visible_count, 50);
    }

    #[test]
    fn sort_toggle_keeps_depth() {
        let mut list = ListController::new(Arc::new(numbered(120)), drug_config(25));
        list.on_show_more();
        list.on_show_more();
        assert_eq!(list.state().visible_count, 75);

        list.on_sort_toggle("brandName");
        assert_eq!(list.state().visible_count, 75);
        list.on_sort_toggle("brandName");
        assert_eq!(list.state().visible_count, 75);
        assert_eq!(list.view().rows.len(), 75);
    }

    #[test]
    fn sort_toggle_flips_same_field_and_resets_new_field() {
        let mut list = ListController::new(Arc::new(numbered(3)), drug_config(25));
        assert_eq!(list.state().sort_key, "cost");
        assert_eq!(list.state().sort_direction, SortDirection::Descending);

        list.on_sort_toggle("cost");
        assert_eq!(list.state().sort_direction, SortDirection::Ascending);

        list.on_sort_toggle("brandName");
        assert_eq!(list.state().sort_key, "brandName");
        assert_eq!(list.state().sort_direction, SortDirection::Descending);

        list.on_sort_toggle("brandName");
        assert_eq!(list.state().sort_direction, SortDirection::Ascending);
    }

    #[test]
    fn set_sort_on_active_key_keeps_requested_direction() {
        let mut list = ListController::new(Arc::new(numbered(60)), drug_config(25));
        list.on_show_more();

        list.set_sort("cost", SortDirection::Descending);
        assert_eq!(list.state().sort_direction, SortDirection::Descending);
        assert_eq!(brands(&list.view())[0], "drug-59");

        list.set_sort("cost", SortDirection::Ascending);
        assert_eq!(list.state().sort_direction, SortDirection::Ascending);
        assert_eq!(brands(&list.view())[0], "drug-0");

        list.set_sort("brandName", SortDirection::Ascending);
        assert_eq!(list.state().sort_key, "brandName");
        assert_eq!(list.state().sort_direction, SortDirection::Ascending);
        assert_eq!(list.state().visible_count, 50);
    }

    #[test]
    fn show_more_is_monotonic_and_bounded() {
        let mut list = ListController::new(Arc::new(numbered(60)), drug_config(25));
        let mut previous = list.state().visible_count;
        for _ in 0..10 {
            list.on_show_more();
            let current = list.state().visible_count;
            assert!(current >= previous);
            assert!(current < 60 + 25);
            previous = current;
        }
        assert_eq!(list.state().visible_count, 75);
        assert!(!list.on_show_more());
        assert_eq!(list.view().rows.len(), 60);
        assert!(!list.view().has_more());
    }

    #[test]
    fn show_more_respects_filtered_length() {
        let mut list = ListController::new(Arc::new(numbered(200)), drug_config(50));
        list.on_query_change("drug-1");
        // drug-1, drug-10..19, drug-100..199
        assert_eq!(list.match_count(), 111);
        assert!(list.on_show_more());
        assert!(list.on_show_more());
        assert!(!list.on_show_more());
        assert_eq!(list.state().visible_count, 150);
    }

    fn provider(npi: &str, level: &str, score: f64) -> Record {
        Record::new()
            .with("npi", npi)
            .with("riskLevel", level)
            .with("riskScore", score)
    }

    fn provider_config() -> ListConfig {
        ListConfig::new("riskScore", 50)
            .with_search_fields(vec!["npi".to_string()])
            .with_sort_fields(vec![("riskScore".to_string(), FieldType::Number)])
            .with_category_field("riskLevel".to_string())
            .with_identity_field("npi".to_string())
    }

    #[test]
    fn unmatched_category_gives_empty_view() {
        let records = vec![
            provider("1", "low", 3.0),
            provider("2", "elevated", 40.0),
        ];
        let mut list = ListController::new(Arc::new(records), provider_config());
        list.on_category_filter_change("high");

        let view = list.view();
        assert!(view.rows.is_empty());
        assert_eq!(view.total, 0);
        assert!(!view.has_more());
        assert!(!list.on_show_more());
    }

    #[test]
    fn category_filter_applies_before_search() {
        let records = vec![
            provider("111", "low", 3.0),
            provider("112", "elevated", 40.0),
            provider("211", "elevated", 50.0),
        ];
        let mut list = ListController::new(Arc::new(records), provider_config());
        list.on_category_filter_change("elevated");
        list.on_query_change("11");

        let view = list.view();
        assert_eq!(view.total, 2);
        assert_eq!(view.rows[0].get("npi").display(), "211");

        list.on_category_filter_change(ALL_CATEGORIES);
        assert_eq!(list.view().total, 3);
        list.on_category_filter_change("");
        assert_eq!(list.view().total, 3);
    }

    #[test]
    fn category_change_resets_depth() {
        let records: Vec<Record> = (0..120)
            .map(|i| provider(&i.to_string(), "low", i as f64))
            .collect();
        let mut list = ListController::new(Arc::new(records), provider_config());
        list.on_show_more();
        assert_eq!(list.state().visible_count, 100);
        list.on_category_filter_change("low");
        assert_eq!(list.state().visible_count, 50);
    }

    #[test]
    fn categories_list_all_first() {
        let records = vec![
            provider("1", "low", 3.0),
            provider("2", "elevated", 40.0),
            provider("3", "low", 1.0),
        ];
        let list = ListController::new(Arc::new(records), provider_config());
        assert_eq!(list.categories(), vec!["All", "low", "elevated"]);

        let plain = ListController::new(Arc::new(numbered(3)), drug_config(25));
        assert_eq!(plain.categories(), vec!["All"]);
    }

    #[test]
    fn minimum_sample_excludes_small_records() {
        let records = vec![
            Record::new().with("specialty", "Cardiology").with("providers", 250.0),
            Record::new().with("specialty", "Rare").with("providers", 12.0),
            Record::new().with("specialty", "Unknown"),
        ];
        let config = ListConfig::new("providers", 25)
            .with_search_fields(vec!["specialty".to_string()])
            .with_sort_fields(vec![("providers".to_string(), FieldType::Number)])
            .with_minimum_sample(MinimumSample {
                field: "providers".to_string(),
                min: 100.0,
            });
        let state = ViewState::initial(&config);

        let view = compute_view(&records, &state, &config);
        assert_eq!(view.total, 1);
        assert_eq!(view.rows[0].get("specialty").display(), "Cardiology");
    }
}
