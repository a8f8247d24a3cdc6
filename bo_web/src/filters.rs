//! ABOUTME: Query string access plus search and filter-set capabilities of list views
//! ABOUTME: Narrows a queryset from request parameters without trusting their shape

use bo_core::Result;
use bo_db::{Model, QuerySet};
use chrono::NaiveDate;
use tracing::warn;

/// Decoded query string preserving parameter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// First value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First non-blank value of `name`, trimmed
    pub fn get_trimmed(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Query string without `name`, used to keep filters across page links
    pub fn without(&self, name: &str) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs.iter().filter(|(k, _)| k != name) {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Case-insensitive search over a fixed set of fields
pub trait SearchFilterable {
    fn search_fields(&self) -> &[&'static str];

    /// Apply the `search` parameter when present
    fn apply_search<M: Model>(&self, params: &QueryParams, queryset: QuerySet<M>) -> Result<QuerySet<M>> {
        match params.get_trimmed("search") {
            Some(term) => queryset.search(self.search_fields(), term),
            None => Ok(queryset),
        }
    }
}

/// Input rendered in the filter form of a list page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInput {
    pub name: String,
    pub label: String,
    pub input_type: &'static str,
    pub value: String,
    /// Rejected input message, empty when valid
    pub error: String,
}

/// Declarative filters narrowing a queryset from the query string
pub trait FilterSet<M: Model>: Send + Sync {
    fn apply(&self, params: &QueryParams, queryset: QuerySet<M>) -> Result<QuerySet<M>>;

    fn inputs(&self, params: &QueryParams) -> Vec<FilterInput>;
}

/// Inclusive date range over one field, read from `<field>_after` and `<field>_before`
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    field: &'static str,
    label: String,
}

impl DateRangeFilter {
    pub fn new(field: &'static str, label: impl Into<String>) -> Self {
        Self {
            field,
            label: label.into(),
        }
    }

    fn after_param(&self) -> String {
        format!("{}_after", self.field)
    }

    fn before_param(&self) -> String {
        format!("{}_before", self.field)
    }

    /// Parsed bound; invalid dates are ignored
    fn bound(&self, params: &QueryParams, name: &str) -> std::result::Result<Option<NaiveDate>, String> {
        match params.get_trimmed(name) {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| "Enter a valid date.".to_string()),
        }
    }
}

impl<M: Model> FilterSet<M> for DateRangeFilter {
    fn apply(&self, params: &QueryParams, mut queryset: QuerySet<M>) -> Result<QuerySet<M>> {
        let after = self.after_param();
        let before = self.before_param();
        match self.bound(params, &after) {
            Ok(Some(date)) => queryset = queryset.filter_date_from(self.field, &date.to_string())?,
            Ok(None) => {}
            Err(_) => warn!(param = %after, "Ignoring invalid date filter"),
        }
        match self.bound(params, &before) {
            Ok(Some(date)) => queryset = queryset.filter_date_to(self.field, &date.to_string())?,
            Ok(None) => {}
            Err(_) => warn!(param = %before, "Ignoring invalid date filter"),
        }
        Ok(queryset)
    }

    fn inputs(&self, params: &QueryParams) -> Vec<FilterInput> {
        [(self.after_param(), "from"), (self.before_param(), "to")]
            .into_iter()
            .map(|(name, suffix)| FilterInput {
                label: format!("{} ({})", self.label, suffix),
                input_type: "date",
                value: params.get(&name).unwrap_or_default().to_string(),
                error: self.bound(params, &name).err().unwrap_or_default(),
                name,
            })
            .collect()
    }
}

/// Several filters applied in order
pub struct FilterChain<M: Model> {
    filters: Vec<Box<dyn FilterSet<M>>>,
}

impl<M: Model> FilterChain<M> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn with(mut self, filter: impl FilterSet<M> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl<M: Model> Default for FilterChain<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> FilterSet<M> for FilterChain<M> {
    fn apply(&self, params: &QueryParams, queryset: QuerySet<M>) -> Result<QuerySet<M>> {
        self.filters
            .iter()
            .try_fold(queryset, |qs, filter| filter.apply(params, qs))
    }

    fn inputs(&self, params: &QueryParams) -> Vec<FilterInput> {
        self.filters.iter().flat_map(|f| f.inputs(params)).collect()
    }
}

/// Date bounds for people aged between `min_age` and `max_age` on `today`
///
/// Returns `(born_after, born_before)` suitable for an inclusive birth date range.
pub fn age_range(today: NaiveDate, min_age: Option<u32>, max_age: Option<u32>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let years_ago = |years: u32| {
        today
            .checked_sub_months(chrono::Months::new(years * 12))
            .unwrap_or(NaiveDate::MIN)
    };
    let born_before = min_age.map(years_ago);
    let born_after = max_age
        .map(|age| years_ago(age + 1))
        .and_then(|date| date.succ_opt());
    (born_after, born_before)
}
