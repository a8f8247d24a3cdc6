//! ABOUTME: Value formatting pipeline used by list and detail templates
//! ABOUTME: Turns record attributes into escaped markup (icons, tags, links, lists)

use crate::{export::Field, urls::UrlResolver};
use askama_escape::{escape, Html};
use bo_config::{BackofficeSettings, DetailLinkRule};
use bo_db::{Model, Record, Value};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use std::{fmt, str::FromStr};
use tracing::debug;

/// HTML that is emitted without further escaping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    /// Wrap already safe HTML
    pub fn raw(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    /// Escape plain text
    pub fn text(text: &str) -> Self {
        Self(escape(text, Html).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Icon for a boolean using the configured colour classes
pub fn boolean_icon(value: bool, settings: &BackofficeSettings) -> Markup {
    let (class, path) = if value {
        (&settings.boolean_true_class, "M5 13l4 4L19 7")
    } else {
        (&settings.boolean_false_class, "M6 18L18 6M6 6l12 12")
    };
    Markup::raw(format!(
        r#"<span class="{}"><svg class="h-5 w-5" fill="none" viewBox="0 0 24 24" stroke="currentColor" stroke-width="2"><path stroke-linecap="round" stroke-linejoin="round" d="{}" /></svg></span>"#,
        escape(class, Html),
        path
    ))
}

/// Tag for a status field: class from the status value, text from its choice label
pub fn status_tag(record: &dyn Record, field: &str, settings: &BackofficeSettings) -> Markup {
    let status = record
        .attr(field)
        .map(|v| v.resolve().to_string())
        .unwrap_or_default();
    let label = record
        .choice_display(field)
        .unwrap_or_else(|| status.clone());
    Markup::raw(format!(
        r#"<span class="text-sm text-center rounded px-2 py-1 {}">{}</span>"#,
        escape(settings.status_class(&status), Html),
        escape(&label, Html)
    ))
}

/// Strip trailing zeros; integral values lose the fractional part
pub fn normalize_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Renders record attributes for templates
pub struct AttributeRenderer<'a> {
    settings: &'a BackofficeSettings,
    urls: &'a UrlResolver,
}

impl<'a> AttributeRenderer<'a> {
    pub fn new(settings: &'a BackofficeSettings, urls: &'a UrlResolver) -> Self {
        Self { settings, urls }
    }

    fn placeholder(&self) -> Markup {
        Markup::text(&self.settings.none_value)
    }

    /// Display an attribute of `record`; a pair's label is ignored here
    pub fn getattr(&self, record: &dyn Record, field: &Field) -> Markup {
        let name = field.name.as_str();
        let Some(value) = record.attr(name) else {
            debug!(
                model = record.model_name(),
                field = name,
                "Attribute does not exist, rendering placeholder"
            );
            return self.placeholder();
        };

        if self.settings.is_status_field(name) {
            return status_tag(record, name, self.settings);
        }

        let value = value.resolve();
        if let Some(rule) = self.settings.details_urls.iter().find(|r| r.matches(name)) {
            if let Some(link) = self.detail_link(record, rule, &value) {
                return link;
            }
        }

        self.parse_value(value)
    }

    fn detail_link(&self, record: &dyn Record, rule: &DetailLinkRule, value: &Value) -> Option<Markup> {
        let lookup_field = rule.lookup_field();
        let (model, key, text) = match value {
            Value::Object(related) => {
                let model = if rule.follow {
                    related.model.as_str()
                } else {
                    record.model_name()
                };
                (model, related.lookup(lookup_field)?, related.display.clone())
            }
            Value::Null => return None,
            // Only related records can be followed
            _ if rule.follow => return None,
            other => (record.model_name(), other.to_string(), other.to_string()),
        };

        let route = self.settings.route_name(&format!("{}-detail", model));
        match self.urls.reverse(&route, &[(lookup_field, key.as_str())]) {
            Ok(url) => Some(Markup::raw(format!(
                r#"<a href="{}">{}</a>"#,
                escape(&url, Html),
                escape(&text, Html)
            ))),
            Err(e) => {
                debug!("Rendering without link: {}", e);
                None
            }
        }
    }

    /// Format a resolved value by its type
    pub fn parse_value(&self, value: Value) -> Markup {
        match value {
            Value::Null => self.placeholder(),
            Value::Bool(b) => boolean_icon(b, self.settings),
            Value::Image(Some(file)) => Markup::raw(format!(
                r#"<img class="max-w-xs rounded" src="{}" />"#,
                escape(&file.url(&self.settings.media_url), Html)
            )),
            Value::Image(None) => Markup::text(self.settings.no_image_value()),
            Value::Relation(items) if items.is_empty() => self.placeholder(),
            Value::Relation(items) => {
                let mut html = String::from("<ul class='list-disc'>");
                for item in &items {
                    html.push_str(&format!("<li>{}</li>", escape(&item.display, Html)));
                }
                html.push_str("</ul>");
                Markup::raw(html)
            }
            Value::Point(point) => Markup::text(&format!("{},{}", point.y, point.x)),
            Value::File(Some(file)) if file.name.contains("csv") => Markup::raw(format!(
                r#"<a href="{}" type="text/csv" download>{}</a>"#,
                escape(&file.url(&self.settings.media_url), Html),
                escape(&file.name, Html)
            )),
            Value::File(Some(file)) => Markup::text(&file.name),
            Value::File(None) => self.placeholder(),
            Value::Decimal(d) => Markup::text(&normalize_decimal(d)),
            Value::Callable(thunk) => self.parse_value(thunk.call()),
            other => Markup::text(&other.to_string()),
        }
    }
}

/// Column label: the pair's label, else the model's verbose name, else the field name
pub fn verbose_name<M: Model>(field: &Field) -> String {
    if let Some(label) = &field.label {
        return label.clone();
    }
    M::verbose_name(&field.name)
        .map(str::to_string)
        .unwrap_or_else(|| field.name.clone())
}

/// Number shown on a statistics card
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatNumber {
    Int(i64),
    Float(f64),
}

/// Display hint for a dashboard figure
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsValue {
    pub value: StatNumber,
    pub percentage: bool,
    pub help_text: Option<String>,
}

impl StatisticsValue {
    pub fn int(value: i64) -> Self {
        Self {
            value: StatNumber::Int(value),
            percentage: false,
            help_text: None,
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            value: StatNumber::Float(value),
            percentage: false,
            help_text: None,
        }
    }

    pub fn percentage(mut self) -> Self {
        self.percentage = true;
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }
}

/// Group digits by thousands: 1234567 -> "1,234,567"
pub fn intcomma(value: i64) -> String {
    group_digits(&value.to_string())
}

fn group_digits(number: &str) -> String {
    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}", sign, grouped)
}

/// Round a float for display
///
/// `arg` follows the usual template semantics: `N` always shows N places,
/// `-N` shows N places only when the value isn't integral (default `-1`),
/// a `g` suffix groups thousands.
pub fn floatformat(value: f64, arg: Option<&str>) -> String {
    let arg = arg.unwrap_or("-1");
    let (arg, grouping) = match arg.strip_suffix('g') {
        Some(rest) => (rest, true),
        None => (arg, false),
    };
    let places: i32 = if arg.is_empty() {
        -1
    } else {
        match arg.parse() {
            Ok(places) => places,
            Err(_) => return value.to_string(),
        }
    };

    // Magnitudes below the decimal scale are rounded into it
    let Ok(decimal) = Decimal::from_str(&value.to_string())
        .or_else(|_| Decimal::from_str(&format!("{:.28}", value)))
    else {
        return value.to_string();
    };

    let digits = if places < 0 && value.fract() == 0.0 {
        0
    } else {
        places.unsigned_abs()
    };
    let mut rounded = decimal.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(digits);

    let mut formatted = rounded.to_string();
    if rounded.is_zero() {
        formatted = formatted.trim_start_matches('-').to_string();
    }
    if grouping {
        let (int_part, frac_part) = match formatted.split_once('.') {
            Some((i, f)) => (i.to_string(), Some(f.to_string())),
            None => (formatted.clone(), None),
        };
        formatted = match frac_part {
            Some(frac) => format!("{}.{}", group_digits(&int_part), frac),
            None => group_digits(&int_part),
        };
    }
    formatted
}

/// Text for a statistics card
pub fn statistics_value(value: &StatisticsValue, float_format: Option<&str>) -> String {
    let mut result = match value.value {
        StatNumber::Int(i) => intcomma(i),
        StatNumber::Float(f) => floatformat(f, float_format),
    };
    if value.percentage {
        result.push_str(" %");
    }
    result
}

/// Ratio of two counts as a percentage, zero when the total is zero
pub fn percentage_of(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (Decimal::from(part) * Decimal::from(100) / Decimal::from(total))
        .to_f64()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_db::{FileRef, GeoPoint, RelatedObject, Thunk};
    use std::collections::HashMap;
    use std::fmt;

    struct Stuff {
        id: i64,
        attrs: HashMap<&'static str, Value>,
    }

    impl fmt::Display for Stuff {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Stuff #{}", self.id)
        }
    }

    impl Record for Stuff {
        fn model_name(&self) -> &'static str {
            "stuff"
        }

        fn pk(&self) -> i64 {
            self.id
        }

        fn attr(&self, name: &str) -> Option<Value> {
            match name {
                "pk" | "id" => Some(Value::Int(self.id)),
                _ => self.attrs.get(name).cloned(),
            }
        }

        fn choice_display(&self, name: &str) -> Option<String> {
            (name == "status").then(|| "In progress".to_string())
        }
    }

    fn stuff(attrs: Vec<(&'static str, Value)>) -> Stuff {
        Stuff {
            id: 7,
            attrs: attrs.into_iter().collect(),
        }
    }

    fn urls() -> UrlResolver {
        let mut urls = UrlResolver::new();
        urls.register("backoffice:stuff-detail", "/backoffice/stuffs/{pk}/")
            .unwrap();
        urls.register("backoffice:user-detail", "/backoffice/users/{pk}/")
            .unwrap();
        urls
    }

    fn render(settings: &BackofficeSettings, record: &Stuff, field: &str) -> String {
        let urls = urls();
        AttributeRenderer::new(settings, &urls)
            .getattr(record, &Field::from(field))
            .into_string()
    }

    #[test]
    fn test_boolean_uses_configured_classes() {
        let mut settings = BackofficeSettings::default();
        settings.boolean_true_class = "yes-class".to_string();
        settings.boolean_false_class = "no-class".to_string();
        let record = stuff(vec![("done", Value::Bool(true)), ("lost", Value::Bool(false))]);

        let done = render(&settings, &record, "done");
        assert!(done.starts_with(r#"<span class="yes-class">"#));
        assert!(done.contains("M5 13l4 4L19 7"));

        let lost = render(&settings, &record, "lost");
        assert!(lost.starts_with(r#"<span class="no-class">"#));
        assert!(lost.contains("M6 18L18 6M6 6l12 12"));
    }

    #[test]
    fn test_null_and_missing_attributes_use_placeholder() {
        let mut settings = BackofficeSettings::default();
        settings.none_value = "n/a".to_string();
        let record = stuff(vec![("note", Value::Null)]);

        assert_eq!(render(&settings, &record, "note"), "n/a");
        assert_eq!(render(&settings, &record, "does_not_exist"), "n/a");
    }

    #[test]
    fn test_relation_rendering() {
        let settings = BackofficeSettings::default();
        let record = stuff(vec![
            ("tags", Value::Relation(vec![])),
            (
                "groups",
                Value::Relation(vec![
                    RelatedObject::new("group", 1, "a<b"),
                    RelatedObject::new("group", 2, "staff"),
                ]),
            ),
        ]);

        assert_eq!(render(&settings, &record, "tags"), "-");
        assert_eq!(
            render(&settings, &record, "groups"),
            "<ul class='list-disc'><li>a&lt;b</li><li>staff</li></ul>"
        );
    }

    #[test]
    fn test_status_field_always_uses_status_tag() {
        let mut settings = BackofficeSettings::default();
        settings
            .status_tag_classes
            .insert("in_progress".to_string(), "bg-yellow-200".to_string());
        let record = stuff(vec![("status", Value::text("in_progress"))]);

        assert_eq!(
            render(&settings, &record, "status"),
            r#"<span class="text-sm text-center rounded px-2 py-1 bg-yellow-200">In progress</span>"#
        );

        // Status wins over a detail link rule naming the same field
        settings.details_urls[1].names.push("status".to_string());
        assert!(render(&settings, &record, "status").starts_with("<span"));

        let unknown = stuff(vec![("status", Value::text("idle"))]);
        assert!(render(&settings, &unknown, "status").contains("bg-gray-200"));
    }

    #[test]
    fn test_detail_links() {
        let settings = BackofficeSettings::default();
        let record = stuff(vec![(
            "owner",
            Value::Object(RelatedObject::new("user", 3, "ada")),
        )]);

        assert_eq!(
            render(&settings, &record, "owner"),
            r#"<a href="/backoffice/users/3/">ada</a>"#
        );
        assert_eq!(
            render(&settings, &record, "id"),
            r#"<a href="/backoffice/stuffs/7/">7</a>"#
        );
    }

    #[test]
    fn test_detail_link_falls_back_without_route() {
        let settings = BackofficeSettings::default();
        let record = stuff(vec![(
            "owner",
            Value::Object(RelatedObject::new("team", 3, "core")),
        )]);
        assert_eq!(render(&settings, &record, "owner"), "core");

        let mut settings = BackofficeSettings::default();
        settings.details_urls[0].lookup_field = Some("slug".to_string());
        assert_eq!(render(&settings, &record, "id"), "7");
    }

    #[test]
    fn test_files_images_points_and_decimals() {
        let settings = BackofficeSettings::default();
        let record = stuff(vec![
            ("picture", Value::Image(Some(FileRef::new("pics/a.png")))),
            ("empty_picture", Value::Image(None)),
            ("report", Value::File(Some(FileRef::new("reports/q1.csv")))),
            ("manual", Value::File(Some(FileRef::new("docs/manual.pdf")))),
            ("location", Value::Point(GeoPoint { x: -3.7, y: 40.4 })),
            ("price", Value::Decimal(Decimal::from_str("10.500").unwrap())),
            ("round", Value::Decimal(Decimal::from_str("12.00").unwrap())),
        ]);

        assert_eq!(
            render(&settings, &record, "picture"),
            r#"<img class="max-w-xs rounded" src="/media/pics/a.png" />"#
        );
        assert_eq!(render(&settings, &record, "empty_picture"), "-");
        assert_eq!(
            render(&settings, &record, "report"),
            r#"<a href="/media/reports/q1.csv" type="text/csv" download>reports/q1.csv</a>"#
        );
        assert_eq!(render(&settings, &record, "manual"), "docs/manual.pdf");
        assert_eq!(render(&settings, &record, "location"), "40.4,-3.7");
        assert_eq!(render(&settings, &record, "price"), "10.5");
        assert_eq!(render(&settings, &record, "round"), "12");
    }

    #[test]
    fn test_callables_are_evaluated_and_text_is_escaped() {
        let settings = BackofficeSettings::default();
        let record = stuff(vec![
            ("summary", Value::Callable(Thunk::new(|| Value::text("<b>hi</b>")))),
            ("flag", Value::Callable(Thunk::new(|| Value::Bool(true)))),
        ]);

        assert_eq!(render(&settings, &record, "summary"), "&lt;b&gt;hi&lt;/b&gt;");
        assert!(render(&settings, &record, "flag").contains("text-green-600"));
    }

    #[test]
    fn test_pair_label_is_ignored_when_rendering() {
        let settings = BackofficeSettings::default();
        let urls = urls();
        let record = stuff(vec![("note", Value::text("hello"))]);
        let field = Field::from(("note", "A note"));
        assert_eq!(
            AttributeRenderer::new(&settings, &urls)
                .getattr(&record, &field)
                .as_str(),
            "hello"
        );
    }

    #[test]
    fn test_intcomma() {
        assert_eq!(intcomma(0), "0");
        assert_eq!(intcomma(999), "999");
        assert_eq!(intcomma(1000), "1,000");
        assert_eq!(intcomma(-1234567), "-1,234,567");
    }

    #[test]
    fn test_floatformat() {
        assert_eq!(floatformat(34.23234, None), "34.2");
        assert_eq!(floatformat(34.0, None), "34");
        assert_eq!(floatformat(34.26, None), "34.3");
        assert_eq!(floatformat(34.23234, Some("3")), "34.232");
        assert_eq!(floatformat(34.0, Some("3")), "34.000");
        assert_eq!(floatformat(34.0, Some("-3")), "34");
        assert_eq!(floatformat(34.26, Some("0")), "34");
        assert_eq!(floatformat(0.05, Some("1")), "0.1");
        assert_eq!(floatformat(-0.01, Some("1")), "0.0");
        assert_eq!(floatformat(1234.5, Some("2g")), "1,234.50");
        assert_eq!(floatformat(1.5, Some("abc")), "1.5");
    }

    #[test]
    fn test_floatformat_tiny_magnitudes() {
        assert_eq!(floatformat(1e-30, None), "0.0");
        assert_eq!(floatformat(-1e-30, None), "0.0");
        assert_eq!(floatformat(1e-30, Some("2")), "0.00");
        assert_eq!(floatformat(1e-30, Some("0")), "0");
    }

    #[test]
    fn test_statistics_value() {
        assert_eq!(statistics_value(&StatisticsValue::int(12500), None), "12,500");
        assert_eq!(
            statistics_value(&StatisticsValue::float(33.333).percentage(), None),
            "33.3 %"
        );
        assert_eq!(
            statistics_value(&StatisticsValue::float(2.0), Some("2")),
            "2.00"
        );
        assert!((percentage_of(1, 3) - 33.3333).abs() < 1e-3);
        assert_eq!(percentage_of(1, 0), 0.0);
    }
}
