//! ABOUTME: Typed attribute values exposed by records
//! ABOUTME: Closed set of shapes the renderer and exporter switch on

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Reference to a stored file, relative to the media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
}

impl FileRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Public URL of the file under the given media prefix
    pub fn url(&self, media_url: &str) -> String {
        format!(
            "{}/{}",
            media_url.trim_end_matches('/'),
            self.name.trim_start_matches('/')
        )
    }

    /// Optional file from a nullable column; empty names count as no file
    pub fn from_column(name: Option<&str>) -> Option<Self> {
        name.filter(|n| !n.is_empty()).map(Self::new)
    }
}

/// Geographic point, x is the longitude and y the latitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

/// A related record as seen from the record that points at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedObject {
    pub model: String,
    pub pk: i64,
    pub display: String,
}

impl RelatedObject {
    pub fn new(model: impl Into<String>, pk: i64, display: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            pk,
            display: display.into(),
        }
    }

    /// Value of a lookup attribute, only the primary key is known here
    pub fn lookup(&self, field: &str) -> Option<String> {
        match field {
            "pk" | "id" => Some(self.pk.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for RelatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Deferred attribute, evaluated when rendered or exported
#[derive(Clone)]
pub struct Thunk(Arc<dyn Fn() -> Value + Send + Sync>);

impl Thunk {
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thunk(..)")
    }
}

impl PartialEq for Thunk {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Attribute value of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Image(Option<FileRef>),
    File(Option<FileRef>),
    Point(GeoPoint),
    Object(RelatedObject),
    Relation(Vec<RelatedObject>),
    Callable(Thunk),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Wrap an optional value, mapping `None` to `Null`
    pub fn optional<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Self {
        value.map(f).unwrap_or(Value::Null)
    }

    /// Evaluate callables until a concrete value remains
    pub fn resolve(self) -> Value {
        let mut value = self;
        while let Value::Callable(thunk) = value {
            value = thunk.call();
        }
        value
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Image(file) | Value::File(file) => match file {
                Some(file) => f.write_str(&file.name),
                None => Ok(()),
            },
            Value::Point(p) => write!(f, "POINT ({} {})", p.x, p.y),
            Value::Object(obj) => f.write_str(&obj.display),
            Value::Relation(items) => {
                let names: Vec<&str> = items.iter().map(|i| i.display.as_str()).collect();
                f.write_str(&names.join(", "))
            }
            Value::Callable(thunk) => write!(f, "{}", thunk.call()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::text("hi, there").to_string(), "hi, there");
        assert_eq!(
            Value::Decimal(Decimal::from_str("10.500").unwrap()).to_string(),
            "10.500"
        );
        assert_eq!(
            Value::Point(GeoPoint { x: -3.7, y: 40.4 }).to_string(),
            "POINT (-3.7 40.4)"
        );
    }

    #[test]
    fn test_display_relation_joins_names() {
        let value = Value::Relation(vec![
            RelatedObject::new("group", 1, "editors"),
            RelatedObject::new("group", 2, "staff"),
        ]);
        assert_eq!(value.to_string(), "editors, staff");
        assert_eq!(Value::Relation(vec![]).to_string(), "");
    }

    #[test]
    fn test_resolve_nested_callables() {
        let inner = Thunk::new(|| Value::Int(7));
        let outer = Thunk::new(move || Value::Callable(inner.clone()));
        assert_eq!(Value::Callable(outer).resolve(), Value::Int(7));
    }

    #[test]
    fn test_file_ref_url_and_empty_names() {
        let file = FileRef::new("reports/q1.csv");
        assert_eq!(file.url("/media/"), "/media/reports/q1.csv");
        assert_eq!(FileRef::from_column(Some("")), None);
        assert_eq!(FileRef::from_column(None), None);
    }

    #[test]
    fn test_related_lookup() {
        let owner = RelatedObject::new("user", 9, "alice");
        assert_eq!(owner.lookup("pk").as_deref(), Some("9"));
        assert_eq!(owner.lookup("id").as_deref(), Some("9"));
        assert_eq!(owner.lookup("slug"), None);
    }
}
