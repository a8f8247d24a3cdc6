//! ABOUTME: Stuff model with a status, an owner and a few richer attributes
//! ABOUTME: Exposed to the backoffice through the Record and Model traits

use bo_core::{time::now_iso8601, Error, Result};
use bo_db::{FileRef, GeoPoint, Model, QuerySet, Record, RelatedObject, Value};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::{fmt, str::FromStr};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Active,
    Error,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Idle, Status::Active, Status::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Active => "active",
            Status::Error => "error",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Active => "Active",
            Status::Error => "Error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Stuff {
    pub id: i64,
    pub status: String,
    pub owner_id: i64,
    pub owner_username: String,
    /// Decimal stored as text
    pub price: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub picture: Option<String>,
    pub report: Option<String>,
    pub created_at: String,
}

impl Stuff {
    pub fn price(&self) -> Option<Decimal> {
        Decimal::from_str(&self.price).ok()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint {
            x: self.longitude?,
            y: self.latitude?,
        })
    }
}

impl fmt::Display for Stuff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stuff {}", self.id)
    }
}

impl Record for Stuff {
    fn model_name(&self) -> &'static str {
        Self::MODEL_NAME
    }

    fn pk(&self) -> i64 {
        self.id
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let value = match name {
            "pk" | "id" => Value::Int(self.id),
            "status" => Value::text(&self.status),
            "owner" => Value::Object(RelatedObject::new("user", self.owner_id, &self.owner_username)),
            "price" => match self.price() {
                Some(price) => Value::Decimal(price),
                None => {
                    warn!("Stuff {} has an unreadable price '{}'", self.id, self.price);
                    Value::Null
                }
            },
            "location" => Value::optional(self.location(), Value::Point),
            "picture" => Value::Image(FileRef::from_column(self.picture.as_deref())),
            "report" => Value::File(FileRef::from_column(self.report.as_deref())),
            "created_at" => Value::text(&self.created_at),
            _ => return None,
        };
        Some(value)
    }

    fn choice_display(&self, name: &str) -> Option<String> {
        match name {
            "status" => Status::parse(&self.status).map(|s| s.label().to_string()),
            _ => None,
        }
    }
}

impl Model for Stuff {
    const MODEL_NAME: &'static str = "stuff";
    const TABLE: &'static str = "stuffs";
    const FROM: &'static str = "stuffs s JOIN users o ON o.id = s.owner_id";
    const SELECT: &'static str = "s.id, s.status, s.owner_id, o.username AS owner_username, \
        s.price, s.latitude, s.longitude, s.picture, s.report, s.created_at";
    const DEFAULT_ORDERING: &'static str = "id";

    fn column(field: &str) -> Option<&'static str> {
        Some(match field {
            "pk" | "id" => "s.id",
            "status" => "s.status",
            "owner" => "s.owner_id",
            "owner_username" => "o.username",
            "price" => "s.price",
            "created_at" => "s.created_at",
            _ => return None,
        })
    }

    fn fields() -> &'static [&'static str] {
        &[
            "id",
            "status",
            "owner",
            "price",
            "location",
            "picture",
            "report",
            "created_at",
        ]
    }

    fn verbose_name(field: &str) -> Option<&'static str> {
        Some(match field {
            "id" | "pk" => "ID",
            "created_at" => "created at",
            _ => return None,
        })
    }
}

/// Values for a new stuff
#[derive(Debug, Clone)]
pub struct NewStuff {
    pub status: Status,
    pub owner_id: i64,
    pub price: Decimal,
    pub location: Option<GeoPoint>,
    pub picture: Option<String>,
    pub report: Option<String>,
}

impl NewStuff {
    pub fn new(owner_id: i64) -> Self {
        Self {
            status: Status::Idle,
            owner_id,
            price: Decimal::ZERO,
            location: None,
            picture: None,
            report: None,
        }
    }
}

pub struct StuffRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StuffRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, request), fields(owner_id = request.owner_id))]
    pub async fn create(&self, request: NewStuff) -> Result<Stuff> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stuffs (status, owner_id, price, latitude, longitude, picture, report, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.owner_id)
        .bind(request.price.to_string())
        .bind(request.location.map(|p| p.y))
        .bind(request.location.map(|p| p.x))
        .bind(request.picture)
        .bind(request.report)
        .bind(now_iso8601())
        .fetch_one(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create stuff: {}", e)))?;

        debug!("Created stuff {}", id);
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("stuff {}", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Stuff>> {
        QuerySet::<Stuff>::all().filter_pk(id)?.first(self.pool).await
    }

    /// Mean price over every stuff, `None` when there are none
    pub async fn average_price(&self) -> Result<Option<f64>> {
        sqlx::query_scalar("SELECT AVG(CAST(price AS REAL)) FROM stuffs")
            .fetch_one(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to average prices: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stuff(status: &str, price: &str) -> Stuff {
        Stuff {
            id: 4,
            status: status.to_string(),
            owner_id: 1,
            owner_username: "ada".to_string(),
            price: price.to_string(),
            latitude: Some(40.4),
            longitude: Some(-3.7),
            picture: None,
            report: Some("reports/q1.pdf".to_string()),
            created_at: "2024-02-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_attributes() {
        let s = stuff("active", "12.50");

        assert_eq!(s.to_string(), "Stuff 4");
        assert_eq!(s.attr("price"), Some(Value::Decimal(Decimal::new(1250, 2))));
        assert_eq!(s.attr("location"), Some(Value::Point(GeoPoint { x: -3.7, y: 40.4 })));
        assert_eq!(s.attr("picture"), Some(Value::Image(None)));
        assert_eq!(
            s.attr("report"),
            Some(Value::File(Some(FileRef::new("reports/q1.pdf"))))
        );
        assert_eq!(
            s.attr("owner"),
            Some(Value::Object(RelatedObject::new("user", 1, "ada")))
        );
        assert_eq!(s.attr("missing"), None);
    }

    #[test]
    fn test_status_choices() {
        assert_eq!(stuff("error", "0").choice_display("status").as_deref(), Some("Error"));
        assert_eq!(stuff("unknown", "0").choice_display("status"), None);
        assert_eq!(Status::parse("idle"), Some(Status::Idle));
    }

    #[test]
    fn test_unreadable_price_is_null() {
        assert_eq!(stuff("idle", "n/a").attr("price"), Some(Value::Null));
    }
}
