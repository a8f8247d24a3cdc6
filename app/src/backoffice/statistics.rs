//! ABOUTME: Dashboard figures about users and stuffs
//! ABOUTME: Counts, the share of active users and the average price

use crate::models::{Stuff, StuffRepository};
use async_trait::async_trait;
use bo_core::Result;
use bo_db::{Db, QuerySet, User};
use bo_web::{
    render::{percentage_of, StatisticsValue},
    views::{Statistic, StatisticsProvider},
};

pub struct DashboardStatistics;

#[async_trait]
impl StatisticsProvider for DashboardStatistics {
    async fn statistics(&self, db: &Db) -> Result<Vec<Statistic>> {
        let pool = db.pool();
        let users = QuerySet::<User>::all().count(pool).await?;
        let active = QuerySet::<User>::all()
            .filter_eq("is_active", 1_i64)?
            .count(pool)
            .await?;
        let stuffs = QuerySet::<Stuff>::all().count(pool).await?;
        let average_price = StuffRepository::new(pool).average_price().await?;

        let mut statistics = vec![
            Statistic::new("Users", StatisticsValue::int(users)),
            Statistic::new(
                "Active users",
                StatisticsValue::float(percentage_of(active, users))
                    .percentage()
                    .help_text("Share of users allowed to sign in"),
            )
            .float_format("1"),
            Statistic::new("Stuffs", StatisticsValue::int(stuffs)),
        ];
        if let Some(price) = average_price {
            statistics.push(Statistic::new("Average price", StatisticsValue::float(price)).float_format("2"));
        }
        Ok(statistics)
    }
}
