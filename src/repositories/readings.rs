use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{NewReading, Reading};
use crate::repositories::{InsertResult, ReadingStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

const INSERT_COLUMNS: [&str; 45] = [
    "external_id",
    "captured_at",
    "vendor_date",
    "state",
    "battery_level",
    "battery_range",
    "ideal_battery_range",
    "est_battery_range",
    "usable_battery_level",
    "charge_limit_soc",
    "charging_state",
    "charge_rate",
    "charger_power",
    "charger_voltage",
    "charger_actual_current",
    "time_to_full_charge",
    "charge_energy_added",
    "charge_miles_added_rated",
    "max_range",
    "inside_temp",
    "outside_temp",
    "driver_temp_setting",
    "passenger_temp_setting",
    "is_climate_on",
    "is_preconditioning",
    "latitude",
    "longitude",
    "speed",
    "heading",
    "shift_state",
    "location",
    "odometer",
    "locked",
    "sentry_mode",
    "valet_mode",
    "car_version",
    "car_state",
    "tpms_front_left",
    "tpms_front_right",
    "tpms_rear_left",
    "tpms_rear_right",
    "sleep_number",
    "drive_number",
    "charge_number",
    "idle_number",
];

fn select_columns() -> String {
    format!("id, {}", INSERT_COLUMNS.join(", "))
}

fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=INSERT_COLUMNS.len())
        .map(|i| format!("${}", i))
        .collect();
    format!(
        "INSERT INTO tesla_readings ({}) VALUES ({}) ON CONFLICT (external_id) DO NOTHING RETURNING id",
        INSERT_COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[derive(Clone)]
pub struct PgReadingStore {
    pool: DbPool,
    write_timeout: Duration,
}

impl PgReadingStore {
    pub fn new(pool: DbPool, write_timeout: Duration) -> Self {
        Self {
            pool,
            write_timeout,
        }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Reading>> {
        let sql = format!(
            "SELECT {} FROM tesla_readings WHERE external_id = $1",
            select_columns()
        );
        let reading = sqlx::query_as::<_, Reading>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn insert(&self, r: &NewReading) -> Result<InsertResult> {
        let sql = insert_sql();
        // Only work before commit is bounded: a timeout here means nothing was written.
        let staged = tokio::time::timeout(self.write_timeout, async {
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query_scalar::<_, i64>(&sql)
                .bind(r.external_id)
                .bind(r.captured_at)
                .bind(&r.vendor_date)
                .bind(&r.state)
                .bind(r.battery_level)
                .bind(r.battery_range)
                .bind(r.ideal_battery_range)
                .bind(r.est_battery_range)
                .bind(r.usable_battery_level)
                .bind(r.charge_limit_soc)
                .bind(&r.charging_state)
                .bind(r.charge_rate)
                .bind(r.charger_power)
                .bind(r.charger_voltage)
                .bind(r.charger_actual_current)
                .bind(r.time_to_full_charge)
                .bind(r.charge_energy_added)
                .bind(r.charge_miles_added_rated)
                .bind(r.max_range)
                .bind(r.inside_temp)
                .bind(r.outside_temp)
                .bind(r.driver_temp_setting)
                .bind(r.passenger_temp_setting)
                .bind(r.is_climate_on)
                .bind(r.is_preconditioning)
                .bind(r.latitude)
                .bind(r.longitude)
                .bind(r.speed)
                .bind(r.heading)
                .bind(&r.shift_state)
                .bind(&r.location)
                .bind(r.odometer)
                .bind(r.locked)
                .bind(r.sentry_mode)
                .bind(r.valet_mode)
                .bind(&r.car_version)
                .bind(&r.car_state)
                .bind(r.tpms_front_left)
                .bind(r.tpms_front_right)
                .bind(r.tpms_rear_left)
                .bind(r.tpms_rear_right)
                .bind(r.sleep_number)
                .bind(r.drive_number)
                .bind(r.charge_number)
                .bind(r.idle_number)
                .fetch_optional(&mut *tx)
                .await;
            Ok::<_, sqlx::Error>((tx, inserted))
        })
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "insert did not reach commit within {}s",
                self.write_timeout.as_secs()
            ))
        })?;
        let (tx, inserted) = staged?;

        match inserted {
            Ok(Some(id)) => {
                tx.commit().await?;
                debug!(external_id = r.external_id, id, "reading inserted");
                Ok(InsertResult::Inserted { id })
            }
            Ok(None) => {
                tx.commit().await?;
                Ok(InsertResult::AlreadyExists)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(external_id = r.external_id, error = %rb, "rollback failed");
                }
                if is_unique_violation(&e) {
                    Ok(InsertResult::AlreadyExists)
                } else {
                    Err(AppError::Db(e))
                }
            }
        }
    }

    async fn latest(&self) -> Result<Option<Reading>> {
        let sql = format!(
            "SELECT {} FROM tesla_readings ORDER BY captured_at DESC LIMIT 1",
            select_columns()
        );
        let reading = sqlx::query_as::<_, Reading>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tesla_readings
            WHERE captured_at >= $1 AND captured_at <= $2
            ORDER BY captured_at ASC
            "#,
            select_columns()
        );
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(readings)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tesla_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_shape() {
        let sql = insert_sql();
        assert!(sql.starts_with("INSERT INTO tesla_readings (external_id, captured_at,"));
        assert!(sql.contains("$45)"));
        assert!(!sql.contains("$46"));
        assert!(sql.ends_with("ON CONFLICT (external_id) DO NOTHING RETURNING id"));
    }

    #[test]
    fn test_select_columns_lead_with_id() {
        let cols = select_columns();
        assert!(cols.starts_with("id, external_id, captured_at"));
        assert!(cols.ends_with("idle_number"));
    }
}
