use crate::config::DbConfig;
use crate::error::AppError;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

pub async fn connect(cfg: &DbConfig) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}

/// Create the readings table if it does not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tesla_readings (
            id BIGSERIAL PRIMARY KEY,
            external_id BIGINT NOT NULL UNIQUE,
            captured_at TIMESTAMPTZ NOT NULL,
            vendor_date TEXT,
            state TEXT,
            battery_level DOUBLE PRECISION,
            battery_range DOUBLE PRECISION,
            ideal_battery_range DOUBLE PRECISION,
            est_battery_range DOUBLE PRECISION,
            usable_battery_level DOUBLE PRECISION,
            charge_limit_soc DOUBLE PRECISION,
            charging_state TEXT,
            charge_rate DOUBLE PRECISION,
            charger_power DOUBLE PRECISION,
            charger_voltage DOUBLE PRECISION,
            charger_actual_current DOUBLE PRECISION,
            time_to_full_charge DOUBLE PRECISION,
            charge_energy_added DOUBLE PRECISION,
            charge_miles_added_rated DOUBLE PRECISION,
            max_range DOUBLE PRECISION,
            inside_temp DOUBLE PRECISION,
            outside_temp DOUBLE PRECISION,
            driver_temp_setting DOUBLE PRECISION,
            passenger_temp_setting DOUBLE PRECISION,
            is_climate_on BOOLEAN,
            is_preconditioning BOOLEAN,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            speed DOUBLE PRECISION,
            heading DOUBLE PRECISION,
            shift_state TEXT,
            location TEXT,
            odometer DOUBLE PRECISION,
            locked BOOLEAN,
            sentry_mode BOOLEAN,
            valet_mode BOOLEAN,
            car_version TEXT,
            car_state TEXT,
            tpms_front_left DOUBLE PRECISION,
            tpms_front_right DOUBLE PRECISION,
            tpms_rear_left DOUBLE PRECISION,
            tpms_rear_right DOUBLE PRECISION,
            sleep_number BIGINT,
            drive_number BIGINT,
            charge_number BIGINT,
            idle_number BIGINT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tesla_readings_captured_at ON tesla_readings (captured_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
