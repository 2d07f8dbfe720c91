use crate::coerce::{coerce_bool, coerce_float, coerce_int, coerce_text};
use crate::units::{miles_to_km, mph_to_kmh, psi_to_bar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Raw snapshot as delivered by the feed: a flat map of untyped values.
pub type Payload = Map<String, Value>;

/// One stored snapshot, in the feed's own units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reading {
    pub id: i64,
    pub external_id: i64,
    pub captured_at: DateTime<Utc>,
    pub vendor_date: Option<String>,
    pub state: Option<String>,
    pub battery_level: Option<f64>,
    pub battery_range: Option<f64>,
    pub ideal_battery_range: Option<f64>,
    pub est_battery_range: Option<f64>,
    pub usable_battery_level: Option<f64>,
    pub charge_limit_soc: Option<f64>,
    pub charging_state: Option<String>,
    pub charge_rate: Option<f64>,
    pub charger_power: Option<f64>,
    pub charger_voltage: Option<f64>,
    pub charger_actual_current: Option<f64>,
    pub time_to_full_charge: Option<f64>,
    pub charge_energy_added: Option<f64>,
    pub charge_miles_added_rated: Option<f64>,
    pub max_range: Option<f64>,
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
    pub driver_temp_setting: Option<f64>,
    pub passenger_temp_setting: Option<f64>,
    pub is_climate_on: Option<bool>,
    pub is_preconditioning: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub shift_state: Option<String>,
    pub location: Option<String>,
    pub odometer: Option<f64>,
    pub locked: Option<bool>,
    pub sentry_mode: Option<bool>,
    pub valet_mode: Option<bool>,
    pub car_version: Option<String>,
    pub car_state: Option<String>,
    pub tpms_front_left: Option<f64>,
    pub tpms_front_right: Option<f64>,
    pub tpms_rear_left: Option<f64>,
    pub tpms_rear_right: Option<f64>,
    pub sleep_number: Option<i64>,
    pub drive_number: Option<i64>,
    pub charge_number: Option<i64>,
    pub idle_number: Option<i64>,
}

/// A row ready to insert. Built only through [`NewReading::from_payload`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub external_id: i64,
    pub captured_at: DateTime<Utc>,
    pub vendor_date: Option<String>,
    pub state: Option<String>,
    pub battery_level: Option<f64>,
    pub battery_range: Option<f64>,
    pub ideal_battery_range: Option<f64>,
    pub est_battery_range: Option<f64>,
    pub usable_battery_level: Option<f64>,
    pub charge_limit_soc: Option<f64>,
    pub charging_state: Option<String>,
    pub charge_rate: Option<f64>,
    pub charger_power: Option<f64>,
    pub charger_voltage: Option<f64>,
    pub charger_actual_current: Option<f64>,
    pub time_to_full_charge: Option<f64>,
    pub charge_energy_added: Option<f64>,
    pub charge_miles_added_rated: Option<f64>,
    pub max_range: Option<f64>,
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
    pub driver_temp_setting: Option<f64>,
    pub passenger_temp_setting: Option<f64>,
    pub is_climate_on: Option<bool>,
    pub is_preconditioning: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub shift_state: Option<String>,
    pub location: Option<String>,
    pub odometer: Option<f64>,
    pub locked: Option<bool>,
    pub sentry_mode: Option<bool>,
    pub valet_mode: Option<bool>,
    pub car_version: Option<String>,
    pub car_state: Option<String>,
    pub tpms_front_left: Option<f64>,
    pub tpms_front_right: Option<f64>,
    pub tpms_rear_left: Option<f64>,
    pub tpms_rear_right: Option<f64>,
    pub sleep_number: Option<i64>,
    pub drive_number: Option<i64>,
    pub charge_number: Option<i64>,
    pub idle_number: Option<i64>,
}

/// Reads the upstream identifier; `data_id` is the feed's name for it.
pub fn external_id_of(payload: &Payload) -> Option<i64> {
    coerce_int(payload.get("data_id")).or_else(|| coerce_int(payload.get("external_id")))
}

impl NewReading {
    /// Map every known column through its coercion. Unknown keys are ignored.
    pub fn from_payload(external_id: i64, payload: &Payload, captured_at: DateTime<Utc>) -> Self {
        let float = |key: &str| coerce_float(payload.get(key));
        let int = |key: &str| coerce_int(payload.get(key));
        let flag = |key: &str| coerce_bool(payload.get(key));
        let text = |key: &str| coerce_text(payload.get(key));

        Self {
            external_id,
            captured_at,
            vendor_date: text("Date").or_else(|| text("date")),
            state: text("state"),
            battery_level: float("battery_level"),
            battery_range: float("battery_range"),
            ideal_battery_range: float("ideal_battery_range"),
            est_battery_range: float("est_battery_range"),
            usable_battery_level: float("usable_battery_level"),
            charge_limit_soc: float("charge_limit_soc"),
            charging_state: text("charging_state"),
            charge_rate: float("charge_rate"),
            charger_power: float("charger_power"),
            charger_voltage: float("charger_voltage"),
            charger_actual_current: float("charger_actual_current"),
            time_to_full_charge: float("time_to_full_charge"),
            charge_energy_added: float("charge_energy_added"),
            charge_miles_added_rated: float("charge_miles_added_rated"),
            max_range: float("max_range"),
            inside_temp: float("inside_temp"),
            outside_temp: float("outside_temp"),
            driver_temp_setting: float("driver_temp_setting"),
            passenger_temp_setting: float("passenger_temp_setting"),
            is_climate_on: flag("is_climate_on"),
            is_preconditioning: flag("is_preconditioning"),
            latitude: float("latitude"),
            longitude: float("longitude"),
            speed: float("speed"),
            heading: float("heading"),
            shift_state: text("shift_state"),
            location: text("location"),
            odometer: float("odometer"),
            locked: flag("locked"),
            sentry_mode: flag("sentry_mode"),
            valet_mode: flag("valet_mode"),
            car_version: text("car_version"),
            car_state: text("car_state"),
            tpms_front_left: float("tpms_front_left"),
            tpms_front_right: float("tpms_front_right"),
            tpms_rear_left: float("tpms_rear_left"),
            tpms_rear_right: float("tpms_rear_right"),
            sleep_number: int("sleep_number"),
            drive_number: int("drive_number"),
            charge_number: int("charge_number"),
            idle_number: int("idle_number"),
        }
    }

    /// The stored form of this row once the database has assigned `id`.
    pub fn into_reading(self, id: i64) -> Reading {
        Reading {
            id,
            external_id: self.external_id,
            captured_at: self.captured_at,
            vendor_date: self.vendor_date,
            state: self.state,
            battery_level: self.battery_level,
            battery_range: self.battery_range,
            ideal_battery_range: self.ideal_battery_range,
            est_battery_range: self.est_battery_range,
            usable_battery_level: self.usable_battery_level,
            charge_limit_soc: self.charge_limit_soc,
            charging_state: self.charging_state,
            charge_rate: self.charge_rate,
            charger_power: self.charger_power,
            charger_voltage: self.charger_voltage,
            charger_actual_current: self.charger_actual_current,
            time_to_full_charge: self.time_to_full_charge,
            charge_energy_added: self.charge_energy_added,
            charge_miles_added_rated: self.charge_miles_added_rated,
            max_range: self.max_range,
            inside_temp: self.inside_temp,
            outside_temp: self.outside_temp,
            driver_temp_setting: self.driver_temp_setting,
            passenger_temp_setting: self.passenger_temp_setting,
            is_climate_on: self.is_climate_on,
            is_preconditioning: self.is_preconditioning,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            shift_state: self.shift_state,
            location: self.location,
            odometer: self.odometer,
            locked: self.locked,
            sentry_mode: self.sentry_mode,
            valet_mode: self.valet_mode,
            car_version: self.car_version,
            car_state: self.car_state,
            tpms_front_left: self.tpms_front_left,
            tpms_front_right: self.tpms_front_right,
            tpms_rear_left: self.tpms_rear_left,
            tpms_rear_right: self.tpms_rear_right,
            sleep_number: self.sleep_number,
            drive_number: self.drive_number,
            charge_number: self.charge_number,
            idle_number: self.idle_number,
        }
    }
}

/// A reading plus metric-unit fields for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingView {
    #[serde(flatten)]
    pub reading: Reading,
    pub battery_range_km: Option<f64>,
    pub ideal_battery_range_km: Option<f64>,
    pub est_battery_range_km: Option<f64>,
    pub charge_miles_added_rated_km: Option<f64>,
    pub max_range_km: Option<f64>,
    pub odometer_km: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub charge_rate_kmh: Option<f64>,
    pub tpms_front_left_bar: Option<f64>,
    pub tpms_front_right_bar: Option<f64>,
    pub tpms_rear_left_bar: Option<f64>,
    pub tpms_rear_right_bar: Option<f64>,
}

impl From<Reading> for ReadingView {
    fn from(reading: Reading) -> Self {
        Self {
            battery_range_km: miles_to_km(reading.battery_range),
            ideal_battery_range_km: miles_to_km(reading.ideal_battery_range),
            est_battery_range_km: miles_to_km(reading.est_battery_range),
            charge_miles_added_rated_km: miles_to_km(reading.charge_miles_added_rated),
            max_range_km: miles_to_km(reading.max_range),
            odometer_km: miles_to_km(reading.odometer),
            speed_kmh: mph_to_kmh(reading.speed),
            charge_rate_kmh: mph_to_kmh(reading.charge_rate),
            tpms_front_left_bar: psi_to_bar(reading.tpms_front_left),
            tpms_front_right_bar: psi_to_bar(reading.tpms_front_right),
            tpms_rear_left_bar: psi_to_bar(reading.tpms_rear_left),
            tpms_rear_right_bar: psi_to_bar(reading.tpms_rear_right),
            reading,
        }
    }
}
