//! Display-unit conversions. Stored values stay in the feed's units.

const KM_PER_MILE: f64 = 1.60934;
const BAR_PER_PSI: f64 = 0.0689476;

pub fn miles_to_km(miles: Option<f64>) -> Option<f64> {
    miles.map(|m| m * KM_PER_MILE)
}

pub fn mph_to_kmh(mph: Option<f64>) -> Option<f64> {
    mph.map(|m| m * KM_PER_MILE)
}

pub fn psi_to_bar(psi: Option<f64>) -> Option<f64> {
    psi.map(|p| p * BAR_PER_PSI)
}
