//! Shared fixtures for the end-to-end suites: a config pointed at a mock
//! server, the canonical booking payload, and canned responses shaped
//! like the Restful Booker API.

use booktest_core::{
    config::{BASE_URL, TIMEOUT},
    Config,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Configuration pointed at a mock server instead of the live API.
pub fn test_config(base_url: &str) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .set(BASE_URL, base_url)
            .set(TIMEOUT, "5")
            .load()
            .expect("test config should load"),
    )
}

/// A complete booking payload.
pub fn booking_payload(
    firstname: &str,
    lastname: &str,
    totalprice: i64,
    depositpaid: bool,
    checkin: &str,
    checkout: &str,
    additionalneeds: Option<&str>,
) -> Value {
    let mut booking = json!({
        "firstname": firstname,
        "lastname": lastname,
        "totalprice": totalprice,
        "depositpaid": depositpaid,
        "bookingdates": {
            "checkin": checkin,
            "checkout": checkout,
        },
    });
    if let Some(needs) = additionalneeds {
        booking["additionalneeds"] = needs.into();
    }
    booking
}

/// The creation response the API wraps a new booking in.
pub fn created_response(bookingid: i64, booking: &Value) -> String {
    json!({"bookingid": bookingid, "booking": booking}).to_string()
}

/// Install a subscriber once so `RUST_LOG` reveals the toolkit's own
/// narration while debugging a failing suite.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
