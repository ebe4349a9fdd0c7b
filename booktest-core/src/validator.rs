//! Fluent response validation.
//!
//! [`ResponseValidator`] wraps one completed [`Response`] and exposes one
//! assertion per call. Every check is read-only; the wrapper never holds
//! state of its own, so chains are just a sequence of pure checks over
//! the same response. A failing check reports the property it examined
//! together with the expected and actual values.
//!
//! ```rust,ignore
//! use booktest_core::ResponseValidator;
//!
//! ResponseValidator::new(&response)
//!     .status_code(200)?
//!     .has_json_path("bookingid")?
//!     .json_path_eq("booking.firstname", "Jane")?
//!     .response_time_less_than(Duration::from_secs(2))?;
//!
//! // Static equivalents for single assertions:
//! ResponseValidator::assert_status_code(&response, 201)?;
//! ```
//!
//! JSON paths are dot-separated; array elements are addressed with `[n]`,
//! so `[0].bookingid` and `booking.bookingdates.checkin` both resolve.

use serde_json::Value;
use std::{path::Path, time::Duration};
use tracing::*;

use crate::http::Response;

/// A failed check. Carries the checked property and the expected vs.
/// actual values; schema violations surface here too.
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error("status code: expected {expected}, got {actual}")]
    StatusCode { expected: u16, actual: u16 },
    #[error("status code should be {range}, got {actual}")]
    StatusRange { range: &'static str, actual: u16 },
    #[error("response body is not valid JSON: {reason}")]
    InvalidJson { reason: String },
    #[error("json path \"{path}\" not found in response body")]
    JsonPathMissing { path: String },
    #[error("json path \"{path}\": expected {expected}, got {actual}")]
    JsonPathMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },
    #[error("json path \"{path}\" should be an array")]
    NotAnArray { path: String },
    #[error("array at \"{path}\": expected {expected} elements, got {actual}")]
    ArraySize {
        path: String,
        expected: usize,
        actual: usize,
    },
    #[error("array at \"{path}\" should not be empty")]
    ArrayEmpty { path: String },
    #[error("header \"{name}\": expected {expected:?}, got {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: Option<String>,
    },
    #[error("header \"{name}\" should contain {substring:?}, got {actual:?}")]
    HeaderContains {
        name: String,
        substring: String,
        actual: Option<String>,
    },
    #[error("response body should contain {text:?}")]
    BodyContains { text: String },
    #[error("response time should be below {max:?}, took {actual:?}")]
    ResponseTime { max: Duration, actual: Duration },
    #[error("failed to load schema {schema:?}: {reason}")]
    SchemaLoad { schema: String, reason: String },
    #[error("response does not conform to schema {schema:?}: {violations}")]
    SchemaMismatch { schema: String, violations: String },
}

/// Chainable validator over one response. `Copy`: every method consumes
/// and returns the same immutable view.
#[derive(Clone, Copy, Debug)]
pub struct ResponseValidator<'a> {
    response: &'a Response,
}

impl<'a> ResponseValidator<'a> {
    pub fn new(response: &'a Response) -> ResponseValidator<'a> {
        ResponseValidator { response }
    }

    /// The wrapped response.
    pub fn response(&self) -> &Response {
        self.response
    }

    /// Assert the exact status code.
    pub fn status_code(self, expected: u16) -> Result<Self, AssertionError> {
        let actual = self.response.status.as_u16();
        debug!("asserting status code: expected={expected}, actual={actual}");
        if actual != expected {
            return Err(AssertionError::StatusCode { expected, actual });
        }
        Ok(self)
    }

    /// Assert the status code is in the success range (2xx).
    pub fn is_success(self) -> Result<Self, AssertionError> {
        let actual = self.response.status.as_u16();
        if !(200..=299).contains(&actual) {
            return Err(AssertionError::StatusRange {
                range: "success (2xx)",
                actual,
            });
        }
        Ok(self)
    }

    /// Assert the status code is in the client error range (4xx).
    pub fn is_client_error(self) -> Result<Self, AssertionError> {
        let actual = self.response.status.as_u16();
        if !(400..=499).contains(&actual) {
            return Err(AssertionError::StatusRange {
                range: "client error (4xx)",
                actual,
            });
        }
        Ok(self)
    }

    /// Assert a non-null value exists at the JSON path.
    pub fn has_json_path(self, path: &str) -> Result<Self, AssertionError> {
        let body = self.json()?;
        match lookup(&body, path) {
            Some(value) if !value.is_null() => Ok(self),
            _ => Err(AssertionError::JsonPathMissing { path: path.into() }),
        }
    }

    /// Assert the value at the JSON path equals the expected one.
    pub fn json_path_eq(
        self,
        path: &str,
        expected: impl Into<Value>,
    ) -> Result<Self, AssertionError> {
        let expected = expected.into();
        let body = self.json()?;
        let actual = lookup(&body, path)
            .ok_or_else(|| AssertionError::JsonPathMissing { path: path.into() })?;
        debug!("asserting json path {path}: expected={expected}, actual={actual}");
        if *actual != expected {
            return Err(AssertionError::JsonPathMismatch {
                path: path.into(),
                expected,
                actual: actual.clone(),
            });
        }
        Ok(self)
    }

    /// Assert the array at the JSON path has exactly `expected` elements.
    pub fn json_path_array_size(
        self,
        path: &str,
        expected: usize,
    ) -> Result<Self, AssertionError> {
        let array = self.array_at(path)?;
        if array.len() != expected {
            return Err(AssertionError::ArraySize {
                path: path.into(),
                expected,
                actual: array.len(),
            });
        }
        Ok(self)
    }

    /// Assert the array at the JSON path is not empty.
    pub fn json_path_array_not_empty(self, path: &str) -> Result<Self, AssertionError> {
        if self.array_at(path)?.is_empty() {
            return Err(AssertionError::ArrayEmpty { path: path.into() });
        }
        Ok(self)
    }

    /// Assert a header is present with the exact value.
    pub fn header(self, name: &str, expected: &str) -> Result<Self, AssertionError> {
        let actual = self.response.header(name);
        debug!("asserting header {name}: expected={expected}, actual={actual:?}");
        if actual != Some(expected) {
            return Err(AssertionError::Header {
                name: name.into(),
                expected: expected.into(),
                actual: actual.map(String::from),
            });
        }
        Ok(self)
    }

    /// Assert a header is present and contains the substring.
    pub fn header_contains(self, name: &str, substring: &str) -> Result<Self, AssertionError> {
        let actual = self.response.header(name);
        match actual {
            Some(value) if value.contains(substring) => Ok(self),
            _ => Err(AssertionError::HeaderContains {
                name: name.into(),
                substring: substring.into(),
                actual: actual.map(String::from),
            }),
        }
    }

    /// Assert the raw body contains the text.
    pub fn body_contains(self, text: &str) -> Result<Self, AssertionError> {
        if !self.response.text.contains(text) {
            return Err(AssertionError::BodyContains { text: text.into() });
        }
        Ok(self)
    }

    /// Assert the response arrived in under `max`.
    pub fn response_time_less_than(self, max: Duration) -> Result<Self, AssertionError> {
        let actual = self.response.elapsed;
        debug!("asserting response time: max={max:?}, actual={actual:?}");
        if actual >= max {
            return Err(AssertionError::ResponseTime { max, actual });
        }
        Ok(self)
    }

    /// Assert the body conforms to the JSON schema document at `path`.
    pub fn matches_schema(self, path: impl AsRef<Path>) -> Result<Self, AssertionError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        debug!("validating against schema: {name}");

        let schema_load = |reason: String| AssertionError::SchemaLoad {
            schema: name.clone(),
            reason,
        };
        let buf = std::fs::read_to_string(path).map_err(|e| schema_load(e.to_string()))?;
        let schema: Value = serde_json::from_str(&buf).map_err(|e| schema_load(e.to_string()))?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| schema_load(e.to_string()))?;

        let instance = self.json()?;
        let violations: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| format!("{e} (at {})", e.instance_path()))
            .collect();
        if !violations.is_empty() {
            return Err(AssertionError::SchemaMismatch {
                schema: name,
                violations: violations.join("; "),
            });
        }
        Ok(self)
    }

    fn json(&self) -> Result<Value, AssertionError> {
        serde_json::from_str(&self.response.text).map_err(|e| AssertionError::InvalidJson {
            reason: e.to_string(),
        })
    }

    fn array_at(&self, path: &str) -> Result<Vec<Value>, AssertionError> {
        let body = self.json()?;
        let value = lookup(&body, path)
            .ok_or_else(|| AssertionError::JsonPathMissing { path: path.into() })?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| AssertionError::NotAnArray { path: path.into() })
    }

    // Static equivalents for single-assertion use.

    pub fn assert_status_code(response: &Response, expected: u16) -> Result<(), AssertionError> {
        ResponseValidator::new(response).status_code(expected).map(drop)
    }

    pub fn assert_success(response: &Response) -> Result<(), AssertionError> {
        ResponseValidator::new(response).is_success().map(drop)
    }

    pub fn assert_client_error(response: &Response) -> Result<(), AssertionError> {
        ResponseValidator::new(response).is_client_error().map(drop)
    }

    pub fn assert_json_path_exists(response: &Response, path: &str) -> Result<(), AssertionError> {
        ResponseValidator::new(response).has_json_path(path).map(drop)
    }

    pub fn assert_json_path(
        response: &Response,
        path: &str,
        expected: impl Into<Value>,
    ) -> Result<(), AssertionError> {
        ResponseValidator::new(response)
            .json_path_eq(path, expected)
            .map(drop)
    }

    pub fn assert_array_size(
        response: &Response,
        path: &str,
        expected: usize,
    ) -> Result<(), AssertionError> {
        ResponseValidator::new(response)
            .json_path_array_size(path, expected)
            .map(drop)
    }

    pub fn assert_array_not_empty(response: &Response, path: &str) -> Result<(), AssertionError> {
        ResponseValidator::new(response)
            .json_path_array_not_empty(path)
            .map(drop)
    }

    pub fn assert_header(
        response: &Response,
        name: &str,
        expected: &str,
    ) -> Result<(), AssertionError> {
        ResponseValidator::new(response).header(name, expected).map(drop)
    }

    pub fn assert_header_contains(
        response: &Response,
        name: &str,
        substring: &str,
    ) -> Result<(), AssertionError> {
        ResponseValidator::new(response)
            .header_contains(name, substring)
            .map(drop)
    }

    pub fn assert_body_contains(response: &Response, text: &str) -> Result<(), AssertionError> {
        ResponseValidator::new(response).body_contains(text).map(drop)
    }

    pub fn assert_response_time(response: &Response, max: Duration) -> Result<(), AssertionError> {
        ResponseValidator::new(response)
            .response_time_less_than(max)
            .map(drop)
    }

    pub fn assert_schema(response: &Response, path: impl AsRef<Path>) -> Result<(), AssertionError> {
        ResponseValidator::new(response).matches_schema(path).map(drop)
    }
}

/// Walk a dot-separated path through a JSON value. Each segment is an
/// object key, optionally followed by `[n]` indices; a bare `[n]` indexes
/// the current value, and an empty path yields the whole body.
fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = descend(current, segment)?;
    }
    Some(current)
}

fn descend<'v>(mut current: &'v Value, segment: &str) -> Option<&'v Value> {
    let (key, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };
    if !key.is_empty() {
        current = current.get(key)?;
    }
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']')?;
        let index: usize = stripped[..end].parse().ok()?;
        current = current.get(index)?;
        rest = &stripped[end + 1..];
    }
    Some(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use http::header::HeaderMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn response(status: u16, body: &str) -> Response {
        Response {
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            text: body.to_string(),
            elapsed: Duration::from_millis(120),
        }
    }

    fn created_booking() -> Response {
        response(
            200,
            r#"{
                "bookingid": 42,
                "booking": {
                    "firstname": "Jane",
                    "lastname": "Doe",
                    "totalprice": 250,
                    "depositpaid": true,
                    "bookingdates": {"checkin": "2024-06-01", "checkout": "2024-06-07"}
                }
            }"#,
        )
    }

    #[test]
    fn chain_passes_when_every_check_holds() -> eyre::Result<()> {
        let res = created_booking();
        ResponseValidator::new(&res)
            .status_code(200)?
            .has_json_path("bookingid")?
            .json_path_eq("booking.firstname", "Jane")?
            .json_path_eq("booking.totalprice", 250)?
            .json_path_eq("booking.depositpaid", true)?
            .response_time_less_than(Duration::from_secs(2))?;
        Ok(())
    }

    #[test]
    fn failing_status_names_the_check() {
        let res = created_booking();
        let err = ResponseValidator::new(&res).status_code(201).unwrap_err();
        assert_eq!(err.to_string(), "status code: expected 201, got 200");
    }

    #[test]
    fn missing_path_names_the_path() {
        let res = created_booking();
        let err = ResponseValidator::new(&res)
            .status_code(200)
            .and_then(|v| v.has_json_path("booking.additionalneeds"))
            .unwrap_err();
        assert!(err.to_string().contains("booking.additionalneeds"));
    }

    #[test]
    fn mismatch_carries_expected_and_actual() {
        let res = created_booking();
        let err = ResponseValidator::new(&res)
            .json_path_eq("booking.firstname", "Janet")
            .unwrap_err();
        match err {
            AssertionError::JsonPathMismatch { expected, actual, .. } => {
                assert_eq!(expected, json!("Janet"));
                assert_eq!(actual, json!("Jane"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_value_counts_as_missing() {
        let res = response(200, r#"{"additionalneeds": null}"#);
        assert!(ResponseValidator::new(&res)
            .has_json_path("additionalneeds")
            .is_err());
    }

    #[test]
    fn array_indices_resolve() -> eyre::Result<()> {
        let res = response(
            200,
            r#"[{"bookingid": 1}, {"bookingid": 2}]"#,
        );
        ResponseValidator::new(&res)
            .json_path_eq("[0].bookingid", 1)?
            .json_path_eq("[1].bookingid", 2)?;
        Ok(())
    }

    #[test]
    fn named_array_segments_resolve() -> eyre::Result<()> {
        let res = response(200, r#"{"bookings": [{"id": 7}]}"#);
        ResponseValidator::new(&res).json_path_eq("bookings[0].id", 7)?;
        Ok(())
    }

    #[test_case(200; "lower bound")]
    #[test_case(204; "no content")]
    #[test_case(299; "upper bound")]
    fn success_range(status: u16) {
        let res = response(status, "");
        assert!(ResponseValidator::new(&res).is_success().is_ok());
    }

    #[test_case(199)]
    #[test_case(301)]
    #[test_case(500)]
    fn outside_success_range(status: u16) {
        let res = response(status, "");
        assert!(ResponseValidator::new(&res).is_success().is_err());
    }

    #[test_case(400; "bad request")]
    #[test_case(404; "not found")]
    #[test_case(499; "upper bound")]
    fn client_error_range(status: u16) {
        let res = response(status, "");
        assert!(ResponseValidator::new(&res).is_client_error().is_ok());
    }

    #[test]
    fn server_error_is_not_client_error() {
        let res = response(500, "");
        let err = ResponseValidator::new(&res).is_client_error().unwrap_err();
        assert!(err.to_string().contains("client error (4xx)"));
    }

    #[test]
    fn array_size_checks() -> eyre::Result<()> {
        let res = response(200, r#"{"bookings": [1, 2, 3]}"#);
        let v = ResponseValidator::new(&res)
            .json_path_array_size("bookings", 3)?
            .json_path_array_not_empty("bookings")?;
        assert!(v.json_path_array_size("bookings", 2).is_err());
        Ok(())
    }

    #[test]
    fn empty_array_fails_not_empty() {
        let res = response(200, r#"{"bookings": []}"#);
        let err = ResponseValidator::new(&res)
            .json_path_array_not_empty("bookings")
            .unwrap_err();
        assert!(matches!(err, AssertionError::ArrayEmpty { .. }));
    }

    #[test]
    fn header_checks() -> eyre::Result<()> {
        let mut res = response(200, "");
        res.headers
            .insert("content-type", "application/json; charset=utf-8".parse().unwrap());

        ResponseValidator::new(&res)
            .header("content-type", "application/json; charset=utf-8")?
            .header_contains("content-type", "application/json")?;

        let err = ResponseValidator::new(&res)
            .header("content-type", "text/html")
            .unwrap_err();
        assert!(err.to_string().contains("content-type"));
        assert!(ResponseValidator::new(&res).header("x-missing", "1").is_err());
        Ok(())
    }

    #[test]
    fn body_contains_checks_raw_text() {
        let res = response(200, "Created");
        assert!(ResponseValidator::new(&res).body_contains("Created").is_ok());
        let err = ResponseValidator::new(&res).body_contains("Deleted").unwrap_err();
        assert_eq!(err.to_string(), "response body should contain \"Deleted\"");
    }

    #[test]
    fn response_time_threshold() {
        let res = response(200, "");
        assert!(ResponseValidator::new(&res)
            .response_time_less_than(Duration::from_millis(121))
            .is_ok());
        let err = ResponseValidator::new(&res)
            .response_time_less_than(Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, AssertionError::ResponseTime { .. }));
    }

    #[test]
    fn non_json_body_fails_json_checks() {
        let res = response(200, "<html></html>");
        let err = ResponseValidator::new(&res).has_json_path("id").unwrap_err();
        assert!(matches!(err, AssertionError::InvalidJson { .. }));
    }

    #[test]
    fn schema_conformance() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let schema_path = dir.path().join("booking-created.json");
        std::fs::write(
            &schema_path,
            serde_json::to_string_pretty(&json!({
                "type": "object",
                "required": ["bookingid", "booking"],
                "properties": {
                    "bookingid": {"type": "integer"},
                    "booking": {
                        "type": "object",
                        "required": ["firstname", "lastname"]
                    }
                }
            }))?,
        )?;

        let res = created_booking();
        ResponseValidator::new(&res).matches_schema(&schema_path)?;

        let bad = response(200, r#"{"booking": {}}"#);
        let err = ResponseValidator::new(&bad)
            .matches_schema(&schema_path)
            .unwrap_err();
        assert!(matches!(err, AssertionError::SchemaMismatch { .. }));
        Ok(())
    }

    #[test]
    fn missing_schema_file_is_a_load_error() {
        let res = created_booking();
        let err = ResponseValidator::new(&res)
            .matches_schema("schemas/does-not-exist.json")
            .unwrap_err();
        assert!(matches!(err, AssertionError::SchemaLoad { .. }));
    }

    #[test]
    fn static_equivalents() -> eyre::Result<()> {
        let res = created_booking();
        ResponseValidator::assert_status_code(&res, 200)?;
        ResponseValidator::assert_success(&res)?;
        ResponseValidator::assert_json_path_exists(&res, "bookingid")?;
        ResponseValidator::assert_json_path(&res, "booking.lastname", "Doe")?;
        ResponseValidator::assert_body_contains(&res, "Jane")?;
        ResponseValidator::assert_response_time(&res, Duration::from_secs(5))?;
        assert!(ResponseValidator::assert_client_error(&res).is_err());
        Ok(())
    }
}
