//! Test reporting.
//!
//! The [`Reporter`] trait is the seam between the HTTP client and any
//! report output: the client hands over one [`Log`] per exchange and the
//! sink decides presentation. Reporters are passed in explicitly when
//! constructing a client; there is no ambient "current test" lookup.
//!
//! [`HtmlReporter`] renders the collected narration as a standalone
//! Postman-style HTML document, one section per test, with sensitive
//! header values masked.

use chrono::Local;
use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::*;

use crate::{http::Log, masking};

/// Result of a finished test case, as far as the report is concerned.
#[derive(Debug, Clone)]
pub enum Outcome {
    Passed,
    Failed { reason: String },
}

/// Reporting sink. The trait is based on the "template method" pattern:
/// implement the on_xxx hooks you care about, every hook defaults to a
/// no-op.
pub trait Reporter: Send + Sync {
    /// Called when a test case starts.
    fn on_test_start(&self, _name: &str, _description: &str) {}

    /// Called after every HTTP exchange made on a reporting client.
    fn on_http_call(&self, _log: &Log) {}

    /// Called when a test case ends.
    fn on_test_end(&self, _name: &str, _outcome: Outcome) {}
}

pub struct NullReporter;

impl Reporter for NullReporter {}

#[derive(Debug)]
struct TestRecord {
    name: String,
    description: String,
    calls: Vec<Log>,
    outcome: Option<Outcome>,
}

#[derive(Debug, Default)]
struct ReportState {
    tests: Vec<TestRecord>,
}

/// Collects narration per test and renders an HTML report.
pub struct HtmlReporter {
    title: String,
    state: Mutex<ReportState>,
}

impl Default for HtmlReporter {
    fn default() -> Self {
        HtmlReporter::new()
    }
}

impl HtmlReporter {
    pub fn new() -> HtmlReporter {
        HtmlReporter::with_title("REST API Test Report")
    }

    pub fn with_title(title: impl Into<String>) -> HtmlReporter {
        HtmlReporter {
            title: title.into(),
            state: Mutex::new(ReportState::default()),
        }
    }

    /// Render the report document.
    pub fn render(&self) -> String {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let passed = state
            .tests
            .iter()
            .filter(|t| matches!(t.outcome, Some(Outcome::Passed)))
            .count();
        let failed = state
            .tests
            .iter()
            .filter(|t| matches!(t.outcome, Some(Outcome::Failed { .. })))
            .count();

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset='utf-8'>\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&self.title)));
        html.push_str("</head>\n<body style='font-family: -apple-system, BlinkMacSystemFont, sans-serif; background: #ffffff; margin: 24px;'>\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(&self.title)));
        html.push_str(&format!(
            "<div style='color: #6c757d; margin-bottom: 24px;'>generated {} &middot; {} tests &middot; {passed} passed &middot; {failed} failed</div>\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            state.tests.len(),
        ));

        for test in &state.tests {
            render_test(&mut html, test);
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    /// Write the report into `dir` under a timestamped file name and
    /// return the path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "API_Test_Report_{}.html",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));
        std::fs::write(&path, self.render())?;
        info!("report generated: {}", path.display());
        Ok(path)
    }
}

impl Reporter for HtmlReporter {
    fn on_test_start(&self, name: &str, description: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tests.push(TestRecord {
            name: name.to_string(),
            description: description.to_string(),
            calls: Vec::new(),
            outcome: None,
        });
    }

    fn on_http_call(&self, log: &Log) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.tests.last_mut() {
            Some(test) if test.outcome.is_none() => test.calls.push(log.clone()),
            _ => debug!("no active test context, skipping report entry"),
        }
    }

    fn on_test_end(&self, name: &str, outcome: Outcome) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.tests.iter_mut().rev().find(|t| t.name == name) {
            Some(test) => test.outcome = Some(outcome),
            None => debug!("test \"{name}\" never started, skipping report entry"),
        }
    }
}

fn render_test(html: &mut String, test: &TestRecord) {
    let (chip_color, chip_text) = match &test.outcome {
        Some(Outcome::Passed) => ("#28a745", "passed".to_string()),
        Some(Outcome::Failed { reason }) => ("#dc3545", format!("failed: {reason}")),
        None => ("#6c757d", "not finished".to_string()),
    };

    html.push_str("<div style='margin-bottom: 32px;'>\n");
    html.push_str(&format!(
        "<h2 style='margin-bottom: 4px;'>{} <span style='background: {chip_color}; color: white; padding: 2px 10px; border-radius: 4px; font-size: 13px; vertical-align: middle;'>{}</span></h2>\n",
        escape_html(&test.name),
        escape_html(&chip_text),
    ));
    if !test.description.is_empty() {
        html.push_str(&format!(
            "<div style='color: #6c757d; margin-bottom: 12px;'>{}</div>\n",
            escape_html(&test.description)
        ));
    }

    for log in &test.calls {
        render_request(html, log);
        render_response(html, log);
    }
    html.push_str("</div>\n");
}

fn render_request(html: &mut String, log: &Log) {
    let request = &log.request;

    html.push_str(&format!(
        "<div style='background: #1e3a5f; color: white; padding: 12px; border-radius: 6px 6px 0 0; font-weight: bold; margin-top: 16px;'>\
         <span style='background: {}; padding: 4px 10px; border-radius: 4px; margin-right: 12px; font-size: 12px;'>{}</span>\
         <span style='font-family: monospace; font-size: 13px;'>{}</span></div>\n",
        method_color(request.method.as_str()),
        request.method,
        escape_html(request.url.as_str()),
    ));

    html.push_str("<div style='background: #f8f9fa; border: 1px solid #dee2e6; border-top: none; padding: 16px; border-radius: 0 0 6px 6px;'>\n");

    let query: Vec<_> = request.url.query_pairs().collect();
    if !query.is_empty() {
        html.push_str("<div style='color: #495057; font-weight: 600; margin-bottom: 8px; font-size: 13px;'>Query Parameters</div>\n");
        html.push_str("<div style='background: #fff; border: 1px solid #e9ecef; border-radius: 4px; padding: 12px; font-family: monospace; font-size: 12px; margin-bottom: 16px;'>\n");
        for (key, value) in &query {
            html.push_str(&format!(
                "<div style='padding: 2px 0;'><span style='color: #6f42c1;'>{}</span><span style='color: #6c757d;'> = </span><span style='color: #28a745;'>{}</span></div>\n",
                escape_html(key),
                escape_html(value),
            ));
        }
        html.push_str("</div>\n");
    }

    html.push_str("<div style='color: #495057; font-weight: 600; margin-bottom: 8px; font-size: 13px;'>Request Headers</div>\n");
    render_headers(html, &request.headers);

    if let Some(body) = &request.body {
        html.push_str("<div style='color: #495057; font-weight: 600; margin: 16px 0 8px; font-size: 13px;'>Request Body</div>\n");
        render_body(html, body);
    }

    html.push_str("</div>\n");
}

fn render_response(html: &mut String, log: &Log) {
    let response = &log.response;
    let elapsed_ms = response.elapsed.as_millis();

    match response.status {
        Some(status) => {
            html.push_str(&format!(
                "<div style='background: {}; color: white; padding: 12px; border-radius: 6px 6px 0 0; font-weight: bold; margin-top: 16px;'>\
                 <span style='font-size: 18px; margin-right: 8px;'>{status}</span>\
                 <span style='font-weight: normal; opacity: 0.9;'>{}</span>\
                 <span style='float: right; background: rgba(255,255,255,0.2); padding: 4px 12px; border-radius: 4px; font-size: 13px;'>{elapsed_ms} ms</span></div>\n",
                status_color(status),
                status_text(status),
            ));
        }
        None => {
            html.push_str(&format!(
                "<div style='background: #6c757d; color: white; padding: 12px; border-radius: 6px 6px 0 0; font-weight: bold; margin-top: 16px;'>\
                 no response <span style='float: right; background: rgba(255,255,255,0.2); padding: 4px 12px; border-radius: 4px; font-size: 13px;'>{elapsed_ms} ms</span></div>\n",
            ));
        }
    }

    html.push_str("<div style='background: #f8f9fa; border: 1px solid #dee2e6; border-top: none; padding: 16px; border-radius: 0 0 6px 6px;'>\n");

    html.push_str("<div style='color: #495057; font-weight: 600; margin-bottom: 8px; font-size: 13px;'>Response Headers</div>\n");
    render_headers(html, &response.headers);

    html.push_str("<div style='color: #495057; font-weight: 600; margin: 16px 0 8px; font-size: 13px;'>Response Body</div>\n");
    if response.body.is_empty() {
        html.push_str("<div style='color: #6c757d; font-style: italic;'>No response body</div>\n");
    } else {
        render_body(html, &response.body);
    }

    html.push_str("</div>\n");
}

fn render_headers(html: &mut String, headers: &http::header::HeaderMap) {
    html.push_str("<div style='background: #fff; border: 1px solid #e9ecef; border-radius: 4px; padding: 12px; font-family: monospace; font-size: 12px; max-height: 120px; overflow-y: auto;'>\n");
    for (name, value) in masking::mask_headers(headers).iter() {
        let value = value.to_str().unwrap_or("<binary>");
        html.push_str(&format!(
            "<div style='padding: 2px 0;'>{}: {}</div>\n",
            escape_html(name.as_str()),
            escape_html(value),
        ));
    }
    html.push_str("</div>\n");
}

fn render_body(html: &mut String, body: &str) {
    html.push_str(&format!(
        "<pre style='background: #1e1e1e; color: #ffffff; padding: 16px; border-radius: 4px; margin: 0; overflow-x: auto; font-size: 12px; line-height: 1.5; max-height: 400px; overflow-y: auto;'>{}</pre>\n",
        escape_html(&pretty_json(body)),
    ));
}

fn method_color(method: &str) -> &'static str {
    match method {
        "GET" => "#61affe",
        "POST" => "#49cc90",
        "PUT" => "#fca130",
        "PATCH" => "#50e3c2",
        "DELETE" => "#f93e3e",
        _ => "#6c757d",
    }
}

fn status_color(status: u16) -> &'static str {
    match status {
        200..=299 => "#28a745",
        300..=399 => "#17a2b8",
        400..=499 => "#ffc107",
        500..=599 => "#dc3545",
        _ => "#6c757d",
    }
}

fn status_text(status: u16) -> String {
    match status {
        200 => "OK".to_string(),
        201 => "Created".to_string(),
        204 => "No Content".to_string(),
        400 => "Bad Request".to_string(),
        401 => "Unauthorized".to_string(),
        403 => "Forbidden".to_string(),
        404 => "Not Found".to_string(),
        405 => "Method Not Allowed".to_string(),
        418 => "I'm a Teapot".to_string(),
        500 => "Internal Server Error".to_string(),
        other => format!("Status {other}"),
    }
}

/// Re-indent a JSON body for display; anything unparsable passes through.
fn pretty_json(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::http::{LogRequest, LogResponse};
    use http::header::HeaderMap;
    use std::time::Duration;

    fn sample_log() -> Log {
        let mut request_headers = HeaderMap::new();
        request_headers.insert("content-type", "application/json".parse().unwrap());
        request_headers.insert("cookie", "token=abcdefgh12345678".parse().unwrap());

        let mut response_headers = HeaderMap::new();
        response_headers.insert("content-type", "application/json".parse().unwrap());

        Log {
            request: LogRequest {
                method: reqwest::Method::POST,
                url: url::Url::parse("http://localhost:3001/booking?firstname=Jane").unwrap(),
                headers: request_headers,
                body: Some(r#"{"firstname":"Jane"}"#.to_string()),
            },
            response: LogResponse {
                status: Some(200),
                headers: response_headers,
                body: r#"{"bookingid":42}"#.to_string(),
                elapsed: Duration::from_millis(130),
            },
        }
    }

    #[test]
    fn calls_are_grouped_under_the_open_test() {
        let reporter = HtmlReporter::new();
        reporter.on_test_start("create_booking", "POST /booking round-trip");
        reporter.on_http_call(&sample_log());
        reporter.on_test_end("create_booking", Outcome::Passed);

        let html = reporter.render();
        assert!(html.contains("create_booking"));
        assert!(html.contains("POST /booking round-trip"));
        assert!(html.contains("http://localhost:3001/booking?firstname=Jane"));
        assert!(html.contains("#49cc90"));
        assert!(html.contains("130 ms"));
    }

    #[test]
    fn call_without_open_test_is_dropped_quietly() {
        let reporter = HtmlReporter::new();
        reporter.on_http_call(&sample_log());

        let html = reporter.render();
        assert!(!html.contains("localhost:3001"));
    }

    #[test]
    fn sensitive_headers_are_masked() {
        let reporter = HtmlReporter::new();
        reporter.on_test_start("auth_put", "");
        reporter.on_http_call(&sample_log());
        reporter.on_test_end("auth_put", Outcome::Passed);

        let html = reporter.render();
        assert!(!html.contains("abcdefgh12345678"));
        assert!(html.contains("toke...5678"));
    }

    #[test]
    fn bodies_are_escaped_and_pretty_printed() {
        let reporter = HtmlReporter::new();
        reporter.on_test_start("escape", "");
        let mut log = sample_log();
        log.response.body = r#"{"note":"<script>alert(1)</script>"}"#.to_string();
        reporter.on_http_call(&log);

        let html = reporter.render();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
        // Request body re-indented across lines (quotes are escaped).
        assert!(html.contains("&quot;firstname&quot;: &quot;Jane&quot;"));
    }

    #[test]
    fn failed_outcome_shows_the_reason() {
        let reporter = HtmlReporter::new();
        reporter.on_test_start("delete_booking", "");
        reporter.on_test_end(
            "delete_booking",
            Outcome::Failed {
                reason: "status code: expected 201, got 403".into(),
            },
        );

        let html = reporter.render();
        assert!(html.contains("failed: status code: expected 201, got 403"));
        assert!(html.contains("#dc3545"));
    }

    #[test]
    fn query_parameters_are_listed() {
        let reporter = HtmlReporter::new();
        reporter.on_test_start("filter", "");
        reporter.on_http_call(&sample_log());

        let html = reporter.render();
        assert!(html.contains("Query Parameters"));
        assert!(html.contains("firstname"));
    }

    #[test]
    fn write_to_creates_a_timestamped_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let reporter = HtmlReporter::new();
        reporter.on_test_start("ping", "");
        reporter.on_http_call(&sample_log());
        reporter.on_test_end("ping", Outcome::Passed);

        let path = reporter.write_to(dir.path())?;
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("API_Test_Report_"));
        assert!(file_name.ends_with(".html"));

        let contents = std::fs::read_to_string(&path)?;
        assert!(contents.contains("REST API Test Report"));
        Ok(())
    }
}
