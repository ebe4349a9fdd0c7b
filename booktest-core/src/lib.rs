//! # Booktest Core
//!
//! Test-automation toolkit for the [Restful Booker] API: a thin layer of
//! utilities on top of `reqwest` for exercising a booking service from
//! test suites.
//!
//! - Configuration resolution with a fixed precedence (override >
//!   environment variable > environment file > default)
//! - Token-based authentication with a mutex-guarded cache
//! - An HTTP client wrapper that narrates every exchange to a reporter
//! - Fluent, chainable response assertions with schema validation
//! - A standalone HTML report with sensitive values masked
//!
//! ## Architecture (block diagram)
//!
//! ```text
//! +---------------------+      +---------------------+      +---------------------+
//! | config (resolution) | ---> | auth (token cache)  |      | reporter (HTML out) |
//! | override/env/file   |      | one login per miss  |      | masked narration    |
//! +---------------------+      +---------------------+      +---------------------+
//!            |                          |                              ^
//!            v                          v                              |
//! +---------------------+      +---------------------+                 |
//! | http (client)       | ---> | Response            | ----narrate-----+
//! | base url + timeout  |      | status/headers/body |
//! +---------------------+      +---------------------+
//!                                       |
//!                                       v
//!                              +---------------------+
//!                              | validator (fluent)  |
//!                              | one check per call  |
//!                              +---------------------+
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booktest_core::{AuthService, Client, Config, ResponseValidator};
//!
//! let config = Config::shared();
//! let client = Client::new(&config)?;
//! let auth = AuthService::new(config)?;
//!
//! let res = client.post("/booking").json(&booking).send()?;
//! ResponseValidator::new(&res)
//!     .status_code(200)?
//!     .json_path_eq("booking.firstname", "Jane")?;
//!
//! let res = client
//!     .delete(format!("/booking/{id}"))
//!     .headers(auth.auth_headers()?)
//!     .send()?;
//! ResponseValidator::assert_status_code(&res, 201)?;
//! ```
//!
//! [Restful Booker]: https://restful-booker.herokuapp.com/apidoc/

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod masking;
pub mod reporter;
pub mod validator;

pub use auth::{AuthError, AuthService};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use self::http::{Client, Response};
pub use reporter::{HtmlReporter, NullReporter, Outcome, Reporter};
pub use validator::{AssertionError, ResponseValidator};
