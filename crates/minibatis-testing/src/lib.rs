//! # minibatis-testing
//!
//! Test infrastructure for minibatis.
//!
//! This crate provides an in-memory [`MockDriver`] that answers statements
//! from scripted responses and records every call it receives, plus shared
//! fixtures for end-to-end session tests. No database is required.
//!
//! ## Features
//!
//! - Scripted responses keyed by positional SQL, with a default fallback
//! - Recorded statements, parameters and transaction events per connection
//! - Connect and commit failure injection
//! - A user entity and DAO namespace for fixtures
//!
//! ## Example
//!
//! ```rust,ignore
//! use minibatis_testing::{MockDriver, MockResponse, fixtures};
//!
//! #[tokio::test]
//! async fn finds_user() {
//!     let driver = MockDriver::builder()
//!         .with_response(
//!             fixtures::sql::FIND_BY_ID,
//!             MockResponse::rows(fixtures::USER_COLUMNS, vec![
//!                 fixtures::UserRecord::new(1, "Li", None).row(),
//!             ]),
//!         )
//!         .build();
//!
//!     let factory = fixtures::user_factory(&driver, &fixtures::mock_config(2))
//!         .await
//!         .unwrap();
//!     let mut session = factory.open_session(true);
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_driver;

pub use mock_driver::{
    MOCK_DRIVER_NAME, MockConnection, MockDriver, MockDriverBuilder, MockEvent, MockResponse,
    RecordedEvent,
};
