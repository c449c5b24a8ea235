//! Fixtures shared by the integration suites.

pub mod mock_http;
