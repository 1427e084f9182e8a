//! Integration tests for the Graph photo provider
//!
//! Uses wiremock to stand in for the Graph API endpoints.

mod common;
mod test_delta;
mod test_download;
mod test_scan;
