//! Test utilities for bucketproxy
//!
//! Provides utilities for end-to-end testing over real TCP connections:
//! - Serve the proxy in-process on an ephemeral port
//! - Choose the storage backend and key prefix per test
//! - Client helpers for the supported methods
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bucketproxy_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_roundtrip() {
//!     let server = TestServer::start("team/").await.unwrap();
//!     let client = server.client();
//!
//!     client.put("/a.txt", "hello").await.unwrap();
//!     assert_eq!(client.get("/a.txt").await.unwrap().text().await.unwrap(), "hello");
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{ClientError, ProxyClient};
pub use server::{TestError, TestServer};
