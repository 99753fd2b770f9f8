//! Shared test utilities for the Multitune workspace
//!
//! Mock implementations of the HTTP collaborators of the audio processor,
//! so pipeline and client tests run without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockCoreApiServer`] - Mock core API (tracks and quiz audios)
//! - [`MockStorageServer`] - Mock Google Cloud Storage JSON API
//! - [`MockPreviewServer`] - Mock audio host serving preview files
//!
//! # Example
//!
//! ```rust,ignore
//! use multitune_test_utils::MockStorageServer;
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let storage = MockStorageServer::start("stems").await;
//!     storage.mock_object_missing_everywhere().await;
//!     storage.mock_upload_success().await;
//!
//!     // Use storage.url() to configure your storage client
//! }
//! ```

mod core_api;
mod preview;
mod storage;

pub use core_api::{MockCoreApiServer, QuizAudioFixture};
pub use preview::{MockPreviewServer, FAKE_MP3};
pub use storage::MockStorageServer;
