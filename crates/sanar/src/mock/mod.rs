//! Mock browser session for testing without chromium.
//!
//! [`MockSession`] holds a flat element table and resolves every
//! [`crate::locator::Locator`] with the same rules as the in-page resolver,
//! so resolver, navigation and proxy behavior can be exercised in plain
//! `#[tokio::test]`s.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sanar::mock::{MockElement, MockSession};
//!
//! let page = MockSession::new()
//!     .with_element(MockElement::new("input").id("username").label("Username"));
//! page.perform(&Locator::new("#username"), &HealableAction::Fill("bob".into()), 1000).await?;
//! assert!(page.was_called("fill:"));
//! ```

mod css;
mod session;

pub use session::{MockElement, MockFetcher, MockSession};
