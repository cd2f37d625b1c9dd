pub mod resolver;
pub mod traits;
pub mod web;

#[cfg(test)]
pub(crate) mod fake;

pub use resolver::{ElementError, ElementResolver};
pub use traits::{BrowserDriver, ElementHandle, Locator};
