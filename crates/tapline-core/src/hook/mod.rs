//! UI element locators and the scripts built from them.
//!
//! A [`Hook`] is an opaque UIAutomation expression that evaluates to one
//! element of the app's object graph, e.g. `mainWindow.buttons()["Go"]`.
//! Locator tables for each screen live in submodules as `const` hooks.

pub mod iphone;
pub mod script;

use std::borrow::Cow;
use std::fmt;

/// Locator expression for one UI element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hook(Cow<'static, str>);

impl Hook {
    /// A hook known at compile time; usable in `const` tables.
    pub const fn from_static(expression: &'static str) -> Self {
        Self(Cow::Borrowed(expression))
    }

    pub fn new(expression: impl Into<String>) -> Self {
        Self(Cow::Owned(expression.into()))
    }

    pub fn expression(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
