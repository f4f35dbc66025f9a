//! Utilities for formatting
use std::fmt::{Display, Formatter};

/// Two spaces per level.
pub(crate) struct Indent(pub usize);

impl Display for Indent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:width$}", "", width = self.0 * 2)
    }
}
