//! Column role inference.
//!
//! The transformer never looks at column names directly; it asks a [`ColumnClassifier`] which columns play
//! the identifier, date and status roles. The default classifier matches on name fragments.

use crate::constants::{DATE_FRAGMENT, IDENTIFIER_FRAGMENT, STATUS_FRAGMENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Identifier,
    Date,
    Status,
}

pub trait ColumnClassifier: Send + Sync {
    /// Whether the column called `column` plays `role`. A column may play several roles.
    fn has_role(&self, column: &str, role: ColumnRole) -> bool;

    /// All columns playing `role`, in declaration order.
    fn columns_with_role<'a>(&self, columns: &[&'a str], role: ColumnRole) -> Vec<&'a str> {
        columns
            .iter()
            .copied()
            .filter(|c| self.has_role(c, role))
            .collect()
    }

    /// First column playing `role`, in declaration order.
    fn first_with_role<'a>(&self, columns: &[&'a str], role: ColumnRole) -> Option<&'a str> {
        columns.iter().copied().find(|c| self.has_role(c, role))
    }
}

/// Any `name -> Option<role>` function works as a single-role classifier.
impl<F> ColumnClassifier for F
where
    F: Fn(&str) -> Option<ColumnRole> + Send + Sync,
{
    fn has_role(&self, column: &str, role: ColumnRole) -> bool {
        self(column) == Some(role)
    }
}

/// Case-insensitive substring match on the column name
#[derive(Debug, Clone)]
pub struct NameSubstringClassifier {
    rules: Vec<(ColumnRole, String)>,
}

impl NameSubstringClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fragment used for `role`.
    pub fn with_fragment(mut self, role: ColumnRole, fragment: &str) -> Self {
        self.rules.retain(|(r, _)| *r != role);
        self.rules.push((role, fragment.to_lowercase()));
        self
    }
}

impl Default for NameSubstringClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                (ColumnRole::Identifier, IDENTIFIER_FRAGMENT.to_string()),
                (ColumnRole::Date, DATE_FRAGMENT.to_string()),
                (ColumnRole::Status, STATUS_FRAGMENT.to_string()),
            ],
        }
    }
}

impl ColumnClassifier for NameSubstringClassifier {
    fn has_role(&self, column: &str, role: ColumnRole) -> bool {
        let name = column.to_lowercase();
        self.rules
            .iter()
            .any(|(r, fragment)| *r == role && name.contains(fragment.as_str()))
    }
}
