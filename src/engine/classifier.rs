//! Maps an announcement's author name to a [`Department`].
//!
//! Rules are evaluated in order and the first match wins. Grouping and pin
//! quota accounting both depend on one author always landing in the same
//! department, so reordering the table is a behavioural change.

use crate::config::DepartmentConfig;
use crate::domain::Department;

/// Case-insensitive "name contains any of these fragments" predicate.
#[derive(Debug, Clone)]
pub struct DepartmentRule {
    department: Department,
    fragments: Vec<String>,
}

impl DepartmentRule {
    pub fn new<I, S>(department: Department, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            department,
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn department(&self) -> Department {
        self.department
    }

    fn matches(&self, lowered_name: &str) -> bool {
        self.fragments.iter().any(|f| lowered_name.contains(f.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct DepartmentClassifier {
    rules: Vec<DepartmentRule>,
    fallback: Department,
}

impl DepartmentClassifier {
    pub fn new(rules: Vec<DepartmentRule>) -> Self {
        Self {
            rules,
            fallback: Department::HrAdmin,
        }
    }

    /// Uses the configured rule table, or the built-in one when none is configured.
    pub fn from_config(config: &DepartmentConfig) -> Self {
        if config.rules.is_empty() {
            return Self::default();
        }
        Self::new(
            config
                .rules
                .iter()
                .map(|r| DepartmentRule::new(r.department, &r.fragments))
                .collect(),
        )
    }

    /// Total: unmatched or empty names resolve to HR&Admin.
    pub fn classify(&self, author: &str) -> Department {
        let lowered = author.trim().to_lowercase();
        if lowered.is_empty() {
            return self.fallback;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(DepartmentRule::department)
            .unwrap_or(self.fallback)
    }
}

impl Default for DepartmentClassifier {
    fn default() -> Self {
        Self::new(vec![
            DepartmentRule::new(
                Department::Accounting,
                ["anjanneth", "bilas", "accounting", "payroll", "finance"],
            ),
            DepartmentRule::new(Department::Compliance, ["compliance", "audit", "quality assurance"]),
            DepartmentRule::new(
                Department::Technical,
                ["technical", "it support", "engineering", "developer"],
            ),
            DepartmentRule::new(Department::HrAdmin, ["human resources", "hr ", "admin"]),
        ])
    }
}
