use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of departments an announcement is grouped under.
///
/// Never persisted: always derived from the author name by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Accounting,
    Compliance,
    Technical,
    #[serde(rename = "HR&Admin", alias = "HrAdmin")]
    HrAdmin,
}

impl Department {
    /// Display order for grouped feeds.
    pub const ALL: [Department; 4] = [
        Department::Accounting,
        Department::Compliance,
        Department::Technical,
        Department::HrAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Accounting => "Accounting",
            Department::Compliance => "Compliance",
            Department::Technical => "Technical",
            Department::HrAdmin => "HR&Admin",
        }
    }
}

impl Default for Department {
    fn default() -> Self {
        Department::HrAdmin
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
