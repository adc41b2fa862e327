use serde::{Deserialize, Serialize};

/// Closed set of staff roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Kitchen staff: can browse products and submit stock requests.
    #[default]
    Cook,
    /// Can edit the catalog, decide requests and receives low-stock alerts.
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cook => "cook",
            Role::Manager => "manager",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = fogon_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cook" => Ok(Role::Cook),
            "manager" => Ok(Role::Manager),
            other => Err(fogon_core::DomainError::validation(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_role_names() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("cook".parse::<Role>().unwrap(), Role::Cook);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_value(Role::Manager).unwrap(), serde_json::json!("manager"));
    }
}
