//! Site-wide policy values that permission and visibility rules depend on.

use serde::{Deserialize, Serialize};

/// Names that carry meaning in permission and visibility checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SitePolicy {
    /// Sector whose editors may publish announcements and maintain the
    /// on-call calendar.
    #[serde(default = "default_admin_sector")]
    pub admin_sector: String,
    /// Event venue that makes an event visible to every branch.
    #[serde(default = "default_company_location")]
    pub company_location: String,
    /// Base URL of the web frontend, used in password reset links.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_admin_sector() -> String {
    "Administracion".to_string()
}

fn default_company_location() -> String {
    "Julia Tours".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for SitePolicy {
    fn default() -> Self {
        Self {
            admin_sector: default_admin_sector(),
            company_location: default_company_location(),
            frontend_url: default_frontend_url(),
        }
    }
}

impl SitePolicy {
    /// Builds the link e-mailed to an account that asked for a password reset.
    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.frontend_url.trim_end_matches('/'),
            token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_joins_without_double_slash() {
        let policy = SitePolicy {
            frontend_url: "https://intranet.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            policy.reset_link("abc"),
            "https://intranet.example.com/reset-password/abc"
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let policy: SitePolicy = serde_json::from_str(r#"{"admin_sector": "Ops"}"#).unwrap();
        assert_eq!(policy.admin_sector, "Ops");
        assert_eq!(policy.company_location, "Julia Tours");
    }
}
