//! Device identification from the `User-Agent` header, backed by woothee.

use woothee::parser::Parser;

/// woothee's marker for a field it could not classify
const UNKNOWN: &str = "UNKNOWN";

/// Browser, operating system and form factor of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub browser: String,
    pub os: String,
    pub mobile: bool,
}

impl Device {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let parsed = Parser::new().parse(user_agent);
        let known = |value: &str| (!value.is_empty() && value != UNKNOWN).then(|| value.to_string());

        let browser = parsed.as_ref().and_then(|r| known(r.name));
        let os = parsed.as_ref().and_then(|r| known(r.os));
        Self {
            browser: browser.unwrap_or_else(|| "Unknown browser".to_string()),
            os: os.unwrap_or_else(|| "unknown OS".to_string()),
            mobile: parsed.is_some_and(|r| r.category == "smartphone" || r.category == "mobilephone"),
        }
    }

    /// Human-readable label such as "Firefox on Linux"
    pub fn identifier(&self) -> String {
        format!("{} on {}", self.browser, self.os)
    }
}
