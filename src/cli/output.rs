use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::config::RobotConfig;
use crate::error::{HsError, Result};

#[derive(Debug, Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    /// Some sources failed; `data` holds what the others produced.
    Partial { degraded: usize },
}

impl<T> RobotResponse<T> {
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        if !warnings.is_empty() && matches!(self.status, RobotStatus::Ok) {
            self.status = RobotStatus::Partial {
                degraded: warnings.len(),
            };
        }
        self.warnings = warnings;
        self
    }
}

pub fn robot_ok<T: Serialize>(data: T, config: &RobotConfig) -> RobotResponse<T> {
    let (timestamp, version) = if config.include_metadata {
        (Some(Utc::now()), Some(env!("CARGO_PKG_VERSION").to_string()))
    } else {
        (None, None)
    };
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp,
        version,
        data,
        warnings: Vec::new(),
    }
}

/// Error payload printed on stdout in robot mode.
#[must_use]
pub fn robot_error(err: &HsError) -> serde_json::Value {
    serde_json::json!({
        "error": true,
        "code": err.code(),
        "message": err.to_string(),
    })
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>, config: &RobotConfig) -> Result<()> {
    let payload = if config.pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 14,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines.push(format!("{} {value}", style(padded).dim()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn warning(&mut self, text: &str) -> &mut Self {
        self.lines
            .push(format!("{} {text}", style("warning:").yellow().bold()));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

/// Shorten `text` to `max_chars` characters, appending "..." when cut.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_ok_metadata_toggle() {
        let with = serde_json::to_value(robot_ok(1, &RobotConfig::default())).unwrap();
        assert_eq!(with["status"], "ok");
        assert!(with.get("timestamp").is_some());

        let config = RobotConfig {
            include_metadata: false,
            ..RobotConfig::default()
        };
        let without = serde_json::to_value(robot_ok(1, &config)).unwrap();
        assert!(without.get("timestamp").is_none());
        assert!(without.get("version").is_none());
        assert_eq!(without["data"], 1);
    }

    #[test]
    fn test_warnings_mark_partial() {
        let response =
            robot_ok((), &RobotConfig::default()).with_warnings(vec!["semantic timed out".into()]);
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["status"]["partial"]["degraded"], 1);
        assert_eq!(value["warnings"][0], "semantic timed out");
    }

    #[test]
    fn test_robot_error_shape() {
        let value = robot_error(&HsError::InvalidArgument("limit must be > 0".into()));
        assert_eq!(value["error"], true);
        assert_eq!(value["code"], "invalid_argument");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("الصلاة", 10), "الصلاة");
        assert_eq!(truncate_chars("abcdefghij", 6), "abc...");
    }
}
