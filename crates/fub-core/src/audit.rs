use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: Option<i64>, username: Option<&str>) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id,
            username: username.map(str::to_string),
            file_name: None,
            host: None,
            link: None,
            authorized: None,
            error: None,
            retry_after: None,
        }
    }

    pub fn upload_started(
        user_id: Option<i64>,
        username: Option<&str>,
        file_name: &str,
        host: &str,
    ) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            host: Some(host.to_string()),
            ..Self::base("upload_started", user_id, username)
        }
    }

    pub fn upload_succeeded(
        user_id: Option<i64>,
        username: Option<&str>,
        file_name: &str,
        host: &str,
        link: &str,
    ) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            host: Some(host.to_string()),
            link: Some(link.to_string()),
            ..Self::base("upload_succeeded", user_id, username)
        }
    }

    pub fn upload_failed(
        user_id: Option<i64>,
        username: Option<&str>,
        file_name: &str,
        host: &str,
        error: &str,
    ) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            host: Some(host.to_string()),
            error: Some(error.to_string()),
            ..Self::base("upload_failed", user_id, username)
        }
    }

    pub fn auth(user_id: i64, username: &str, authorized: bool) -> Self {
        Self {
            authorized: Some(authorized),
            ..Self::base("auth", Some(user_id), Some(username))
        }
    }

    pub fn rate_limit(user_id: i64, username: &str, retry_after: f64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", Some(user_id), Some(username))
        }
    }
}

/// Append-only audit trail, one JSON line or one text block per event.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        for field in [&mut event.file_name, &mut event.error, &mut event.link] {
            if let Some(s) = field.take() {
                *field = Some(truncate(&s, AUDIT_MAX_TEXT));
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write and log failures instead of returning them.
    pub fn record(&self, event: AuditEvent) {
        let kind = event.event.clone();
        if let Err(e) = self.write(event) {
            tracing::warn!(event = %kind, error = %e, "failed to write audit event");
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    crate::formatting::truncate_text(s, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLogger::new(dir.path().join("audit.log"), true);
        let long_err = "x".repeat(AUDIT_MAX_TEXT + 10);

        log.write(AuditEvent::upload_failed(
            Some(1),
            Some("u"),
            "a.zip",
            "Gofile.io",
            &long_err,
        ))
        .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "upload_failed");
        assert!(v["error"].as_str().unwrap().ends_with("..."));
        assert!(v.get("link").is_none());
    }

    #[test]
    fn text_format_lists_fields() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLogger::new(dir.path().join("audit.log"), false);

        log.write(AuditEvent::rate_limit(7, "rahim", 2.5)).unwrap();
        log.write(AuditEvent::auth(7, "rahim", false)).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: rate_limit"));
        assert!(written.contains("retry_after: 2.5"));
        assert!(written.contains("authorized: false"));
    }
}
