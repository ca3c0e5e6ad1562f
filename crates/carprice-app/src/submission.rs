// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::SubmitToken;

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            bail!("CSRF token must not be empty");
        }
        Ok(Self(value.to_owned()))
    }

    /// Prefers the hidden form field, then the `csrftoken` cookie.
    pub fn resolve(hidden_field: Option<&str>, cookie_header: Option<&str>) -> Option<Self> {
        hidden_field
            .and_then(|value| Self::new(value).ok())
            .or_else(|| cookie_header.and_then(Self::from_cookie_header))
    }

    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == CSRF_COOKIE)
            .and_then(|(_, value)| Self::new(value).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldErrors {
    One(String),
    Many(Vec<String>),
}

impl FieldErrors {
    pub fn into_messages(self) -> Vec<String> {
        match self {
            Self::One(message) => vec![message],
            Self::Many(messages) => messages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: BTreeMap<String, FieldErrors>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub token: SubmitToken,
    pub action: String,
    pub body: Value,
    pub csrf: Option<CsrfToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Succeeded,
    Rejected { fields: usize },
    Failed(String),
    StaleResponse(SubmitToken),
}

/// JSON form posted to `action` with the page's CSRF token.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    action: String,
    csrf: Option<CsrfToken>,
    fields: serde_json::Map<String, Value>,
    submitting: bool,
    succeeded: bool,
    field_errors: BTreeMap<String, Vec<String>>,
    error: Option<String>,
    pending: Option<SubmitToken>,
    last_token: SubmitToken,
}

impl FormSubmission {
    pub fn new(action: &str, csrf: Option<CsrfToken>) -> Self {
        Self {
            action: action.to_owned(),
            csrf,
            fields: serde_json::Map::new(),
            submitting: false,
            succeeded: false,
            field_errors: BTreeMap::new(),
            error: None,
            pending: None,
            last_token: SubmitToken::new(0),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_owned(), value.into());
        self.field_errors.remove(name);
    }

    /// Replaces every field with the members of a serialised object.
    pub fn set_fields(&mut self, body: Value) -> Result<()> {
        let Value::Object(fields) = body else {
            bail!("form body must be a JSON object");
        };
        self.fields = fields;
        self.field_errors.clear();
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn field_errors(&self, name: &str) -> &[String] {
        self.field_errors
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn all_field_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.field_errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_submit(&mut self) -> Result<SubmitRequest> {
        if self.submitting {
            bail!("a submission is already in progress -- wait for it to finish");
        }
        self.last_token = self.last_token.next();
        self.pending = Some(self.last_token);
        self.submitting = true;
        self.succeeded = false;
        self.field_errors.clear();
        self.error = None;

        Ok(SubmitRequest {
            token: self.last_token,
            action: self.action.clone(),
            body: Value::Object(self.fields.clone()),
            csrf: self.csrf.clone(),
        })
    }

    pub fn finish_submit(
        &mut self,
        token: SubmitToken,
        result: Result<SubmitResponse, String>,
    ) -> SubmitOutcome {
        if self.pending != Some(token) {
            debug!(token = token.get(), "discarding stale submit response");
            return SubmitOutcome::StaleResponse(token);
        }
        self.pending = None;
        self.submitting = false;

        match result {
            Ok(response) if response.success => {
                self.succeeded = true;
                SubmitOutcome::Succeeded
            }
            Ok(response) => {
                self.field_errors = response
                    .errors
                    .into_iter()
                    .map(|(field, errors)| (field, errors.into_messages()))
                    .collect();
                let fields = self.field_errors.len();
                self.error = response.error.or_else(|| {
                    (fields == 0).then(|| "the server rejected the submission".to_owned())
                });
                SubmitOutcome::Rejected { fields }
            }
            Err(message) => {
                self.error = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CsrfToken, FormSubmission, SubmitOutcome, SubmitResponse};
    use serde_json::json;

    fn token() -> CsrfToken {
        CsrfToken::new("abc123").expect("non-empty token")
    }

    #[test]
    fn hidden_field_wins_over_cookie() {
        let resolved = CsrfToken::resolve(Some("from-form"), Some("csrftoken=from-cookie"));
        assert_eq!(resolved.map(|t| t.as_str().to_owned()), Some("from-form".to_owned()));
    }

    #[test]
    fn cookie_is_used_when_hidden_field_is_blank() {
        let resolved = CsrfToken::resolve(
            Some("  "),
            Some("sessionid=xyz; csrftoken=from-cookie; theme=dark"),
        );
        assert_eq!(
            resolved.map(|t| t.as_str().to_owned()),
            Some("from-cookie".to_owned())
        );
        assert!(CsrfToken::resolve(None, Some("sessionid=xyz")).is_none());
    }

    #[test]
    fn submit_carries_fields_and_token() {
        let mut form = FormSubmission::new("/api/leads/", Some(token()));
        form.set_field("name", "Aminah");
        form.set_field("phone", "+60123456789");

        let request = form.begin_submit().expect("first submit");
        assert_eq!(request.action, "/api/leads/");
        assert_eq!(request.body, json!({"name": "Aminah", "phone": "+60123456789"}));
        assert_eq!(request.csrf, Some(token()));
        assert!(form.is_submitting());
        assert!(form.begin_submit().is_err());
    }

    #[test]
    fn successful_response_marks_success() {
        let mut form = FormSubmission::new("/api/leads/", None);
        let request = form.begin_submit().expect("first submit");
        let outcome = form.finish_submit(
            request.token,
            Ok(SubmitResponse {
                success: true,
                errors: Default::default(),
                error: None,
            }),
        );
        assert_eq!(outcome, SubmitOutcome::Succeeded);
        assert!(form.succeeded());
        assert!(!form.is_submitting());
    }

    #[test]
    fn field_errors_accept_strings_and_lists() {
        let response: SubmitResponse = serde_json::from_value(json!({
            "success": false,
            "errors": {"phone": "Invalid number", "name": ["Required", "Too short"]}
        }))
        .expect("decodes");

        let mut form = FormSubmission::new("/api/leads/", None);
        let request = form.begin_submit().expect("first submit");
        let outcome = form.finish_submit(request.token, Ok(response));
        assert_eq!(outcome, SubmitOutcome::Rejected { fields: 2 });
        assert_eq!(form.field_errors("phone"), ["Invalid number".to_owned()]);
        assert_eq!(form.field_errors("name").len(), 2);
        assert!(form.error().is_none());

        form.set_field("phone", "+60111");
        assert!(form.field_errors("phone").is_empty());
    }

    #[test]
    fn rejection_without_details_gets_generic_error() {
        let mut form = FormSubmission::new("/api/leads/", None);
        let request = form.begin_submit().expect("first submit");
        form.finish_submit(
            request.token,
            Ok(SubmitResponse {
                success: false,
                errors: Default::default(),
                error: None,
            }),
        );
        assert_eq!(form.error(), Some("the server rejected the submission"));
    }

    #[test]
    fn transport_failure_allows_resubmit() {
        let mut form = FormSubmission::new("/api/leads/", None);
        let request = form.begin_submit().expect("first submit");
        let outcome = form.finish_submit(request.token, Err("cannot reach server".to_owned()));
        assert_eq!(outcome, SubmitOutcome::Failed("cannot reach server".to_owned()));
        assert!(form.begin_submit().is_ok());
    }

    #[test]
    fn set_fields_requires_object() {
        let mut form = FormSubmission::new("/api/leads/", None);
        assert!(form.set_fields(json!([1, 2])).is_err());
        form.set_fields(json!({"brand": "Honda"})).expect("object body");
        assert_eq!(form.field("brand"), Some(&json!("Honda")));
    }
}
