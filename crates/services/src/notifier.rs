use std::time::Duration;

use academy_core::model::{DiscussionThread, Enrollment};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Where to deliver outbound webhooks.
///
/// A missing URL disables that event; delivery is then skipped with a warning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub enrollment_created_url: Option<String>,
    pub question_posted_url: Option<String>,
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enrollment_created_url: None,
            question_posted_url: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Body posted when an enrollment is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentCreatedPayload {
    pub enrollment_id: u64,
    pub student_id: u64,
    pub enrollable_id: u64,
    pub enrollable_type: &'static str,
    pub enrollment_date: String,
}

impl EnrollmentCreatedPayload {
    #[must_use]
    pub fn from_enrollment(enrollment: &Enrollment) -> Self {
        let target = enrollment.target();
        Self {
            enrollment_id: enrollment.id().value(),
            student_id: enrollment.subject_id().value(),
            enrollable_id: target.raw_id(),
            enrollable_type: target.kind().as_str(),
            enrollment_date: iso(enrollment.enrolled_at()),
        }
    }
}

/// Body posted when a student opens a discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionPostedPayload {
    pub thread_id: u64,
    pub student_id: u64,
    pub student_name: String,
    pub course_id: u64,
    pub lesson_id: u64,
    pub question_title: String,
    pub question_text: String,
    pub timestamp: String,
}

impl QuestionPostedPayload {
    #[must_use]
    pub fn from_thread(thread: &DiscussionThread, student_name: &str) -> Self {
        Self {
            thread_id: thread.id.value(),
            student_id: thread.author_id.value(),
            student_name: student_name.to_owned(),
            course_id: thread.course_id.value(),
            lesson_id: thread.lesson_id.value(),
            question_title: thread.title.clone(),
            question_text: thread.question.clone(),
            timestamp: iso(thread.created_at),
        }
    }
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fire-and-forget JSON webhook delivery.
///
/// Deliveries run on the current Tokio runtime and never report back to the
/// caller; failures are only logged.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// A notifier with no endpoints configured.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(WebhookConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub fn enrollment_created(&self, enrollment: &Enrollment) {
        let payload = EnrollmentCreatedPayload::from_enrollment(enrollment);
        self.dispatch(
            "enrollment_created",
            self.config.enrollment_created_url.as_deref(),
            &payload,
        );
    }

    pub fn question_posted(&self, thread: &DiscussionThread, student_name: &str) {
        let payload = QuestionPostedPayload::from_thread(thread, student_name);
        self.dispatch(
            "question_posted",
            self.config.question_posted_url.as_deref(),
            &payload,
        );
    }

    fn dispatch<P: Serialize>(&self, event: &'static str, url: Option<&str>, payload: &P) {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            warn!(event, "webhook url not configured, skipping delivery");
            return;
        };
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(err) => {
                error!(event, error = %err, "failed to encode webhook payload");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event, "no async runtime available, dropping webhook");
            return;
        };

        let request = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .json(&body);
        let url = url.to_owned();
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(event, %url, status = %response.status(), "webhook delivered");
                }
                Ok(response) => {
                    warn!(event, %url, status = %response.status(), "webhook rejected");
                }
                Err(err) => {
                    error!(event, %url, error = %err, "webhook delivery failed");
                }
            }
        });
    }
}
