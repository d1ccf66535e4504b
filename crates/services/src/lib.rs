#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod config;
pub mod contract_service;
pub mod dashboard_service;
pub mod discussion_service;
pub mod enrollment_service;
pub mod error;
pub mod navigator;
pub mod notifier;
pub mod progress_service;
pub mod quiz_service;
pub mod report_service;
pub mod user_service;

#[cfg(test)]
mod test_support;

pub use academy_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, CourseOutline};
pub use config::AppConfig;
pub use contract_service::{ContractReport, ContractService, ProvisionSummary, StudentProgressRow};
pub use dashboard_service::{Dashboard, DashboardService};
pub use discussion_service::{DiscussionService, ThreadWithPosts};
pub use enrollment_service::EnrollmentService;
pub use error::{
    AppServicesError, CatalogServiceError, ContractServiceError, DashboardError,
    DiscussionServiceError, EnrollmentServiceError, Entity, NavigationError,
    ProgressServiceError, QuizServiceError, ReportServiceError, UserServiceError,
};
pub use navigator::{LessonNavigator, LessonView};
pub use notifier::{WebhookConfig, WebhookNotifier};
pub use progress_service::ProgressService;
pub use quiz_service::{AttemptReview, QuizService, QuizSubmission};
pub use report_service::{CourseRoster, ReportService, RosterRow, StudentCourseReport};
pub use user_service::UserService;
