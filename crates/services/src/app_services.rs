use std::sync::Arc;

use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::contract_service::ContractService;
use crate::dashboard_service::DashboardService;
use crate::discussion_service::DiscussionService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::navigator::LessonNavigator;
use crate::notifier::{WebhookConfig, WebhookNotifier};
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::report_service::ReportService;
use crate::user_service::UserService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    users: Arc<UserService>,
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
    quizzes: Arc<QuizService>,
    catalog: Arc<CatalogService>,
    navigator: Arc<LessonNavigator>,
    contracts: Arc<ContractService>,
    discussions: Arc<DiscussionService>,
    dashboards: Arc<DashboardService>,
    reports: Arc<ReportService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        webhooks: WebhookConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        info!(%db_url, "sqlite storage ready");
        Ok(Self::from_storage(&storage, clock, webhooks))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock, webhooks: WebhookConfig) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, webhooks)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, webhooks: WebhookConfig) -> Self {
        let notifier = WebhookNotifier::new(webhooks);

        let users = Arc::new(UserService::new(Arc::clone(&storage.users)));
        let enrollments = Arc::new(EnrollmentService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
            notifier.clone(),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
        ));
        let quizzes = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
        ));
        let catalog = Arc::new(CatalogService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
        ));
        let navigator = Arc::new(LessonNavigator::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&enrollments),
        ));
        let contracts = Arc::new(ContractService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.contracts),
            Arc::clone(&storage.enrollments),
            Arc::clone(&enrollments),
        ));
        let discussions = Arc::new(DiscussionService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.discussions),
            notifier,
        ));
        let dashboards = Arc::new(DashboardService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.contracts),
        ));
        let reports = Arc::new(ReportService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
        ));

        Self {
            users,
            enrollments,
            progress,
            quizzes,
            catalog,
            navigator,
            contracts,
            discussions,
            dashboards,
            reports,
        }
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn navigator(&self) -> Arc<LessonNavigator> {
        Arc::clone(&self.navigator)
    }

    #[must_use]
    pub fn contracts(&self) -> Arc<ContractService> {
        Arc::clone(&self.contracts)
    }

    #[must_use]
    pub fn discussions(&self) -> Arc<DiscussionService> {
        Arc::clone(&self.discussions)
    }

    #[must_use]
    pub fn dashboards(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboards)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }
}
