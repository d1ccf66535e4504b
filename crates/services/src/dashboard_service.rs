use std::sync::Arc;

use academy_core::model::{
    ContractId, CourseId, EnrollableTarget, EnrollmentId, EnrollmentStatus, LearningPathId,
    Percentage, Role, User,
};
use storage::repository::{
    CatalogRepository, ContractRepository, EnrollmentRepository, UserRepository,
};

use crate::Clock;
use crate::error::DashboardError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentEntry {
    pub enrollment_id: EnrollmentId,
    pub target: EnrollableTarget,
    pub title: String,
    pub progress: Percentage,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaughtCourse {
    pub course_id: CourseId,
    pub title: String,
    pub enrollments: usize,
    pub average_progress: Percentage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEntry {
    pub contract_id: ContractId,
    pub title: String,
    pub students: usize,
    pub learning_paths: usize,
    pub in_effect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedPath {
    pub path_id: LearningPathId,
    pub title: String,
    pub courses: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteTotals {
    pub students: usize,
    pub instructors: usize,
    pub courses: usize,
    pub enrollments: u64,
}

/// Role-specific landing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dashboard {
    Student(Vec<EnrollmentEntry>),
    Instructor(Vec<TaughtCourse>),
    ThirdParty(Vec<ContractEntry>),
    Supervisor(Vec<SupervisedPath>),
    Admin(SiteTotals),
}

/// Builds the dashboard for a user's role.
#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    contracts: Arc<dyn ContractRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        contracts: Arc<dyn ContractRepository>,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
            enrollments,
            contracts,
        }
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Storage` if repository access fails.
    pub async fn dashboard_for(&self, user: &User) -> Result<Dashboard, DashboardError> {
        Ok(match user.role() {
            Role::Student => Dashboard::Student(self.student(user).await?),
            Role::Instructor => Dashboard::Instructor(self.instructor(user).await?),
            Role::ThirdParty => Dashboard::ThirdParty(self.third_party(user).await?),
            Role::Supervisor => Dashboard::Supervisor(self.supervisor(user).await?),
            Role::Admin => Dashboard::Admin(self.admin().await?),
        })
    }

    async fn student(&self, user: &User) -> Result<Vec<EnrollmentEntry>, DashboardError> {
        let enrollments = self.enrollments.enrollments_for_subject(user.id()).await?;
        let mut entries = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let target = enrollment.target();
            let title = match target {
                EnrollableTarget::Course(id) => self
                    .catalog
                    .get_course(id)
                    .await?
                    .map(|c| c.title().to_owned()),
                EnrollableTarget::LearningPath(id) => self
                    .catalog
                    .get_learning_path(id)
                    .await?
                    .map(|p| p.title().to_owned()),
            };
            entries.push(EnrollmentEntry {
                enrollment_id: enrollment.id(),
                target,
                title: title.unwrap_or_else(|| format!("{} {}", target.kind(), target.raw_id())),
                progress: enrollment.progress(),
                status: enrollment.status(),
            });
        }
        Ok(entries)
    }

    async fn instructor(&self, user: &User) -> Result<Vec<TaughtCourse>, DashboardError> {
        let courses = self.catalog.courses_by_instructor(user.id()).await?;
        let mut taught = Vec::with_capacity(courses.len());
        for course in courses {
            let enrollments = self
                .enrollments
                .enrollments_for_target(course.id().into())
                .await?;
            taught.push(TaughtCourse {
                course_id: course.id(),
                title: course.title().to_owned(),
                enrollments: enrollments.len(),
                average_progress: Percentage::mean(enrollments.iter().map(|e| e.progress())),
            });
        }
        Ok(taught)
    }

    async fn third_party(&self, user: &User) -> Result<Vec<ContractEntry>, DashboardError> {
        let now = self.clock.now();
        Ok(self
            .contracts
            .contracts_for_client(user.id())
            .await?
            .into_iter()
            .map(|c| ContractEntry {
                contract_id: c.id(),
                title: c.title().to_owned(),
                students: c.student_ids().len(),
                learning_paths: c.learning_path_ids().len(),
                in_effect: c.is_in_effect(now),
            })
            .collect())
    }

    async fn supervisor(&self, user: &User) -> Result<Vec<SupervisedPath>, DashboardError> {
        Ok(self
            .catalog
            .paths_by_supervisor(user.id())
            .await?
            .into_iter()
            .map(|p| SupervisedPath {
                path_id: p.id(),
                title: p.title().to_owned(),
                courses: p.course_ids().len(),
            })
            .collect())
    }

    async fn admin(&self) -> Result<SiteTotals, DashboardError> {
        Ok(SiteTotals {
            students: self.users.users_with_role(Role::Student).await?.len(),
            instructors: self.users.users_with_role(Role::Instructor).await?.len(),
            courses: self.catalog.list_courses().await?.len(),
            enrollments: self.enrollments.count_enrollments().await?,
        })
    }
}
