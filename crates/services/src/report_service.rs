use std::sync::Arc;

use academy_core::model::{Course, CourseId, EnrollableTarget, Enrollment, Percentage, User, UserId};
use chrono::{DateTime, Utc};
use storage::repository::{CatalogRepository, EnrollmentRepository, UserRepository};
use tracing::{debug, warn};

use crate::error::{Entity, ReportServiceError};

/// One enrollment line of a course roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub student_id: UserId,
    pub name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
    pub progress: Percentage,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRoster {
    pub course: Course,
    pub rows: Vec<RosterRow>,
}

/// How one student is doing in one course.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentCourseReport {
    pub student_name: String,
    pub course_title: String,
    pub enrolled_at: DateTime<Utc>,
    pub progress: Percentage,
    pub status: &'static str,
    pub enrollment: Enrollment,
}

/// Course-level reports for admins and supervisors. Rendering to files is
/// left to callers.
#[derive(Clone)]
pub struct ReportService {
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl ReportService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            users,
            catalog,
            enrollments,
        }
    }

    /// Every enrollment in `course_id`, in enrollment order.
    ///
    /// # Errors
    ///
    /// Returns `ReportServiceError::Forbidden` unless the viewer may see course
    /// reports, and `NotFound` for unknown viewers or courses.
    pub async fn course_roster(
        &self,
        viewer: UserId,
        course_id: CourseId,
    ) -> Result<CourseRoster, ReportServiceError> {
        self.authorize(viewer).await?;
        let course = self.course(course_id).await?;

        let enrollments = self
            .enrollments
            .enrollments_for_target(EnrollableTarget::Course(course_id))
            .await?;
        let mut rows = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let student_id = enrollment.subject_id();
            let Some(student) = self.users.get_user(student_id).await? else {
                warn!(%course_id, %student_id, "enrolled student no longer exists");
                continue;
            };
            rows.push(RosterRow {
                student_id,
                name: student.display_name().to_owned(),
                email: student.email().to_owned(),
                enrolled_at: enrollment.enrolled_at(),
                progress: enrollment.progress(),
                status: enrollment.status().label(),
            });
        }
        debug!(%course_id, rows = rows.len(), "course roster built");
        Ok(CourseRoster { course, rows })
    }

    /// Performance of `student_id` in `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `ReportServiceError::Forbidden` unless the viewer may see course
    /// reports, `NotFound` for unknown users or courses and `NotEnrolled` when
    /// the student has no enrollment in the course.
    pub async fn student_course_report(
        &self,
        viewer: UserId,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<StudentCourseReport, ReportServiceError> {
        self.authorize(viewer).await?;
        let course = self.course(course_id).await?;
        let student = self.user(student_id).await?;

        let enrollment = self
            .enrollments
            .find_enrollment(student_id, EnrollableTarget::Course(course_id))
            .await?
            .ok_or(ReportServiceError::NotEnrolled {
                student_id,
                course_id,
            })?;

        Ok(StudentCourseReport {
            student_name: student.display_name().to_owned(),
            course_title: course.title().to_owned(),
            enrolled_at: enrollment.enrolled_at(),
            progress: enrollment.progress(),
            status: enrollment.status().label(),
            enrollment,
        })
    }

    async fn authorize(&self, viewer: UserId) -> Result<(), ReportServiceError> {
        if self.user(viewer).await?.can(|c| c.view_course_reports) {
            Ok(())
        } else {
            Err(ReportServiceError::Forbidden(viewer))
        }
    }

    async fn user(&self, id: UserId) -> Result<User, ReportServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| ReportServiceError::NotFound(Entity::User, id.to_string()))
    }

    async fn course(&self, id: CourseId) -> Result<Course, ReportServiceError> {
        self.catalog
            .get_course(id)
            .await?
            .ok_or_else(|| ReportServiceError::NotFound(Entity::Course, id.to_string()))
    }
}
