use std::sync::Arc;

use academy_core::model::{
    EnrollableTarget, Enrollment, EnrollmentId, LessonId, SubjectId,
};
use storage::repository::{CatalogRepository, EnrollmentRepository, UserRepository};
use tracing::{debug, info};

use crate::Clock;
use crate::error::{EnrollmentServiceError, Entity};
use crate::notifier::WebhookNotifier;

/// Looks up and lazily creates enrollments, one per (subject, target).
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    notifier: WebhookNotifier,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        notifier: WebhookNotifier,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
            enrollments,
            notifier,
        }
    }

    /// Return the subject's enrollment in `target`, creating it on first access.
    ///
    /// An existing enrollment is returned unchanged. The boolean is `true` only
    /// for the call that created the record; that call also emits the
    /// enrollment-created webhook.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` when the subject or target
    /// does not exist.
    /// Returns `EnrollmentServiceError::Storage` if persistence fails.
    pub async fn get_or_create(
        &self,
        subject: SubjectId,
        target: EnrollableTarget,
    ) -> Result<(Enrollment, bool), EnrollmentServiceError> {
        if self.users.get_user(subject).await?.is_none() {
            return Err(EnrollmentServiceError::NotFound(
                Entity::User,
                subject.to_string(),
            ));
        }
        self.ensure_target(target).await?;

        let (enrollment, created) = self
            .enrollments
            .get_or_create(subject, target, self.clock.now())
            .await?;

        if created {
            info!(
                enrollment_id = %enrollment.id(),
                subject_id = %subject,
                %target,
                "enrollment created"
            );
            self.notifier.enrollment_created(&enrollment);
        } else {
            debug!(enrollment_id = %enrollment.id(), "enrollment already exists");
        }
        Ok((enrollment, created))
    }

    /// Remember the lesson the subject last opened. Progress is not touched.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` for unknown lessons or
    /// enrollments.
    pub async fn record_lesson_access(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<(), EnrollmentServiceError> {
        if self.catalog.get_lesson(lesson_id).await?.is_none() {
            return Err(EnrollmentServiceError::NotFound(
                Entity::Lesson,
                lesson_id.to_string(),
            ));
        }
        self.enrollments
            .set_last_accessed(enrollment_id, lesson_id)
            .await
            .map_err(|e| not_found_as(e, Entity::Enrollment, enrollment_id))
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` for unknown ids.
    pub async fn enrollment(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        self.enrollments
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| {
                EnrollmentServiceError::NotFound(Entity::Enrollment, enrollment_id.to_string())
            })
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn enrollments_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<Enrollment>, EnrollmentServiceError> {
        Ok(self.enrollments.enrollments_for_subject(subject).await?)
    }

    async fn ensure_target(&self, target: EnrollableTarget) -> Result<(), EnrollmentServiceError> {
        let exists = match target {
            EnrollableTarget::Course(id) => self.catalog.get_course(id).await?.is_some(),
            EnrollableTarget::LearningPath(id) => {
                self.catalog.get_learning_path(id).await?.is_some()
            }
        };
        if exists {
            Ok(())
        } else {
            let entity = match target {
                EnrollableTarget::Course(_) => Entity::Course,
                EnrollableTarget::LearningPath(_) => Entity::LearningPath,
            };
            Err(EnrollmentServiceError::NotFound(
                entity,
                target.raw_id().to_string(),
            ))
        }
    }
}

fn not_found_as(
    err: storage::repository::StorageError,
    entity: Entity,
    id: impl ToString,
) -> EnrollmentServiceError {
    match err {
        storage::repository::StorageError::NotFound => {
            EnrollmentServiceError::NotFound(entity, id.to_string())
        }
        other => EnrollmentServiceError::Storage(other),
    }
}
