use std::sync::Arc;

use academy_core::model::{
    Contract, ContractDraft, ContractId, Percentage, Role, User, UserId,
};
use storage::repository::{
    CatalogRepository, ContractRepository, EnrollmentRepository, StorageError, UserRepository,
};
use tracing::{info, warn};

use crate::Clock;
use crate::enrollment_service::EnrollmentService;
use crate::error::{ContractServiceError, Entity};

/// Counts from provisioning one contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub created: usize,
    pub existing: usize,
}

/// One student line of a contract report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProgressRow {
    pub student_id: UserId,
    pub name: String,
    pub email: String,
    pub progress: Percentage,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractReport {
    pub contract: Contract,
    pub rows: Vec<StudentProgressRow>,
}

/// Client contracts: who gets enrolled in which learning paths, and how they do.
#[derive(Clone)]
pub struct ContractService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    contracts: Arc<dyn ContractRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    directory: Arc<EnrollmentService>,
}

impl ContractService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        contracts: Arc<dyn ContractRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        directory: Arc<EnrollmentService>,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
            contracts,
            enrollments,
            directory,
        }
    }

    /// Record a contract between a third-party client and a set of students.
    ///
    /// # Errors
    ///
    /// Returns `ContractServiceError::Forbidden` unless the actor manages users,
    /// `NotAClient`/`NotAStudent` for users with the wrong role, `NotFound` for
    /// unknown users or paths and `Contract` for invalid drafts.
    pub async fn create_contract(
        &self,
        actor: UserId,
        draft: ContractDraft,
    ) -> Result<Contract, ContractServiceError> {
        let admin = self.user(actor).await?;
        if !admin.can(|c| c.manage_users) {
            return Err(ContractServiceError::Forbidden(actor));
        }

        if self.user(draft.client_id).await?.role() != Role::ThirdParty {
            return Err(ContractServiceError::NotAClient(draft.client_id));
        }
        for &student_id in &draft.student_ids {
            if self.user(student_id).await?.role() != Role::Student {
                return Err(ContractServiceError::NotAStudent(student_id));
            }
        }
        for &path_id in &draft.learning_path_ids {
            if self.catalog.get_learning_path(path_id).await?.is_none() {
                return Err(ContractServiceError::NotFound(
                    Entity::LearningPath,
                    path_id.to_string(),
                ));
            }
        }

        let validated = draft.validate(self.clock.now())?;
        let id = self.contracts.insert_contract(validated.clone()).await?;
        let contract = validated.assign_id(id);
        info!(
            contract_id = %id,
            client_id = %contract.client_id(),
            students = contract.student_ids().len(),
            paths = contract.learning_path_ids().len(),
            "contract created"
        );
        Ok(contract)
    }

    /// Enroll every contract student in every contract learning path.
    ///
    /// Existing enrollments are left as they are and counted separately.
    ///
    /// # Errors
    ///
    /// Returns `ContractServiceError::NotInEffect` for inactive or expired
    /// contracts.
    pub async fn provision(
        &self,
        contract_id: ContractId,
    ) -> Result<ProvisionSummary, ContractServiceError> {
        let contract = self.contract(contract_id).await?;
        if !contract.is_in_effect(self.clock.now()) {
            warn!(%contract_id, "refusing to provision a contract that is not in effect");
            return Err(ContractServiceError::NotInEffect(contract_id));
        }

        let mut summary = ProvisionSummary::default();
        for &student_id in contract.student_ids() {
            for &path_id in contract.learning_path_ids() {
                let (_, created) = self
                    .directory
                    .get_or_create(student_id, path_id.into())
                    .await?;
                if created {
                    summary.created += 1;
                } else {
                    summary.existing += 1;
                }
            }
        }
        info!(
            %contract_id,
            created = summary.created,
            existing = summary.existing,
            "contract provisioned"
        );
        Ok(summary)
    }

    /// Average progress of each contract student across all their enrollments.
    ///
    /// # Errors
    ///
    /// Returns `ContractServiceError::Forbidden` unless the viewer may see all
    /// reports or is the contract's client.
    pub async fn progress_report(
        &self,
        viewer: UserId,
        contract_id: ContractId,
    ) -> Result<ContractReport, ContractServiceError> {
        let user = self.user(viewer).await?;
        let contract = self.contract(contract_id).await?;
        if !(user.can(|c| c.view_all_reports) || contract.client_id() == viewer) {
            return Err(ContractServiceError::Forbidden(viewer));
        }

        let mut rows = Vec::with_capacity(contract.student_ids().len());
        for &student_id in contract.student_ids() {
            let Some(student) = self.users.get_user(student_id).await? else {
                warn!(%contract_id, %student_id, "contract student no longer exists");
                continue;
            };
            let enrollments = self.enrollments.enrollments_for_subject(student_id).await?;
            let progress = Percentage::mean(enrollments.iter().map(|e| e.progress()));
            rows.push(StudentProgressRow {
                student_id,
                name: student.display_name().to_owned(),
                email: student.email().to_owned(),
                progress,
                status: if progress.is_full() {
                    "Completed"
                } else {
                    "In Progress"
                },
            });
        }
        Ok(ContractReport { contract, rows })
    }

    /// # Errors
    ///
    /// Returns `ContractServiceError::Forbidden` unless the actor manages users.
    pub async fn deactivate(
        &self,
        actor: UserId,
        contract_id: ContractId,
    ) -> Result<(), ContractServiceError> {
        if !self.user(actor).await?.can(|c| c.manage_users) {
            return Err(ContractServiceError::Forbidden(actor));
        }
        self.contracts
            .set_contract_active(contract_id, false)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => {
                    ContractServiceError::NotFound(Entity::Contract, contract_id.to_string())
                }
                other => ContractServiceError::Storage(other),
            })?;
        info!(%contract_id, "contract deactivated");
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<User, ContractServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| ContractServiceError::NotFound(Entity::User, id.to_string()))
    }

    async fn contract(&self, id: ContractId) -> Result<Contract, ContractServiceError> {
        self.contracts
            .get_contract(id)
            .await?
            .ok_or_else(|| ContractServiceError::NotFound(Entity::Contract, id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use academy_core::model::{EnrollableTarget, EnrollmentStatus, LearningPathId};
    use academy_core::progress::ProgressUpdate;
    use academy_core::time::fixed_now;
    use chrono::Duration;

    fn draft(client: UserId, students: Vec<UserId>, paths: Vec<LearningPathId>) -> ContractDraft {
        ContractDraft {
            title: "Onboarding".into(),
            client_id: client,
            student_ids: students,
            learning_path_ids: paths,
            starts_at: fixed_now() - Duration::days(1),
            ends_at: fixed_now() + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn provisioning_enrolls_each_student_once() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let path = fx.path("Backend", &[course]).await;
        let second = fx.user("bob", Role::Student).await;
        let service = fx.contract_service();

        let contract = service
            .create_contract(fx.admin, draft(fx.client, vec![fx.student, second], vec![path]))
            .await
            .unwrap();

        let first = service.provision(contract.id()).await.unwrap();
        assert_eq!(first, ProvisionSummary { created: 2, existing: 0 });
        let again = service.provision(contract.id()).await.unwrap();
        assert_eq!(again, ProvisionSummary { created: 0, existing: 2 });

        let enrollments = fx
            .storage
            .enrollments
            .enrollments_for_subject(second)
            .await
            .unwrap();
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].target(), EnrollableTarget::LearningPath(path));
    }

    #[tokio::test]
    async fn roles_are_checked_on_creation() {
        let fx = Fixture::new().await;
        let path = fx.path("Backend", &[]).await;
        let service = fx.contract_service();

        assert!(matches!(
            service
                .create_contract(fx.instructor, draft(fx.client, vec![fx.student], vec![path]))
                .await,
            Err(ContractServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .create_contract(fx.admin, draft(fx.student, vec![fx.student], vec![path]))
                .await,
            Err(ContractServiceError::NotAClient(_))
        ));
        assert!(matches!(
            service
                .create_contract(fx.admin, draft(fx.client, vec![fx.instructor], vec![path]))
                .await,
            Err(ContractServiceError::NotAStudent(_))
        ));
    }

    #[tokio::test]
    async fn inactive_contracts_are_not_provisioned() {
        let fx = Fixture::new().await;
        let path = fx.path("Backend", &[]).await;
        let service = fx.contract_service();
        let contract = service
            .create_contract(fx.admin, draft(fx.client, vec![fx.student], vec![path]))
            .await
            .unwrap();

        service.deactivate(fx.admin, contract.id()).await.unwrap();
        assert!(matches!(
            service.provision(contract.id()).await,
            Err(ContractServiceError::NotInEffect(_))
        ));
    }

    #[tokio::test]
    async fn report_averages_all_enrollments() {
        let fx = Fixture::new().await;
        let course = fx.course("Rust").await;
        let other = fx.course("Go").await;
        let path = fx.path("Backend", &[course]).await;
        let service = fx.contract_service();
        let contract = service
            .create_contract(fx.admin, draft(fx.client, vec![fx.student], vec![path]))
            .await
            .unwrap();

        let rust = fx.enroll(fx.student, course.into()).await;
        fx.enroll(fx.student, other.into()).await;
        fx.storage
            .enrollments
            .update_progress(
                rust.id(),
                ProgressUpdate {
                    progress: Percentage::FULL,
                    status: EnrollmentStatus::Completed,
                },
            )
            .await
            .unwrap();

        let report = service
            .progress_report(fx.client, contract.id())
            .await
            .unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].name, "Ann Student");
        assert_eq!(report.rows[0].progress.to_string(), "50.00");
        assert_eq!(report.rows[0].status, "In Progress");

        assert!(service.progress_report(fx.admin, contract.id()).await.is_ok());
        assert!(matches!(
            service.progress_report(fx.student, contract.id()).await,
            Err(ContractServiceError::Forbidden(_))
        ));
    }
}
