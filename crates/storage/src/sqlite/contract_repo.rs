use academy_core::model::{Contract, ContractId, LearningPathId, UserId, ValidatedContract};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{db, get_id, id_i64, ser};
use crate::repository::{ContractRepository, StorageError};

impl SqliteRepository {
    async fn hydrate_contract(&self, row: &SqliteRow) -> Result<Contract, StorageError> {
        let id = get_id(row, "id", ContractId::new)?;
        let id_raw = id_i64("contract_id", id.value())?;

        let students = sqlx::query(
            "SELECT student_id FROM contract_students WHERE contract_id = ?1 ORDER BY student_id",
        )
        .bind(id_raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .iter()
        .map(|r| get_id(r, "student_id", UserId::new))
        .collect::<Result<Vec<_>, _>>()?;

        let paths = sqlx::query(
            "SELECT path_id FROM contract_learning_paths WHERE contract_id = ?1 ORDER BY path_id",
        )
        .bind(id_raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .iter()
        .map(|r| get_id(r, "path_id", LearningPathId::new))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Contract::from_persisted(
            id,
            row.try_get("title").map_err(ser)?,
            get_id(row, "client_id", UserId::new)?,
            students,
            paths,
            row.try_get("starts_at").map_err(ser)?,
            row.try_get("ends_at").map_err(ser)?,
            row.try_get::<i64, _>("is_active").map_err(ser)? != 0,
            row.try_get("created_at").map_err(ser)?,
        ))
    }
}

#[async_trait::async_trait]
impl ContractRepository for SqliteRepository {
    async fn insert_contract(
        &self,
        contract: ValidatedContract,
    ) -> Result<ContractId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let row = sqlx::query(
            r"
            INSERT INTO contracts (title, client_id, starts_at, ends_at, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            RETURNING id
            ",
        )
        .bind(&contract.title)
        .bind(id_i64("client_id", contract.client_id.value())?)
        .bind(contract.starts_at)
        .bind(contract.ends_at)
        .bind(contract.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let id = get_id(&row, "id", ContractId::new)?;
        let id_raw = id_i64("contract_id", id.value())?;

        for student in &contract.student_ids {
            sqlx::query("INSERT INTO contract_students (contract_id, student_id) VALUES (?1, ?2)")
                .bind(id_raw)
                .bind(id_i64("student_id", student.value())?)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }
        for path in &contract.learning_path_ids {
            sqlx::query("INSERT INTO contract_learning_paths (contract_id, path_id) VALUES (?1, ?2)")
                .bind(id_raw)
                .bind(id_i64("path_id", path.value())?)
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(id)
    }

    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, client_id, starts_at, ends_at, is_active, created_at
            FROM contracts WHERE id = ?1
            ",
        )
        .bind(id_i64("contract_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_contract(&row).await?)),
            None => Ok(None),
        }
    }

    async fn contracts_for_client(&self, client: UserId) -> Result<Vec<Contract>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, client_id, starts_at, ends_at, is_active, created_at
            FROM contracts WHERE client_id = ?1
            ORDER BY id
            ",
        )
        .bind(id_i64("client_id", client.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut contracts = Vec::with_capacity(rows.len());
        for row in &rows {
            contracts.push(self.hydrate_contract(row).await?);
        }
        Ok(contracts)
    }

    async fn set_contract_active(
        &self,
        id: ContractId,
        active: bool,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE contracts SET is_active = ?1 WHERE id = ?2")
            .bind(i64::from(active))
            .bind(id_i64("contract_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
