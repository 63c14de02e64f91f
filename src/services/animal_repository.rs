//! Persistence of animal records in SQLite.
//!
//! Every call commits on its own. `update` and `remove` report a
//! [`PersistenceError::ConcurrencyConflict`] when the targeted row is gone,
//! which the controller resolves into "not found" or a fatal error.

use crate::models::animal::Animal;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("animal {0} was modified or removed concurrently")]
    ConcurrencyConflict(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

const ANIMAL_COLUMNS: &str = "id, name, age, stored_url, stored_file_key";

#[derive(Clone)]
pub struct AnimalRepository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl AnimalRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn find_all(&self) -> sqlx::Result<Vec<Animal>> {
        sqlx::query_as::<_, Animal>(&format!(
            "SELECT {} FROM animals ORDER BY id",
            ANIMAL_COLUMNS
        ))
        .fetch_all(&*self.db)
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> sqlx::Result<Option<Animal>> {
        sqlx::query_as::<_, Animal>(&format!(
            "SELECT {} FROM animals WHERE id = ?",
            ANIMAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await
    }

    pub async fn exists(&self, id: i64) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM animals WHERE id = ?)")
            .bind(id)
            .fetch_one(&*self.db)
            .await
    }

    /// Insert a new record. The id on `animal` is ignored and the stored row,
    /// with its assigned id, is returned.
    pub async fn add(&self, animal: &Animal) -> sqlx::Result<Animal> {
        sqlx::query_as::<_, Animal>(&format!(
            "INSERT INTO animals (name, age, stored_url, stored_file_key)
             VALUES (?, ?, ?, ?)
             RETURNING {}",
            ANIMAL_COLUMNS
        ))
        .bind(&animal.name)
        .bind(animal.age)
        .bind(&animal.stored_url)
        .bind(&animal.stored_file_key)
        .fetch_one(&*self.db)
        .await
    }

    /// Overwrite every persisted field of the record with `animal.id`.
    pub async fn update(&self, animal: &Animal) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE animals SET name = ?, age = ?, stored_url = ?, stored_file_key = ?
             WHERE id = ?",
        )
        .bind(&animal.name)
        .bind(animal.age)
        .bind(&animal.stored_url)
        .bind(&animal.stored_file_key)
        .bind(animal.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::ConcurrencyConflict(animal.id));
        }
        Ok(())
    }

    pub async fn remove(&self, animal: &Animal) -> PersistenceResult<()> {
        let result = sqlx::query("DELETE FROM animals WHERE id = ?")
            .bind(animal.id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::ConcurrencyConflict(animal.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    async fn repository() -> AnimalRepository {
        AnimalRepository::new(Arc::new(memory_pool().await))
    }

    fn leo() -> Animal {
        Animal {
            name: "Leo".into(),
            age: 3,
            stored_url: Some("https://storage.example/leo".into()),
            stored_file_key: Some("leo-20240301100005.jpg".into()),
            ..Animal::default()
        }
    }

    #[tokio::test]
    async fn add_assigns_ids_and_round_trips() {
        let repo = repository().await;
        let first = repo.add(&leo()).await.expect("insert");
        let second = repo
            .add(&Animal {
                name: "Nala".into(),
                age: 2,
                ..Animal::default()
            })
            .await
            .expect("insert");

        assert!(first.id > 0);
        assert_ne!(first.id, second.id);
        assert_eq!(first.stored_file_key.as_deref(), Some("leo-20240301100005.jpg"));
        assert_eq!(second.stored_file_key, None);

        let found = repo.find_by_id(first.id).await.expect("query");
        assert_eq!(found, Some(first.clone()));

        let all = repo.find_all().await.expect("query");
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|a| a.signed_url.is_none()));
    }

    #[tokio::test]
    async fn missing_rows_are_none() {
        let repo = repository().await;
        assert_eq!(repo.find_by_id(42).await.expect("query"), None);
        assert!(!repo.exists(42).await.expect("query"));
    }

    #[tokio::test]
    async fn update_overwrites_fields() {
        let repo = repository().await;
        let mut animal = repo.add(&leo()).await.expect("insert");

        animal.age = 4;
        animal.stored_file_key = Some("leo-20250101000000.png".into());
        repo.update(&animal).await.expect("update");

        let stored = repo.find_by_id(animal.id).await.expect("query");
        assert_eq!(stored, Some(animal));
    }

    #[tokio::test]
    async fn update_of_vanished_row_is_a_conflict() {
        let repo = repository().await;
        let ghost = Animal {
            id: 99,
            ..leo()
        };
        let err = repo.update(&ghost).await.unwrap_err();
        assert!(matches!(err, PersistenceError::ConcurrencyConflict(99)));
    }

    #[tokio::test]
    async fn remove_deletes_row() {
        let repo = repository().await;
        let animal = repo.add(&leo()).await.expect("insert");

        repo.remove(&animal).await.expect("remove");
        assert!(!repo.exists(animal.id).await.expect("query"));

        let err = repo.remove(&animal).await.unwrap_err();
        assert!(matches!(err, PersistenceError::ConcurrencyConflict(_)));
    }
}
