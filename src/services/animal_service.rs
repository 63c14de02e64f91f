//! src/services/animal_service.rs
//!
//! AnimalService — the list/detail/create/edit/delete actions over animal
//! records. Records live in SQLite via [`AnimalRepository`]; photos live in
//! object storage via [`CloudStorage`]. Every record read for display gets a
//! fresh signed URL for its photo.
//!
//! Side effects happen in a fixed order and nothing is rolled back: replacing a
//! photo deletes the old object, uploads the new one, then saves the record.

use crate::{
    models::animal::{Animal, AnimalForm},
    services::{
        animal_repository::{AnimalRepository, PersistenceError},
        cloud_storage_service::{CloudStorage, DEFAULT_SIGNED_URL_MINUTES, StorageError},
    },
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Error)]
pub enum AnimalError {
    #[error("animal {0} not found")]
    NotFound(i64),
    #[error("animal {0} was modified concurrently")]
    ConcurrencyConflict(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type AnimalResult<T> = Result<T, AnimalError>;

/// Result of a create or edit submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The record was persisted.
    Saved(Animal),
    /// Validation failed. The form comes back unchanged for re-display.
    Invalid {
        form: AnimalForm,
        errors: ValidationErrors,
    },
}

#[derive(Clone)]
pub struct AnimalService {
    pub repo: AnimalRepository,
    storage: Arc<dyn CloudStorage>,
    signed_url_ttl_minutes: u32,
    clock: fn() -> DateTime<Utc>,
}

impl AnimalService {
    pub fn new(repo: AnimalRepository, storage: Arc<dyn CloudStorage>) -> Self {
        Self {
            repo,
            storage,
            signed_url_ttl_minutes: DEFAULT_SIGNED_URL_MINUTES,
            clock: Utc::now,
        }
    }

    pub fn with_signed_url_ttl(mut self, minutes: u32) -> Self {
        self.signed_url_ttl_minutes = minutes;
        self
    }

    /// Replace the clock used to name uploaded photos.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// All records, each with a signed photo URL when it has a photo.
    pub async fn list(&self) -> AnimalResult<Vec<Animal>> {
        let mut animals = self.repo.find_all().await?;
        for animal in animals.iter_mut() {
            self.generate_signed_url(animal).await?;
        }
        Ok(animals)
    }

    /// One record for the details view.
    pub async fn get_one(&self, id: i64) -> AnimalResult<Animal> {
        self.find_for_display(id).await
    }

    /// One record for the edit form.
    pub async fn edit(&self, id: i64) -> AnimalResult<Animal> {
        self.find_for_display(id).await
    }

    /// One record for the delete confirmation. Nothing is changed.
    pub async fn delete(&self, id: i64) -> AnimalResult<Animal> {
        self.find_for_display(id).await
    }

    pub async fn create(&self, form: AnimalForm) -> AnimalResult<SubmitOutcome> {
        if let Err(errors) = form.validate() {
            debug!("create rejected: {}", errors);
            return Ok(SubmitOutcome::Invalid { form, errors });
        }

        let mut animal = form.to_animal();
        if let Some(photo) = &form.photo {
            let key = file_name_to_save(&photo.file_name, (self.clock)());
            animal.stored_url = Some(self.storage.upload_file(photo, &key).await?);
            animal.stored_file_key = Some(key);
        }

        let created = self.repo.add(&animal).await?;
        info!("Created animal {} ({})", created.id, created.name);
        Ok(SubmitOutcome::Saved(created))
    }

    /// Save an edit of record `id`. The form must carry the same id.
    pub async fn update(&self, id: i64, form: AnimalForm) -> AnimalResult<SubmitOutcome> {
        if form.id != Some(id) {
            return Err(AnimalError::NotFound(id));
        }

        if let Err(errors) = form.validate() {
            debug!("update of animal {} rejected: {}", id, errors);
            return Ok(SubmitOutcome::Invalid { form, errors });
        }

        let mut animal = form.to_animal();
        if let Some(photo) = &form.photo {
            if let Some(old_key) = animal.photo_key() {
                self.storage.delete_file(old_key).await?;
            }
            let key = file_name_to_save(&photo.file_name, (self.clock)());
            animal.stored_url = Some(self.storage.upload_file(photo, &key).await?);
            animal.stored_file_key = Some(key);
        }

        if let Err(err) = self.repo.update(&animal).await {
            return Err(self.resolve_update_failure(err).await);
        }

        info!("Updated animal {}", animal.id);
        Ok(SubmitOutcome::Saved(animal))
    }

    /// Remove record `id` and its photo. A missing record is not an error.
    pub async fn delete_confirmed(&self, id: i64) -> AnimalResult<()> {
        let Some(mut animal) = self.repo.find_by_id(id).await? else {
            warn!("Delete of missing animal {} skipped", id);
            return Ok(());
        };

        if let Some(key) = animal.photo_key() {
            self.storage.delete_file(key).await?;
            animal.stored_file_key = Some(String::new());
            animal.stored_url = Some(String::new());
        }

        self.repo.remove(&animal).await.map_err(|err| match err {
            PersistenceError::ConcurrencyConflict(id) => AnimalError::ConcurrencyConflict(id),
            PersistenceError::Sqlx(err) => AnimalError::Database(err),
        })?;
        info!("Deleted animal {}", id);
        Ok(())
    }

    /// A conflict on a record that is gone means "not found". Any other
    /// conflict, and any database error, is fatal.
    async fn resolve_update_failure(&self, err: PersistenceError) -> AnimalError {
        match err {
            PersistenceError::ConcurrencyConflict(id) => match self.repo.exists(id).await {
                Ok(false) => AnimalError::NotFound(id),
                Ok(true) => AnimalError::ConcurrencyConflict(id),
                Err(err) => AnimalError::Database(err),
            },
            PersistenceError::Sqlx(err) => AnimalError::Database(err),
        }
    }

    async fn find_for_display(&self, id: i64) -> AnimalResult<Animal> {
        let mut animal = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(AnimalError::NotFound(id))?;
        self.generate_signed_url(&mut animal).await?;
        Ok(animal)
    }

    /// Fill in `signed_url` only when the record has a photo key.
    async fn generate_signed_url(&self, animal: &mut Animal) -> AnimalResult<()> {
        if let Some(key) = animal.photo_key() {
            let url = self
                .storage
                .get_signed_url(key, self.signed_url_ttl_minutes)
                .await?;
            animal.signed_url = Some(url);
        }
        Ok(())
    }
}

/// Object key for an uploaded photo: `<stem>-<yyyyMMddHHmmss UTC><.ext>`.
///
/// Two uploads of the same file name within one second get the same key.
pub fn file_name_to_save(incoming_file_name: &str, now: DateTime<Utc>) -> String {
    let file_name = incoming_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(incoming_file_name);

    let (stem, extension) = match file_name.rfind('.') {
        Some(pos) if pos + 1 == file_name.len() => (&file_name[..pos], ""),
        Some(pos) => file_name.split_at(pos),
        None => (file_name, ""),
    };

    format!("{}-{}{}", stem, now.format("%Y%m%d%H%M%S"), extension)
}
