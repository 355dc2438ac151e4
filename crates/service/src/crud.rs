//! Generic CRUD operations over any [`Resource`].

use std::fmt::Display;
use std::marker::PhantomData;

use model::Entity;
use repository::{Repository, RepositoryError, UnitOfWork};
use tracing::{debug, instrument};

use crate::ServiceError;
use crate::password::blocking;
use crate::resource::Resource;

/// `NotFound` naming the entity kind and key.
pub(crate) fn not_found<E: Entity>(key: impl Display) -> ServiceError {
    ServiceError::NotFound(format!("{} {key}", E::KIND))
}

/// Commits the unit of work; zero affected rows is a failure.
pub(crate) async fn commit(uow: &dyn UnitOfWork) -> Result<u64, ServiceError> {
    match uow.save_changes().await {
        Ok(0) => Err(ServiceError::SaveFailed("no rows were affected".into())),
        Ok(rows) => {
            debug!(rows, "changes saved");
            Ok(rows)
        }
        Err(RepositoryError::Conflict(msg) | RepositoryError::Constraint(msg)) => {
            Err(ServiceError::SaveFailed(msg))
        }
        Err(err) => Err(err.into()),
    }
}

/// CRUD service for one resource on top of a request-scoped [`UnitOfWork`].
///
/// Every mutating call commits exactly once.
pub struct CrudService<'a, R: Resource> {
    uow: &'a dyn UnitOfWork,
    _resource: PhantomData<fn() -> R>,
}

impl<'a, R: Resource> CrudService<'a, R> {
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self {
            uow,
            _resource: PhantomData,
        }
    }

    fn repo(&self) -> &'a dyn Repository<R::Entity> {
        R::repository(self.uow)
    }

    async fn build(dto: R::CreateDto) -> Result<R::Entity, ServiceError> {
        if R::CPU_BOUND_MAPPERS {
            blocking(move || R::from_create(dto)).await?
        } else {
            R::from_create(dto)
        }
    }

    async fn patch(mut entity: R::Entity, dto: R::UpdateDto) -> Result<R::Entity, ServiceError> {
        if R::CPU_BOUND_MAPPERS {
            blocking(move || R::apply_update(&mut entity, dto).map(|()| entity)).await?
        } else {
            R::apply_update(&mut entity, dto)?;
            Ok(entity)
        }
    }

    /// Lists every row in key order. An empty table yields an empty list.
    #[instrument(skip(self), fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn get_all(&self) -> Result<Vec<R::FullDto>, ServiceError> {
        let rows = self.repo().get_all().await?;
        Ok(rows.into_iter().map(R::to_full).collect())
    }

    /// One page of the listing. Invalid page arguments yield an empty list.
    #[instrument(skip(self), fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn get_all_paged(
        &self,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<R::FullDto>, ServiceError> {
        let rows = self
            .repo()
            .get_all_paged(page, page_size)
            .await?
            .unwrap_or_default();
        Ok(rows.into_iter().map(R::to_full).collect())
    }

    /// # Errors
    /// [`ServiceError::NotFound`] when no row has the key.
    #[instrument(skip(self), fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn get_by_key(
        &self,
        key: &<R::Entity as Entity>::Key,
    ) -> Result<R::FullDto, ServiceError> {
        self.repo()
            .get_by_key(key)
            .await?
            .map(R::to_full)
            .ok_or_else(|| not_found::<R::Entity>(key))
    }

    /// Validates, inserts and commits a new row.
    ///
    /// # Errors
    /// * [`ServiceError::Validation`] for a malformed payload.
    /// * [`ServiceError::CreationFailed`] when the insert is rejected, e.g. a
    ///   duplicate key or a missing parent row.
    /// * [`ServiceError::SaveFailed`] when the commit affects no rows.
    #[instrument(skip_all, fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn add(&self, dto: R::CreateDto) -> Result<R::FullDto, ServiceError> {
        let entity = Self::build(dto).await?;
        let created = match self.repo().add(entity).await {
            Ok(Some(created)) => created,
            Ok(None) => {
                return Err(ServiceError::CreationFailed(
                    <R::Entity as Entity>::KIND.to_string(),
                ));
            }
            Err(RepositoryError::Conflict(msg) | RepositoryError::Constraint(msg)) => {
                return Err(ServiceError::CreationFailed(msg));
            }
            Err(err) => return Err(err.into()),
        };
        commit(self.uow).await?;
        Ok(R::to_full(created))
    }

    /// Loads the row, applies the payload onto it and commits.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] when no row has the key,
    /// [`ServiceError::SaveFailed`] when the write is rejected or affects no rows.
    #[instrument(skip(self, dto), fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn update(
        &self,
        key: &<R::Entity as Entity>::Key,
        dto: R::UpdateDto,
    ) -> Result<bool, ServiceError> {
        let entity = self
            .repo()
            .get_by_key(key)
            .await?
            .ok_or_else(|| not_found::<R::Entity>(key))?;
        let entity = Self::patch(entity, dto).await?;
        match self.repo().update(&entity).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(not_found::<R::Entity>(key)),
            Err(RepositoryError::Conflict(msg) | RepositoryError::Constraint(msg)) => {
                return Err(ServiceError::SaveFailed(msg));
            }
            Err(err) => return Err(err.into()),
        }
        commit(self.uow).await?;
        Ok(true)
    }

    /// Deletes the row and commits.
    ///
    /// # Errors
    /// [`ServiceError::DeletionFailed`] when no row has the key or other rows
    /// still reference it.
    #[instrument(skip(self), fields(kind = <R::Entity as Entity>::KIND))]
    pub async fn delete(&self, key: &<R::Entity as Entity>::Key) -> Result<bool, ServiceError> {
        match self.repo().delete(key).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(ServiceError::DeletionFailed(format!(
                    "{} {key}",
                    <R::Entity as Entity>::KIND
                )));
            }
            Err(RepositoryError::Constraint(msg)) => {
                return Err(ServiceError::DeletionFailed(msg));
            }
            Err(err) => return Err(err.into()),
        }
        commit(self.uow).await?;
        Ok(true)
    }
}
