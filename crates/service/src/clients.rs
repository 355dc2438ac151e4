//! Client lookups used by the authentication boundary.

use model::Client;
use model::dto::{ClientAuthDto, ClientFullDto};
use repository::UnitOfWork;
use tracing::{info, instrument, warn};

use crate::ServiceError;
use crate::crud::not_found;
use crate::password::{blocking, verify_password};

/// Login-based lookups over the client table.
pub struct ClientsService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> ClientsService<'a> {
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// # Errors
    /// [`ServiceError::NotFound`] for an unknown login.
    #[instrument(skip(self))]
    pub async fn get_by_login(&self, login: &str) -> Result<ClientAuthDto, ServiceError> {
        self.uow
            .clients()
            .get_by_login(login)
            .await?
            .map(ClientAuthDto::from)
            .ok_or_else(|| not_found::<Client>(login))
    }

    /// Checks a login and password pair against the stored hash.
    ///
    /// # Errors
    /// [`ServiceError::AuthenticationFailed`] for an unknown login or a wrong
    /// password; the two cases are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn get_by_login_and_password(
        &self,
        login: &str,
        password: &str,
    ) -> Result<ClientFullDto, ServiceError> {
        let Some(client) = self.uow.clients().get_by_login(login).await? else {
            warn!("unknown login");
            return Err(ServiceError::AuthenticationFailed);
        };
        let (password, hash) = (password.to_owned(), client.password_hash.clone());
        if !blocking(move || verify_password(&password, &hash)).await? {
            warn!("wrong password");
            return Err(ServiceError::AuthenticationFailed);
        }
        info!(client_id = client.id, "client authenticated");
        Ok(client.into())
    }
}
