//! Product card with resolved catalogue names.

use model::dto::ProductFullInfoDto;
use model::{Category, Producer, Product, Supplier};
use repository::UnitOfWork;
use tracing::instrument;

use crate::ServiceError;
use crate::crud::not_found;

pub struct ProductsService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> ProductsService<'a> {
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Product with its category, producer and supplier names and its
    /// discounted unit price.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] when the product or one of its parents is missing.
    #[instrument(skip(self))]
    pub async fn get_full_info(&self, article: &str) -> Result<ProductFullInfoDto, ServiceError> {
        let product = self
            .uow
            .products()
            .get_by_key(&article.to_string())
            .await?
            .ok_or_else(|| not_found::<Product>(article))?;
        let category = self
            .uow
            .categories()
            .get_by_key(&product.category_id)
            .await?
            .ok_or_else(|| not_found::<Category>(product.category_id))?;
        let producer = self
            .uow
            .producers()
            .get_by_key(&product.producer_id)
            .await?
            .ok_or_else(|| not_found::<Producer>(product.producer_id))?;
        let supplier = self
            .uow
            .suppliers()
            .get_by_key(&product.supplier_id)
            .await?
            .ok_or_else(|| not_found::<Supplier>(product.supplier_id))?;

        Ok(ProductFullInfoDto {
            discounted_price: product.discounted_price(),
            product: product.into(),
            category_name: category.name,
            producer_name: producer.name,
            supplier_name: supplier.name,
        })
    }
}
