//! Order aggregation: an order with its client, priced lines and totals.

use model::dto::{OrderFullInfoDto, OrderLineDto, OrderProductDto};
use model::pricing::line_totals;
use model::{Client, Order, Product};
use repository::UnitOfWork;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::ServiceError;
use crate::crud::not_found;

pub struct OrdersService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> OrdersService<'a> {
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Loads the order, its client and every line with its product, and
    /// prices each line:
    ///
    /// * `total = amount × price`
    /// * `discounted = amount × price × (1 − discount / 100)`
    ///
    /// Totals are the sums over all lines. An order without lines has zero totals.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] when the order, its client or a line's
    /// product is missing.
    #[instrument(skip(self))]
    pub async fn get_full_info(&self, order_id: i32) -> Result<OrderFullInfoDto, ServiceError> {
        let order = self
            .uow
            .orders()
            .get_by_key(&order_id)
            .await?
            .ok_or_else(|| not_found::<Order>(order_id))?;
        let client = self
            .uow
            .clients()
            .get_by_key(&order.client_id)
            .await?
            .ok_or_else(|| not_found::<Client>(order.client_id))?;
        let lines = self.uow.order_products().get_all_by_order_id(order_id).await?;

        let mut products = Vec::with_capacity(lines.len());
        let mut total_price = Decimal::ZERO;
        let mut total_discounted_price = Decimal::ZERO;
        for line in lines {
            let product = self
                .uow
                .products()
                .get_by_key(&line.product_article)
                .await?
                .ok_or_else(|| not_found::<Product>(&line.product_article))?;
            let totals = line_totals(line.amount, product.price, product.discount);
            total_price += totals.total;
            total_discounted_price += totals.discounted;
            products.push(OrderLineDto {
                product: product.into(),
                amount: line.amount,
                total_price: totals.total,
                discounted_price: totals.discounted,
            });
        }
        debug!(lines = products.len(), %total_price, %total_discounted_price, "order priced");

        Ok(OrderFullInfoDto {
            order: order.into(),
            client_full_name: client.full_name,
            products,
            total_price,
            total_discounted_price,
        })
    }
}

pub struct OrderProductsService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> OrderProductsService<'a> {
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Lines of one order ordered by article; empty for an unknown order.
    #[instrument(skip(self))]
    pub async fn get_all_by_order_id(
        &self,
        order_id: i32,
    ) -> Result<Vec<OrderProductDto>, ServiceError> {
        let lines = self.uow.order_products().get_all_by_order_id(order_id).await?;
        Ok(lines.into_iter().map(OrderProductDto::from).collect())
    }
}
