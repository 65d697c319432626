//! Priced item resolution

use std::num::NonZeroU32;

use thiserror::Error;
use tracing::{Span, debug};

use crate::{
    api::{ApiError, CatalogApi},
    catalog::{Variant, VariantId},
    items::LineItem,
};

/// Errors raised while resolving a variant into a line item.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The catalog has no variant with this id.
    #[error("variant {0} not found")]
    VariantNotFound(VariantId),

    /// The catalog service failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Price `quantity` units of `variant` at its current sale price.
pub fn price_variant<'a>(variant: &Variant<'a>, quantity: NonZeroU32) -> LineItem<'a> {
    LineItem::new(
        variant.id.clone(),
        variant.name.clone(),
        quantity,
        variant.sale_price(),
    )
}

/// Turns variant ids into priced line items using the catalog.
#[derive(Debug, Clone)]
pub struct ItemResolver<C> {
    catalog: C,
}

impl<C: CatalogApi> ItemResolver<C> {
    /// Create a resolver over the given catalog.
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Search the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Api`] if the catalog cannot be searched.
    #[tracing::instrument(
        name = "resolver.search",
        skip(self),
        fields(result_count = tracing::field::Empty),
        err
    )]
    pub async fn search(&self, query: &str) -> Result<Vec<Variant<'static>>, ResolveError> {
        let variants = self.catalog.search_variants(query).await?;

        Span::current().record("result_count", variants.len());

        Ok(variants)
    }

    /// Resolve a variant id into a line item at the variant's sale price.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::VariantNotFound`]: the id does not resolve.
    /// - [`ResolveError::Api`]: the catalog failed.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self, id, quantity),
        fields(variant_id = %id, quantity = quantity.get()),
        err
    )]
    pub async fn resolve(
        &self,
        id: &VariantId,
        quantity: NonZeroU32,
    ) -> Result<LineItem<'static>, ResolveError> {
        if id.is_blank() {
            return Err(ResolveError::VariantNotFound(id.clone()));
        }

        let variant = self
            .catalog
            .find_variant(id)
            .await?
            .ok_or_else(|| ResolveError::VariantNotFound(id.clone()))?;

        if !variant.in_stock() {
            debug!(stock = variant.stock, "variant has no stock on hand");
        }

        Ok(price_variant(&variant, quantity))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::VND};
    use testresult::TestResult;

    use crate::api::MockCatalogApi;

    use super::*;

    fn variant(discounted: Option<i64>) -> Variant<'static> {
        Variant {
            id: VariantId::new("v-1"),
            sku: None,
            name: "Linen shirt".to_string(),
            price: Money::from_minor(250_000, VND),
            discounted_price: discounted.map(|minor| Money::from_minor(minor, VND)),
            stock: 3,
        }
    }

    #[test]
    fn priced_item_uses_sale_price() -> TestResult {
        let quantity = NonZeroU32::new(2).ok_or("zero")?;

        let item = price_variant(&variant(Some(200_000)), quantity);

        assert_eq!(item.unit_price(), &Money::from_minor(200_000, VND));
        assert_eq!(item.original_unit_price(), None);
        assert_eq!(item.quantity(), quantity);

        Ok(())
    }

    #[tokio::test]
    async fn resolve_prices_found_variant() -> TestResult {
        let mut catalog = MockCatalogApi::new();

        catalog
            .expect_find_variant()
            .once()
            .withf(|id| id.as_str() == "v-1")
            .return_once(|_| Ok(Some(variant(None))));

        let item = ItemResolver::new(catalog)
            .resolve(&VariantId::new("v-1"), NonZeroU32::MIN)
            .await?;

        assert_eq!(item.unit_price(), &Money::from_minor(250_000, VND));
        assert_eq!(item.name(), "Linen shirt");

        Ok(())
    }

    #[tokio::test]
    async fn resolve_reports_missing_variant() {
        let mut catalog = MockCatalogApi::new();

        catalog.expect_find_variant().once().return_once(|_| Ok(None));

        let result = ItemResolver::new(catalog)
            .resolve(&VariantId::new("gone"), NonZeroU32::MIN)
            .await;

        assert!(matches!(result, Err(ResolveError::VariantNotFound(id)) if id.as_str() == "gone"));
    }

    #[tokio::test]
    async fn blank_id_never_reaches_catalog() {
        let mut catalog = MockCatalogApi::new();

        catalog.expect_find_variant().never();

        let result = ItemResolver::new(catalog)
            .resolve(&VariantId::new(" "), NonZeroU32::MIN)
            .await;

        assert!(matches!(result, Err(ResolveError::VariantNotFound(_))));
    }
}
