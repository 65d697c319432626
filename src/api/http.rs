//! REST client for the order-management backend.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use rusty_money::{Money, iso::Currency};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    catalog::{Variant, VariantId},
    config::ApiConfig,
    customers::{Customer, CustomerId},
    fulfillment::OrderStatus,
    orders::{Order, OrderId},
    summary::CheckoutSummary,
    vouchers::{Voucher, VoucherApplication},
};

use super::{
    ApiError, CatalogApi, CheckoutApi, CustomersApi, OrdersApi, VouchersApi,
    wire::{
        ApplyVoucherRequest, CheckoutRequest, Envelope, OneOrMany, OrderRequest, StatusUpdate,
        WireCustomer, WireList, WireOrder, WireSummary, WireVariant, WireVoucher,
        WireVoucherApplication,
    },
};

/// HTTP client implementing every backend collaborator.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: Url,
    token: Option<String>,
    http: Client,
    currency: &'static Currency,
}

impl HttpApi {
    /// Create a client from API settings; amounts are read in `currency`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidUrl`]: the base URL cannot be parsed or cannot hold a path.
    /// - [`ApiError::Network`]: the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, currency: &'static Currency) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|error| ApiError::InvalidUrl(format!("{}: {error}", config.api_url)))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }

        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            base_url,
            token: config.api_token.clone().filter(|token| !token.trim().is_empty()),
            http,
            currency,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;

        debug!(%method, %url, "backend request");

        let builder = self.http.request(method, url);

        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send_text(builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let body = Self::send_text(builder).await?;

        decode(&body)
    }

    async fn send_optional<T: DeserializeOwned>(
        builder: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        match Self::send::<T>(builder).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|error| ApiError::Decode(error.to_string()))
}

/// Voucher rejections often come back as 4xx responses carrying the reason in the body.
fn voucher_rejection(status: u16, body: &str) -> Option<WireVoucherApplication> {
    let client_error = StatusCode::from_u16(status).is_ok_and(|status| status.is_client_error());

    if !client_error || status == StatusCode::NOT_FOUND.as_u16() {
        return None;
    }

    decode::<Envelope<WireVoucherApplication>>(body)
        .ok()
        .map(Envelope::into_inner)
}

#[async_trait]
impl CatalogApi for HttpApi {
    #[tracing::instrument(name = "api.catalog.search_variants", skip(self), err)]
    async fn search_variants(&self, query: &str) -> Result<Vec<Variant<'static>>, ApiError> {
        let request = self.request(Method::GET, &["variants"])?.query(&[("search", query)]);

        Self::send::<WireList<WireVariant>>(request)
            .await?
            .into_vec()
            .into_iter()
            .map(|variant| variant.into_variant(self.currency))
            .collect()
    }

    #[tracing::instrument(name = "api.catalog.find_variant", skip(self), fields(variant_id = %id), err)]
    async fn find_variant(&self, id: &VariantId) -> Result<Option<Variant<'static>>, ApiError> {
        let request = self.request(Method::GET, &["variants", id.as_str()])?;

        Self::send_optional::<Envelope<WireVariant>>(request)
            .await?
            .map(|variant| variant.into_inner().into_variant(self.currency))
            .transpose()
    }
}

#[async_trait]
impl CustomersApi for HttpApi {
    #[tracing::instrument(name = "api.customers.find_by_phone", skip(self, phone), err)]
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer<'static>>, ApiError> {
        let request = self.request(Method::GET, &["customers"])?.query(&[("phone", phone)]);

        Self::send_optional::<Envelope<OneOrMany<WireCustomer>>>(request)
            .await?
            .and_then(|found| found.into_inner().into_first())
            .map(|customer| customer.into_customer(self.currency))
            .transpose()
    }
}

#[async_trait]
impl VouchersApi for HttpApi {
    #[tracing::instrument(
        name = "api.vouchers.eligible_vouchers",
        skip(self, order_amount),
        fields(customer_id = %customer),
        err
    )]
    async fn eligible_vouchers(
        &self,
        customer: &CustomerId,
        order_amount: Money<'static, Currency>,
    ) -> Result<Vec<Voucher<'static>>, ApiError> {
        let request = self.request(Method::GET, &["vouchers", "eligible"])?.query(&[
            ("customerId", customer.to_string()),
            ("orderAmount", order_amount.to_minor_units().to_string()),
        ]);

        Self::send::<WireList<WireVoucher>>(request)
            .await?
            .into_vec()
            .into_iter()
            .map(|voucher| voucher.into_voucher(self.currency))
            .collect()
    }

    #[tracing::instrument(
        name = "api.vouchers.apply_voucher",
        skip(self, order_amount),
        fields(customer_id = %customer),
        err
    )]
    async fn apply_voucher(
        &self,
        customer: &CustomerId,
        code: &str,
        order_amount: Money<'static, Currency>,
    ) -> Result<VoucherApplication<'static>, ApiError> {
        let request = self
            .request(Method::POST, &["vouchers", "apply"])?
            .json(&ApplyVoucherRequest {
                customer_id: customer.as_str(),
                code,
                order_amount: order_amount.to_minor_units(),
            });

        let application = match Self::send::<Envelope<WireVoucherApplication>>(request).await {
            Ok(application) => application.into_inner(),
            Err(ApiError::Status { status, body }) => match voucher_rejection(status, &body) {
                Some(rejection) => rejection,
                None => return Err(ApiError::Status { status, body }),
            },
            Err(error) => return Err(error),
        };

        application.into_application(self.currency)
    }
}

#[async_trait]
impl CheckoutApi for HttpApi {
    #[tracing::instrument(
        name = "api.checkout.checkout_summary",
        skip(self, request),
        fields(line_count = request.line_items.len()),
        err
    )]
    async fn checkout_summary(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSummary<'static>, ApiError> {
        let builder = self
            .request(Method::POST, &["checkout", "summary"])?
            .json(request);

        Self::send::<Envelope<WireSummary>>(builder)
            .await?
            .into_inner()
            .into_summary(self.currency)
    }
}

#[async_trait]
impl OrdersApi for HttpApi {
    #[tracing::instrument(
        name = "api.orders.create_order",
        skip(self, request),
        fields(line_count = request.line_items.len()),
        err
    )]
    async fn create_order(&self, request: &OrderRequest) -> Result<Order<'static>, ApiError> {
        let builder = self.request(Method::POST, &["orders"])?.json(request);

        Self::send::<Envelope<WireOrder>>(builder)
            .await?
            .into_inner()
            .into_order(self.currency)
    }

    #[tracing::instrument(
        name = "api.orders.update_status",
        skip(self, id, status),
        fields(order_id = %id, status = %status),
        err
    )]
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order<'static>, ApiError> {
        let builder = self
            .request(Method::PUT, &["orders", id.as_str(), "status"])?
            .json(&StatusUpdate { status });

        Self::send::<Envelope<WireOrder>>(builder)
            .await?
            .into_inner()
            .into_order(self.currency)
    }

    #[tracing::instrument(name = "api.orders.delete_order", skip(self), fields(order_id = %id), err)]
    async fn delete_order(&self, id: &OrderId) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &["orders", id.as_str()])?;

        Self::send_text(builder).await?;

        Ok(())
    }
}
