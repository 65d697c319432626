//! From a draft fixture to a created order, with the backend mocked.

use std::path::PathBuf;

use rusty_money::{
    Money,
    iso::{Currency, VND},
};
use testresult::TestResult;

use orderly::{
    api::{ApiError, MockCheckoutApi, MockOrdersApi},
    assembler::{OrderSubmitter, SubmitError},
    draft::DraftOrder,
    fixtures::DraftFixture,
    fulfillment::OrderStatus,
    loyalty::LoyaltyRates,
    orders::{Order, OrderId},
    summary::{CheckoutService, SummarySource, for_draft},
};

fn vnd(minor: i64) -> Money<'static, Currency> {
    Money::from_minor(minor, VND)
}

fn rates() -> Result<LoyaltyRates<'static>, orderly::loyalty::LoyaltyError> {
    LoyaltyRates::new(vnd(100_000), 10)
}

fn load(name: &str) -> Result<DraftOrder<'static>, Box<dyn std::error::Error>> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/drafts")
        .join(format!("{name}.yaml"));

    Ok(DraftFixture::load(path)?.into_draft()?.finish()?)
}

#[tokio::test]
async fn server_summary_is_preferred() -> TestResult {
    let draft = load("stacked_discounts")?;
    let mut server = for_draft(&draft, &rates()?)?;
    server.shipping_fee = Some(vnd(25_000));
    server.grand_total = vnd(915_000);

    let mut api = MockCheckoutApi::new();

    api.expect_checkout_summary()
        .once()
        .withf(|request| {
            request.voucher_code.as_deref() == Some("SALE10")
                && request.points_used == 3
                && request.line_items.len() == 2
        })
        .return_once(move |_| Ok(server));

    let quote = CheckoutService::new(api, rates()?).summarize(&draft).await?;

    assert_eq!(quote.source, SummarySource::Server);
    assert_eq!(quote.summary.grand_total, vnd(915_000));

    Ok(())
}

#[tokio::test]
async fn local_summary_is_used_when_server_is_down() -> TestResult {
    let draft = load("stacked_discounts")?;

    let mut api = MockCheckoutApi::new();

    api.expect_checkout_summary().once().return_once(|_| {
        Err(ApiError::Status {
            status: 503,
            body: "maintenance".to_string(),
        })
    });

    let quote = CheckoutService::new(api, rates()?).summarize(&draft).await?;

    assert_eq!(quote.source, SummarySource::Local);
    assert_eq!(quote.summary.grand_total, vnd(890_000));

    Ok(())
}

#[tokio::test]
async fn submission_carries_the_summary() -> TestResult {
    let draft = load("stacked_discounts")?;
    let summary = for_draft(&draft, &rates()?)?;

    let mut api = MockOrdersApi::new();

    api.expect_create_order()
        .once()
        .withf(|request| {
            request.customer_id.as_deref() == Some("c-1")
                && request.customer_name == "Nguyen Van A"
                && request.grand_total == 890_000
                && request.voucher_discount == 80_000
                && request.points_discount == 30_000
                && request.points_used == 3
                && request.line_items.iter().map(|line| line.unit_price).sum::<i64>() == 1_000_000
        })
        .return_once(|_| Ok(Order::new(OrderId::new("o-1"), OrderStatus::Pending)));

    let submitter = OrderSubmitter::new(api);
    let order = submitter.submit(&draft, &summary).await?;

    assert_eq!(order.id.as_str(), "o-1");
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(!submitter.is_in_flight(draft.id()), "claim must be released");

    Ok(())
}

#[tokio::test]
async fn incomplete_draft_is_never_sent() -> TestResult {
    let draft = load("unpriced")?;
    let summary = for_draft(&draft, &rates()?)?;

    let mut api = MockOrdersApi::new();

    api.expect_create_order().never();

    let result = OrderSubmitter::new(api).submit(&draft, &summary).await;

    assert!(
        matches!(
            &result,
            Err(SubmitError::Validation(error))
                if error.to_string().starts_with("missing required fields")
        ),
        "unexpected result: {result:?}"
    );

    Ok(())
}
