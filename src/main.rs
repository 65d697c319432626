//! Orderly CLI

use std::{io, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use orderly::{
    api::http::HttpApi,
    assembler::OrderSubmitter,
    config::{ApiConfig, LoggingConfig, PricingConfig},
    fixtures::DraftFixture,
    fulfillment::{FulfillmentService, OrderStatus},
    logging,
    orders::OrderId,
    resolver::ItemResolver,
    summary::{CheckoutService, SummarySource, for_draft},
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "orderly", about = "Order pricing and fulfillment CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(flatten)]
    pricing: PricingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Price a draft fixture offline and print its checkout summary
    Quote(QuoteArgs),

    /// Search the backend catalog
    Search(SearchArgs),

    /// Price a draft fixture with the backend and submit it as an order
    Submit(SubmitArgs),

    /// Move an order to another fulfillment status
    Status(StatusArgs),

    /// Delete a cancelled order
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
struct QuoteArgs {
    /// YAML draft fixture
    fixture: PathBuf,
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Text to search variants for
    query: String,

    #[command(flatten)]
    api: ApiConfig,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// YAML draft fixture
    fixture: PathBuf,

    #[command(flatten)]
    api: ApiConfig,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Order id
    order_id: String,

    /// Status the order is currently in
    #[arg(long)]
    from: OrderStatus,

    /// Status to move the order to
    #[arg(long)]
    to: OrderStatus,

    #[command(flatten)]
    api: ApiConfig,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    /// Order id
    order_id: String,

    /// Status the order is currently in
    #[arg(long)]
    status: OrderStatus,

    #[command(flatten)]
    api: ApiConfig,
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(error) = logging::init_subscriber(&cli.logging) {
        eprintln!("failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Quote(args) => quote(&cli.pricing, args),
        Commands::Search(args) => search(&cli.pricing, args).await,
        Commands::Submit(args) => submit(&cli.pricing, args).await,
        Commands::Status(args) => change_status(&cli.pricing, args).await,
        Commands::Delete(args) => delete(&cli.pricing, args).await,
    }
}

fn connect(pricing: &PricingConfig, api: &ApiConfig) -> Result<HttpApi, String> {
    let currency = pricing.currency().map_err(|error| error.to_string())?;

    HttpApi::new(api, currency).map_err(|error| format!("invalid backend settings: {error}"))
}

fn quote(pricing: &PricingConfig, args: QuoteArgs) -> Result<(), String> {
    let rates = pricing.loyalty_rates().map_err(|error| error.to_string())?;

    let loaded = DraftFixture::load(&args.fixture)
        .and_then(DraftFixture::into_draft)
        .map_err(|error| format!("failed to load {}: {error}", args.fixture.display()))?;

    if !loaded.unresolved.is_empty() {
        return Err(format!(
            "{} item(s) have no price; use `submit` to price them from the catalog",
            loaded.unresolved.len()
        ));
    }

    let draft = loaded.finish().map_err(|error| error.to_string())?;
    let summary = for_draft(&draft, &rates).map_err(|error| error.to_string())?;

    summary
        .write_to(io::stdout().lock(), &draft)
        .map_err(|error| format!("failed to render summary: {error}"))
}

async fn search(pricing: &PricingConfig, args: SearchArgs) -> Result<(), String> {
    let resolver = ItemResolver::new(connect(pricing, &args.api)?);

    let variants = resolver
        .search(&args.query)
        .await
        .map_err(|error| format!("search failed: {error}"))?;

    for variant in variants {
        println!(
            "{}\t{}\t{}\tstock {}",
            variant.id,
            variant.name,
            variant.sale_price(),
            variant.stock
        );
    }

    Ok(())
}

async fn submit(pricing: &PricingConfig, args: SubmitArgs) -> Result<(), String> {
    let rates = pricing.loyalty_rates().map_err(|error| error.to_string())?;

    let mut loaded = DraftFixture::load(&args.fixture)
        .and_then(DraftFixture::into_draft)
        .map_err(|error| format!("failed to load {}: {error}", args.fixture.display()))?;

    let resolver = ItemResolver::new(connect(pricing, &args.api)?);

    for (variant_id, quantity) in std::mem::take(&mut loaded.unresolved) {
        let item = resolver
            .resolve(&variant_id, quantity)
            .await
            .map_err(|error| format!("failed to price {variant_id}: {error}"))?;

        loaded
            .draft
            .add_item(item)
            .map_err(|error| error.to_string())?;
    }

    let draft = loaded.finish().map_err(|error| error.to_string())?;

    let checkout = CheckoutService::new(connect(pricing, &args.api)?, rates);
    let quote = checkout
        .summarize(&draft)
        .await
        .map_err(|error| format!("failed to summarise draft: {error}"))?;

    if quote.source == SummarySource::Local {
        info!("submitting with a locally computed summary");
    }

    quote
        .summary
        .write_to(io::stdout().lock(), &draft)
        .map_err(|error| format!("failed to render summary: {error}"))?;

    let submitter = OrderSubmitter::new(connect(pricing, &args.api)?);
    let order = submitter
        .submit(&draft, &quote.summary)
        .await
        .map_err(|error| format!("failed to submit order: {error}"))?;

    println!("order_id: {}", order.id);
    println!("status: {}", order.status);

    Ok(())
}

async fn change_status(pricing: &PricingConfig, args: StatusArgs) -> Result<(), String> {
    let service = FulfillmentService::new(connect(pricing, &args.api)?);

    let order = service
        .change_status(&OrderId::new(args.order_id), args.from, args.to)
        .await
        .map_err(|error| format!("failed to change status: {error}"))?;

    println!("order_id: {}", order.id);
    println!("status: {}", order.status);

    Ok(())
}

async fn delete(pricing: &PricingConfig, args: DeleteArgs) -> Result<(), String> {
    let service = FulfillmentService::new(connect(pricing, &args.api)?);
    let id = OrderId::new(args.order_id);

    service
        .delete(&id, args.status)
        .await
        .map_err(|error| format!("failed to delete order: {error}"))?;

    println!("order {id} deleted");

    Ok(())
}
