use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timecast::cli;
use timecast::{Consumer, Producer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args; a missing or non-positive consumer count exits with usage
    let args = cli::Cli::parse();
    let settings = args.into_settings()?;
    settings.validate()?;

    // Start producer
    let mut producer = match Producer::bind(settings.producer.clone()).await {
        Ok(producer) => producer,
        Err(e) => {
            error!("Unable to start producer: {}", e);
            return Err(e.into());
        }
    };
    producer.start()?;

    // Start consumers; one failing to connect does not stop the others
    let mut consumers = Vec::with_capacity(settings.consumers as usize);
    for i in 1..=settings.consumers {
        let name = format!("Consumer {}", i);
        match Consumer::new(name.clone(), settings.consumer.clone())
            .print_only()
            .connect()
            .await
        {
            Ok(handle) => consumers.push(handle),
            Err(e) => error!("Error connecting to producer ({}): {}", name, e),
        }
    }
    info!(
        "Started producer on {} with {} consumers",
        producer.local_addr(),
        consumers.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    for consumer in &consumers {
        consumer.abort();
    }
    producer.shutdown().await;
    info!("Final stats: {:?}", producer.stats());

    Ok(())
}
