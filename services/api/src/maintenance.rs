use crate::cli::DatabaseArgs;
use crate::infra::{bootstrap, open_store};
use hsearch::error::AppError;
use hsearch::offers::OfferStore;
use tracing::info;

pub(crate) async fn init_schema(args: DatabaseArgs) -> Result<(), AppError> {
    let config = bootstrap(args)?;
    open_store(&config).await?;

    info!(url = %config.database.url, "offer schema initialised");
    println!("Schema ready at {}", config.database.url);
    Ok(())
}

pub(crate) async fn recount_images(args: DatabaseArgs) -> Result<(), AppError> {
    let config = bootstrap(args)?;
    let store = open_store(&config).await?;

    let repaired = store.recount_images().await?;
    println!("Repaired image counters on {repaired} offers");
    Ok(())
}
