use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use lambda_http::{run, service_fn, tracing, Error, Request};
use manhwa_shared::dynamo::{DynamoProfileStore, DynamoSeriesStore};
use manhwa_shared::objects::S3ObjectStore;
use manhwa_shared::AppState;
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Initialize AWS clients once at startup
    let config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&config);
    let s3_client = S3Client::new(&config);

    let state = AppState::new(
        DynamoSeriesStore::new(dynamo_client.clone()),
        DynamoProfileStore::new(dynamo_client),
        S3ObjectStore::new(s3_client),
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
