use domain::ingestion;
use domain::job::JobResponse;
use replyflow::JobClients;
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    let response = match JobClients::build(&config).await {
        Ok(clients) => ingestion::handle(clients.context()).await,
        Err(e) => JobResponse::error(&e),
    };

    replyflow::finish("fetch_reviews", response);
}
