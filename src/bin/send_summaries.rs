use domain::error::Error;
use domain::job::JobResponse;
use domain::summary::{self, SummaryContext};
use service::{config::Config, logging::Logger};

async fn send(config: &Config) -> Result<JobResponse, Error> {
    let store = replyflow::db_store(config).await?;
    let mailer = replyflow::mailer(config)?;
    let dashboard_url = replyflow::dashboard_url(config);

    Ok(summary::handle(SummaryContext {
        accounts: &store,
        reviews: &store,
        mailer: &mailer,
        dashboard_url: &dashboard_url,
    })
    .await)
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    let response = send(&config)
        .await
        .unwrap_or_else(|e| JobResponse::error(&e));

    replyflow::finish("send_summaries", response);
}
