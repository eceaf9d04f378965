//! Wiring for the job binaries: builds request-scoped clients from
//! [`Config`] and hands the job response back to the scheduler.
//!
//! Every binary prints the JSON body of its [`JobResponse`] to stdout and
//! exits non-zero when the status code is not `2xx`.

use domain::error::{EntityErrorKind, Error, InternalErrorKind};
use domain::gateway::google_business::GoogleBusinessClient;
use domain::gateway::mailersend::MailerSendClient;
use domain::gateway::openai::OpenAiClient;
use domain::job::{JobContext, JobResponse};
use domain::store::DbStore;
use log::*;
use review_ai::ModeratedGenerator;
use review_auth::http::{AuthenticatedClient, AuthenticatedClientBuilder};
use review_auth::oauth::providers::google;
use review_auth::oauth::token::encryption::TokenCipher;
use secrecy::SecretString;
use service::config::Config;

pub type ReplyGenerator = ModeratedGenerator<OpenAiClient, OpenAiClient>;

/// Clients used by the ingestion and reply jobs.
pub struct JobClients {
    pub store: DbStore,
    pub source: GoogleBusinessClient,
    pub generator: ReplyGenerator,
    timeout: std::time::Duration,
}

impl JobClients {
    pub async fn build(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            store: db_store(config).await?,
            source: google_business_client(config)?,
            generator: reply_generator(config)?,
            timeout: config.external_request_timeout(),
        })
    }

    pub fn context(&self) -> JobContext<'_> {
        JobContext {
            accounts: &self.store,
            reviews: &self.store,
            source: &self.source,
            generator: &self.generator,
            call_timeout: self.timeout,
        }
    }
}

pub fn token_cipher(config: &Config) -> Result<TokenCipher, Error> {
    let key = config
        .encryption_key()
        .ok_or_else(|| Error::config("ENCRYPTION_KEY is not set"))?;
    Ok(TokenCipher::new(&key)?)
}

pub async fn db_store(config: &Config) -> Result<DbStore, Error> {
    let cipher = token_cipher(config)?;
    let db = service::init_database(config).await.map_err(|e| {
        Error::internal(InternalErrorKind::Entity(EntityErrorKind::DbTransaction)).with_source(e)
    })?;
    Ok(DbStore::new(db, cipher))
}

fn http_client(config: &Config, bearer: Option<SecretString>) -> Result<AuthenticatedClient, Error> {
    let mut builder = AuthenticatedClientBuilder::new()
        .with_timeout(config.external_request_timeout())
        .with_max_retries(config.http_max_retries);
    if let Some(token) = bearer {
        builder = builder.with_bearer_token(token);
    }
    Ok(builder.build()?)
}

pub fn google_business_client(config: &Config) -> Result<GoogleBusinessClient, Error> {
    let client_id = config
        .google_client_id()
        .ok_or_else(|| Error::config("GOOGLE_CLIENT_ID is not set"))?;
    let client_secret = config
        .google_client_secret()
        .ok_or_else(|| Error::config("GOOGLE_CLIENT_SECRET is not set"))?;

    let oauth = google::Provider::new(
        google::Config {
            client_id,
            client_secret: SecretString::new(client_secret),
            redirect_uri: config.google_redirect_uri().to_string(),
            auth_url: config.google_auth_url().to_string(),
            token_url: config.google_token_url().to_string(),
        },
        http_client(config, None)?,
    );

    Ok(GoogleBusinessClient::new(
        oauth,
        http_client(config, None)?,
        config.google_business_base_url(),
    ))
}

pub fn reply_generator(config: &Config) -> Result<ReplyGenerator, Error> {
    let api_key = config
        .openai_api_key()
        .ok_or_else(|| Error::config("OPENAI_API_KEY is not set"))?;
    let client = OpenAiClient::new(
        http_client(config, Some(SecretString::new(api_key)))?,
        config.openai_base_url(),
        config.openai_model(),
    );
    Ok(ModeratedGenerator::new(client.clone(), client))
}

pub fn mailer(config: &Config) -> Result<MailerSendClient, Error> {
    MailerSendClient::new(config)
}

pub fn dashboard_url(config: &Config) -> String {
    format!("{}/dashboard", config.frontend_base_url().trim_end_matches('/'))
}

/// Prints the response body and exits with a matching status.
pub fn finish(job: &str, response: JobResponse) -> ! {
    println!("{}", response.body);
    if (200..300).contains(&response.status_code) {
        info!("{job} completed");
        std::process::exit(0);
    }
    error!("{job} failed with status {}", response.status_code);
    std::process::exit(1);
}
