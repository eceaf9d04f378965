//! A generator whose replies pass a moderation check before they are returned.

use async_trait::async_trait;

use crate::traits::moderation::Moderator;
use crate::traits::reply::Generator;
use crate::types::reply::Request;
use crate::Error;

pub struct ModeratedGenerator<G, M> {
    generator: G,
    moderator: M,
}

impl<G, M> ModeratedGenerator<G, M>
where
    G: Generator,
    M: Moderator,
{
    pub fn new(generator: G, moderator: M) -> Self {
        Self {
            generator,
            moderator,
        }
    }
}

#[async_trait]
impl<G, M> Generator for ModeratedGenerator<G, M>
where
    G: Generator,
    M: Moderator,
{
    async fn generate_reply(&self, request: &Request) -> Result<String, Error> {
        let reply = self.generator.generate_reply(request).await?;
        let reply = reply.trim();

        if reply.is_empty() {
            return Err(Error::Provider("no reply generated".to_string()));
        }

        if self.moderator.is_flagged(reply).await? {
            return Err(Error::Moderation(
                "generated reply failed moderation check".to_string(),
            ));
        }

        Ok(reply.to_string())
    }

    async fn score_sentiment(&self, text: &str) -> f64 {
        self.generator.score_sentiment(text).await
    }

    fn provider_id(&self) -> &str {
        self.generator.provider_id()
    }
}
