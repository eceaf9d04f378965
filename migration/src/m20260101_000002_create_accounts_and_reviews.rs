use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TYPE replyflow.plan_state AS ENUM ('trial', 'active', 'inactive');",
        )
        .await?;

        db.execute_unprepared("CREATE TYPE replyflow.review_status AS ENUM ('pending', 'posted');")
            .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS replyflow.business_accounts (
                id VARCHAR(255) PRIMARY KEY,
                email VARCHAR(255) NOT NULL,
                plan replyflow.plan_state NOT NULL DEFAULT 'trial',
                subscription_id VARCHAR(255),
                google_tokens TEXT,
                tone JSONB,
                account_ref VARCHAR(255),
                location_id VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS business_accounts_subscription_id_idx \
             ON replyflow.business_accounts (subscription_id);",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS replyflow.reviews (
                business_id VARCHAR(255) NOT NULL
                    REFERENCES replyflow.business_accounts(id) ON DELETE CASCADE,
                review_id VARCHAR(255) NOT NULL,
                review_text TEXT NOT NULL DEFAULT '',
                rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5),
                sentiment_score DOUBLE PRECISION NOT NULL DEFAULT 0
                    CHECK (sentiment_score BETWEEN -1 AND 1),
                generated_reply TEXT,
                posted BOOLEAN NOT NULL DEFAULT FALSE,
                posted_status replyflow.review_status NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                posted_at TIMESTAMP WITH TIME ZONE,
                last_error TEXT,
                PRIMARY KEY (business_id, review_id)
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS reviews_posted_status_idx \
             ON replyflow.reviews (posted_status);",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS reviews_business_created_at_idx \
             ON replyflow.reviews (business_id, created_at DESC);",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS replyflow.reviews;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS replyflow.business_accounts;")
            .await?;
        db.execute_unprepared("DROP TYPE IF EXISTS replyflow.review_status;")
            .await?;
        db.execute_unprepared("DROP TYPE IF EXISTS replyflow.plan_state;")
            .await?;

        Ok(())
    }
}
