use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS replyflow;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO replyflow, public;")
            .await?;

        // Role that runs every job query
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    IF EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'replyflow') THEN
                        GRANT ALL ON SCHEMA replyflow TO replyflow;
                        ALTER DEFAULT PRIVILEGES IN SCHEMA replyflow GRANT ALL ON TABLES TO replyflow;
                    END IF;
                END $$;
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS replyflow CASCADE;")
            .await?;

        Ok(())
    }
}
