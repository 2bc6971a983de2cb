use async_trait::async_trait;
use deadpool_postgres::{
    Config as PoolSettings, ManagerConfig, Pool, RecyclingMethod, Runtime,
};
use tokio_postgres::NoTls;
use tracing::{debug, info, warn};

use crate::config::PostgresConfig;
use crate::domain::Job;
use crate::indexer::{IndexError, Indexer};

/// PostgreSQL indexer: one autocommitted upsert per job.
pub struct PostgresIndexer {
    pool: Pool,
    table: String,
}

impl PostgresIndexer {
    /// Build the pool, verify connectivity and create the table if absent.
    pub async fn connect(cfg: &PostgresConfig) -> Result<Self, IndexError> {
        let mut settings = PoolSettings::new();
        settings.url = Some(cfg.connection_string.clone());
        settings.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = settings
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(IndexError::PoolCreate)?;

        let indexer = Self {
            pool,
            table: cfg.table_name.clone(),
        };
        indexer.ensure_table().await?;

        info!(table = %indexer.table, "postgres indexer ready");
        Ok(indexer)
    }

    async fn ensure_table(&self) -> Result<(), IndexError> {
        let client = self.pool.get().await?;
        client
            .batch_execute(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    company TEXT,
                    location TEXT,
                    position TEXT,
                    salary TEXT,
                    salary_min BIGINT,
                    salary_max BIGINT,
                    is_negotiable BOOLEAN DEFAULT FALSE,
                    work_type TEXT,
                    industry TEXT[],
                    field TEXT,
                    experience TEXT,
                    experience_tags TEXT[],
                    description TEXT,
                    requirements TEXT,
                    benefits TEXT,
                    source TEXT,
                    source_url TEXT,
                    crawled_at TIMESTAMP WITH TIME ZONE,
                    total_views BIGINT DEFAULT 0,
                    total_resume_applied BIGINT DEFAULT 0,
                    rate_response DOUBLE PRECISION DEFAULT 0,
                    skills TEXT[],
                    qualifications TEXT,
                    company_website TEXT,
                    occupational_category TEXT,
                    employment_type TEXT,
                    location_city TEXT[],
                    location_district TEXT[],
                    expired_at TIMESTAMP WITH TIME ZONE,
                    created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
                )
                "#,
                table = self.table
            ))
            .await?;
        Ok(())
    }

    fn upsert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {table} (
                id, title, company, location, position,
                salary, salary_min, salary_max, is_negotiable, work_type,
                industry, field, experience, experience_tags, description,
                requirements, benefits, source, source_url, crawled_at,
                total_views, total_resume_applied, rate_response, skills,
                qualifications, company_website, occupational_category,
                employment_type, location_city, location_district, expired_at,
                updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31,
                NOW()
            )
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                company = EXCLUDED.company,
                location = EXCLUDED.location,
                position = EXCLUDED.position,
                salary = EXCLUDED.salary,
                salary_min = EXCLUDED.salary_min,
                salary_max = EXCLUDED.salary_max,
                is_negotiable = EXCLUDED.is_negotiable,
                work_type = EXCLUDED.work_type,
                industry = EXCLUDED.industry,
                field = EXCLUDED.field,
                experience = EXCLUDED.experience,
                experience_tags = EXCLUDED.experience_tags,
                description = EXCLUDED.description,
                requirements = EXCLUDED.requirements,
                benefits = EXCLUDED.benefits,
                source = EXCLUDED.source,
                source_url = EXCLUDED.source_url,
                crawled_at = EXCLUDED.crawled_at,
                total_views = EXCLUDED.total_views,
                total_resume_applied = EXCLUDED.total_resume_applied,
                rate_response = EXCLUDED.rate_response,
                skills = EXCLUDED.skills,
                qualifications = EXCLUDED.qualifications,
                company_website = EXCLUDED.company_website,
                occupational_category = EXCLUDED.occupational_category,
                employment_type = EXCLUDED.employment_type,
                location_city = EXCLUDED.location_city,
                location_district = EXCLUDED.location_district,
                expired_at = EXCLUDED.expired_at,
                updated_at = NOW()
            "#,
            table = self.table
        )
    }
}

#[async_trait]
impl Indexer for PostgresIndexer {
    async fn bulk_index(&self, jobs: &[Job]) -> Result<(), IndexError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let client = self.pool.get().await?;
        let stmt = client.prepare(&self.upsert_sql()).await?;

        // Each upsert commits on its own so one bad row cannot poison the
        // rest of the batch.
        let mut indexed = 0usize;
        for job in jobs {
            let result = client
                .execute(
                    &stmt,
                    &[
                        &job.id,
                        &job.title,
                        &job.company,
                        &job.location,
                        &job.position,
                        &job.salary,
                        &job.salary_min,
                        &job.salary_max,
                        &job.is_negotiable,
                        &job.work_type,
                        &job.industry,
                        &job.field,
                        &job.experience,
                        &job.experience_tags,
                        &job.description,
                        &job.requirements,
                        &job.benefits,
                        &job.source,
                        &job.source_url,
                        &job.crawled_at,
                        &job.total_views,
                        &job.total_resume_applied,
                        &job.rate_response,
                        &job.skills,
                        &job.qualifications,
                        &job.company_website,
                        &job.occupational_category,
                        &job.employment_type,
                        &job.location_city,
                        &job.location_district,
                        &job.expired_at,
                    ],
                )
                .await;

            match result {
                Ok(_) => indexed += 1,
                Err(err) => warn!(job_id = %job.id, error = %err, "upsert failed, skipping"),
            }
        }

        debug!(indexed, total = jobs.len(), "postgres bulk upsert finished");
        Ok(())
    }
}
