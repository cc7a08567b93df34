use actix_web::web;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use diesel::Connection;
use log::info;

use crate::errors::ApiError;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Runs `f` on a pooled connection inside the blocking thread pool.
///
/// Handlers and services never touch the pool directly; every query goes
/// through here so pool and blocking errors map the same way everywhere.
pub async fn run<F, T>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let mut conn = pool.get()?;
    web::block(move || f(&mut *conn)).await?
}

/// Like [`run`], wrapped in a single transaction.
pub async fn run_tx<F, T>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    run(pool, move |conn| conn.transaction(|conn| f(conn))).await
}

pub fn init_pool(database_url: &str) -> Result<DbPool, String> {
    let mut conn = PgConnection::establish(database_url)
        .map_err(|e| format!("Failed to establish connection for migrations: {}", e))?;
    conn.batch_execute(INIT_SQL)
        .map_err(|e| format!("Failed to execute database initialization script: {}", e))?;
    info!("Database initialization complete.");

    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .build(manager)
        .map_err(|e| format!("Failed to create database connection pool: {}", e))
}

// Idempotent bootstrap script, executed on every start.
pub const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS country (
    id SERIAL PRIMARY KEY,
    name VARCHAR(50) UNIQUE NOT NULL,
    phone_code VARCHAR(50) NOT NULL
);

CREATE TABLE IF NOT EXISTS region (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) UNIQUE NOT NULL,
    country_id INTEGER NOT NULL REFERENCES country(id) ON DELETE CASCADE,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS user_account (
    id SERIAL PRIMARY KEY,
    username VARCHAR(150) UNIQUE NOT NULL,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    first_name VARCHAR(150),
    last_name VARCHAR(150),
    phone_number VARCHAR(20),
    staff_number VARCHAR(30) UNIQUE,
    level VARCHAR(50) NOT NULL DEFAULT 'rde',
    is_staff BOOLEAN NOT NULL DEFAULT FALSE,
    is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    attached_region_id INTEGER REFERENCES region(id) ON DELETE SET NULL,
    otp VARCHAR(16),
    otp_used BOOLEAN NOT NULL DEFAULT FALSE,
    otp_issued_at TIMESTAMP,
    otp_attempts INTEGER NOT NULL DEFAULT 0,
    last_login TIMESTAMP,
    date_joined TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS refresh_token (
    token_id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES user_account(id) ON DELETE CASCADE,
    token VARCHAR(255) NOT NULL,
    expires_at TIMESTAMP NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS occupation_category (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS occupation (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    category_id INTEGER REFERENCES occupation_category(id) ON DELETE SET NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS specialization (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    occupation_id INTEGER REFERENCES occupation(id) ON DELETE SET NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS competence (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    competence_type VARCHAR(100) NOT NULL DEFAULT 'work',
    specialization_id INTEGER REFERENCES specialization(id) ON DELETE SET NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS language (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS academic_qualification_type (
    id SERIAL PRIMARY KEY,
    name VARCHAR(500) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS outbreak_type (
    id SERIAL PRIMARY KEY,
    name VARCHAR(500) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS profile (
    id SERIAL PRIMARY KEY,
    first_name VARCHAR(30) NOT NULL,
    middle_name VARCHAR(30) NOT NULL DEFAULT '',
    last_name VARCHAR(30) NOT NULL,
    gender VARCHAR(1) NOT NULL,
    occupation_id INTEGER REFERENCES occupation(id) ON DELETE SET NULL,
    date_of_birth DATE NOT NULL,
    next_of_kin_name VARCHAR(30) NOT NULL,
    next_of_kin_phone VARCHAR(30) NOT NULL,
    email VARCHAR(254),
    phone VARCHAR(20),
    user_id INTEGER UNIQUE REFERENCES user_account(id) ON DELETE SET NULL,
    id_type VARCHAR(100) NOT NULL,
    id_number VARCHAR(255) NOT NULL,
    region_of_residence_id INTEGER REFERENCES region(id) ON DELETE SET NULL,
    cv_path VARCHAR(500),
    active BOOLEAN NOT NULL DEFAULT FALSE,
    available BOOLEAN NOT NULL DEFAULT FALSE,
    note TEXT NOT NULL DEFAULT '',
    application_status VARCHAR(255) NOT NULL DEFAULT 'pending_approval',
    managerial_experience JSONB,
    detailed_experience JSONB,
    reference_contacts JSONB,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
    CONSTRAINT unique_id UNIQUE (id_type, id_number)
);

CREATE TABLE IF NOT EXISTS profile_competence (
    profile_id INTEGER NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    competence_id INTEGER NOT NULL REFERENCES competence(id) ON DELETE CASCADE,
    PRIMARY KEY (profile_id, competence_id)
);

CREATE TABLE IF NOT EXISTS profile_recommendation (
    id SERIAL PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL REFERENCES user_account(id) ON DELETE CASCADE,
    comment TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS profile_academic_qualification (
    id SERIAL PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    qualification_type_id INTEGER REFERENCES academic_qualification_type(id) ON DELETE SET NULL,
    institution VARCHAR(500) NOT NULL,
    field_of_study VARCHAR(500) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS profile_language (
    id SERIAL PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    language_id INTEGER NOT NULL REFERENCES language(id) ON DELETE CASCADE,
    proficiency VARCHAR(255) NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS outbreak (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    description TEXT NOT NULL,
    outbreak_type_id INTEGER REFERENCES outbreak_type(id) ON DELETE SET NULL,
    severity VARCHAR(255) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE,
    general_information JSONB,
    detailed_information JSONB,
    eligibility_criteria JSONB,
    requirements JSONB,
    other_information JSONB,
    report_path VARCHAR(500),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS outbreak_region (
    outbreak_id INTEGER NOT NULL REFERENCES outbreak(id) ON DELETE CASCADE,
    region_id INTEGER NOT NULL REFERENCES region(id) ON DELETE CASCADE,
    PRIMARY KEY (outbreak_id, region_id)
);

CREATE TABLE IF NOT EXISTS outbreak_competence (
    outbreak_id INTEGER NOT NULL REFERENCES outbreak(id) ON DELETE CASCADE,
    competence_id INTEGER NOT NULL REFERENCES competence(id) ON DELETE CASCADE,
    PRIMARY KEY (outbreak_id, competence_id)
);

CREATE TABLE IF NOT EXISTS profile_deployment (
    id SERIAL PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    outbreak_id INTEGER NOT NULL REFERENCES outbreak(id) ON DELETE CASCADE,
    region_id INTEGER NOT NULL REFERENCES region(id) ON DELETE CASCADE,
    start_date DATE NOT NULL,
    end_date DATE,
    status VARCHAR(100) NOT NULL DEFAULT 'initiated',
    accepted_by_user BOOLEAN NOT NULL DEFAULT FALSE,
    rejected_by_user BOOLEAN NOT NULL DEFAULT FALSE,
    report_path VARCHAR(500),
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_profile_region ON profile (region_of_residence_id);
CREATE INDEX IF NOT EXISTS idx_deployment_profile_status ON profile_deployment (profile_id, status);
CREATE UNIQUE INDEX IF NOT EXISTS uq_profile_language ON profile_language (profile_id, language_id);

-- Columns added after the first release
ALTER TABLE user_account ADD COLUMN IF NOT EXISTS otp_issued_at TIMESTAMP;
ALTER TABLE user_account ADD COLUMN IF NOT EXISTS otp_attempts INTEGER NOT NULL DEFAULT 0;

-- EAC partner states
INSERT INTO country (name, phone_code)
VALUES
    ('Burundi', '+257'),
    ('Democratic Republic of the Congo', '+243'),
    ('Kenya', '+254'),
    ('Rwanda', '+250'),
    ('South Sudan', '+211'),
    ('Tanzania', '+255'),
    ('Uganda', '+256')
ON CONFLICT (name) DO NOTHING;
"#;
