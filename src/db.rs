use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::config::Config;

pub async fn connect_pg(cfg: &Config) -> anyhow::Result<PgPool> {
    let mut opts: PgConnectOptions = cfg.database_url.parse()?;
    if cfg.database_ssl {
        opts = opts.ssl_mode(PgSslMode::Require);
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(opts)
        .await?;

    tracing::info!(max_connections = cfg.db_max_connections, "database pool ready");
    Ok(pool)
}

// Order matters: users first, everything else may reference it.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id SERIAL PRIMARY KEY,
      username VARCHAR(100) NOT NULL,
      email VARCHAR(255) UNIQUE NOT NULL,
      password VARCHAR(255) NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notices (
      id SERIAL PRIMARY KEY,
      title VARCHAR(255) NOT NULL,
      category VARCHAR(100),
      content TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      image_data TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
      id SERIAL PRIMARY KEY,
      author VARCHAR(100) NOT NULL,
      password VARCHAR(255) NOT NULL,
      title VARCHAR(255) NOT NULL,
      content TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      image_data TEXT,
      user_id INTEGER REFERENCES users(id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS consultations (
      id SERIAL PRIMARY KEY,
      author VARCHAR(100) NOT NULL,
      password VARCHAR(255),
      title VARCHAR(255) NOT NULL,
      content TEXT NOT NULL,
      is_secret BOOLEAN NOT NULL DEFAULT TRUE,
      is_answered BOOLEAN NOT NULL DEFAULT FALSE,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      image_data TEXT,
      user_id INTEGER REFERENCES users(id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_comments (
      id SERIAL PRIMARY KEY,
      post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
      author VARCHAR(100) NOT NULL,
      password VARCHAR(255) NOT NULL,
      content TEXT NOT NULL,
      likes INTEGER NOT NULL DEFAULT 0,
      tags TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reservations (
      id SERIAL PRIMARY KEY,
      patient_name VARCHAR(100) NOT NULL,
      phone_number VARCHAR(100) NOT NULL,
      desired_date DATE NOT NULL,
      desired_time VARCHAR(50) NOT NULL,
      notes TEXT,
      status VARCHAR(50) NOT NULL DEFAULT 'pending',
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      user_id INTEGER REFERENCES users(id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
      id SERIAL PRIMARY KEY,
      patient_name VARCHAR(100) NOT NULL,
      rating INT NOT NULL CHECK (rating >= 1 AND rating <= 5),
      content TEXT NOT NULL,
      is_approved BOOLEAN NOT NULL DEFAULT FALSE,
      admin_reply TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      image_data TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS replies (
      id SERIAL PRIMARY KEY,
      consultation_id INTEGER NOT NULL REFERENCES consultations(id) ON DELETE CASCADE,
      content TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doctors (
      id SERIAL PRIMARY KEY,
      name VARCHAR(100) NOT NULL,
      position VARCHAR(100) NOT NULL,
      history TEXT,
      image_data TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS about_content (
      id INT PRIMARY KEY DEFAULT 1,
      title TEXT,
      subtitle TEXT,
      content TEXT,
      image_data TEXT,
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clinic_photos (
      id SERIAL PRIMARY KEY,
      caption VARCHAR(255),
      image_data TEXT NOT NULL,
      display_order SERIAL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS case_photos (
      id SERIAL PRIMARY KEY,
      title VARCHAR(255) NOT NULL,
      category VARCHAR(100),
      description TEXT,
      before_image_data TEXT,
      after_image_data TEXT,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS faqs (
      id SERIAL PRIMARY KEY,
      category VARCHAR(100) NOT NULL,
      question TEXT NOT NULL,
      answer TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
      image_data TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blocked_slots (
      id SERIAL PRIMARY KEY,
      slot_date DATE NOT NULL,
      slot_time VARCHAR(50) NOT NULL,
      UNIQUE (slot_date, slot_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admin_logs (
      id SERIAL PRIMARY KEY,
      action VARCHAR(100) NOT NULL,
      ip_address VARCHAR(100),
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contacts (
      id SERIAL PRIMARY KEY,
      name VARCHAR(100) NOT NULL,
      email VARCHAR(100) NOT NULL,
      message TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Databases created before account support lack these columns.
    "ALTER TABLE posts ADD COLUMN IF NOT EXISTS user_id INTEGER REFERENCES users(id) ON DELETE SET NULL",
    "ALTER TABLE consultations ADD COLUMN IF NOT EXISTS user_id INTEGER REFERENCES users(id) ON DELETE SET NULL",
    "ALTER TABLE reservations ADD COLUMN IF NOT EXISTS user_id INTEGER REFERENCES users(id) ON DELETE SET NULL",
    "CREATE INDEX IF NOT EXISTS reservations_desired_date_idx ON reservations (desired_date)",
    "CREATE INDEX IF NOT EXISTS reservations_contact_idx ON reservations (patient_name, phone_number)",
    r#"
    INSERT INTO about_content (id, title, subtitle, content)
    VALUES (1, '연세미치과 이야기',
            '환자 한 분 한 분의 건강한 미소를 위해, 저희는 보이지 않는 곳까지 정성을 다합니다.',
            '연세미치과는 단순히 아픈 곳을 치료하는 것을 넘어, 환자분들의 삶의 질을 높이는 것을 목표로 합니다.')
    ON CONFLICT (id) DO NOTHING
    "#,
];

/// Creates every table the server needs. Safe to run on each start.
pub async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(statements = SCHEMA.len(), "database schema ready");
    Ok(())
}
