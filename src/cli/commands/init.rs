use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::pool;

const SCHEMA: &str = include_str!("../../../db/schema.sql");

/// Apply the schema to the configured database. Every statement is
/// `IF NOT EXISTS`, so re-running against an initialized database is a no-op.
pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = pool::connect().await?;

    let mut applied = 0u32;
    for statement in SCHEMA.split(';') {
        if is_blank(statement) {
            continue;
        }
        sqlx::query(statement).execute(&pool).await?;
        applied += 1;
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "statements": applied }))?);
        }
        OutputFormat::Text => {
            println!("Schema applied ({applied} statements)");
        }
    }

    Ok(())
}

fn is_blank(statement: &str) -> bool {
    statement
        .lines()
        .all(|line| line.trim().is_empty() || line.trim().starts_with("--"))
}
