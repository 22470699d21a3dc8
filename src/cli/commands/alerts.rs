use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::database::pool;
use crate::database::CrossTenantAccess;
use crate::services::AlertService;

#[derive(Subcommand)]
pub enum AlertCommands {
    #[command(about = "Evaluate budgets and account balances, raising alerts")]
    Evaluate {
        #[arg(long, help = "Evaluate a single tenant instead of all active ones")]
        tenant: Option<Uuid>,
    },
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
struct TenantRef {
    id: Uuid,
    subdomain: String,
}

pub async fn handle(
    cmd: AlertCommands,
    actor: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let pool = pool::connect().await?;

    match cmd {
        AlertCommands::Evaluate { tenant } => {
            let targets = match tenant {
                Some(id) => sqlx::query_as::<_, TenantRef>(
                    "SELECT \"id\", \"subdomain\" FROM \"tenants\" \
                     WHERE \"id\" = $1 AND \"is_deleted\" = false",
                )
                .bind(id)
                .fetch_all(&pool)
                .await?,
                None => sqlx::query_as::<_, TenantRef>(
                    "SELECT \"id\", \"subdomain\" FROM \"tenants\" \
                     WHERE \"is_active\" = true AND \"is_deleted\" = false \
                     ORDER BY \"subdomain\"",
                )
                .fetch_all(&pool)
                .await?,
            };

            if let Some(id) = tenant {
                if targets.is_empty() {
                    return Err(anyhow::anyhow!("Tenant '{id}' not found"));
                }
            }

            let mut runs = Vec::new();
            for target in &targets {
                let access =
                    CrossTenantAccess::enter(&pool, target.id, actor, "alert evaluation").await?;
                let summary = AlertService::for_tenant(&access).evaluate().await?;
                runs.push((target, summary));
            }

            match output_format {
                OutputFormat::Json => {
                    let runs: Vec<_> = runs
                        .iter()
                        .map(|(target, summary)| {
                            json!({ "tenant": target, "summary": summary })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "runs": runs }))?);
                }
                OutputFormat::Text => {
                    println!(
                        "{:<20} {:>8} {:>9} {:>7}",
                        "TENANT", "BUDGETS", "ACCOUNTS", "RAISED"
                    );
                    println!("{}", "-".repeat(48));
                    for (target, summary) in &runs {
                        println!(
                            "{:<20} {:>8} {:>9} {:>7}",
                            target.subdomain,
                            summary.budgets_checked,
                            summary.accounts_checked,
                            summary.alerts_raised,
                        );
                    }
                }
            }
            Ok(())
        }
    }
}
