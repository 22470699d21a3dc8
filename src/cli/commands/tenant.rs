use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::database::models::{PlanTier, Tenant, TenantDomain};
use crate::database::pool;
use crate::services::{record_audit_event, TenantService};
use crate::tenancy::PgTenantDirectory;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Provision a new tenant, optionally with its owner user")]
    Create {
        #[arg(help = "Tenant display name")]
        name: String,

        #[arg(long, default_value = "basic", help = "Plan tier (basic or professional)")]
        plan: String,

        #[arg(long, help = "Email for the owner user", requires = "owner_password")]
        owner_email: Option<String>,

        #[arg(long, help = "Password for the owner user", requires = "owner_email")]
        owner_password: Option<String>,
    },

    #[command(about = "Suspend a tenant; its requests start failing with 403")]
    Suspend {
        #[arg(help = "Tenant id")]
        id: Uuid,

        #[arg(long, help = "Reason recorded in the audit trail")]
        reason: String,
    },

    #[command(about = "Restore a suspended tenant")]
    Restore {
        #[arg(help = "Tenant id")]
        id: Uuid,
    },

    #[command(about = "Show one tenant with its domains and user count")]
    Inspect {
        #[arg(help = "Tenant id")]
        id: Uuid,
    },
}

pub async fn handle(
    cmd: TenantCommands,
    actor: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let pool = pool::connect().await?;
    let directory = Arc::new(PgTenantDirectory::new(pool.clone()));
    let service = TenantService::new(pool.clone(), directory);

    match cmd {
        TenantCommands::List => {
            let tenants = sqlx::query_as::<_, Tenant>(
                "SELECT * FROM \"tenants\" WHERE \"is_deleted\" = false ORDER BY \"subdomain\"",
            )
            .fetch_all(&pool)
            .await?;

            // Enumerating every tenant is itself a cross-tenant read.
            record_audit_event(
                &pool,
                actor,
                "tenant_enumeration",
                "tenant",
                None,
                None,
                None,
                json!({ "count": tenants.len() }),
            )
            .await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
                }
                OutputFormat::Text => {
                    println!(
                        "{:<38} {:<20} {:<25} {:<14} {}",
                        "ID", "SUBDOMAIN", "NAME", "PLAN", "STATUS"
                    );
                    println!("{}", "-".repeat(105));
                    for tenant in &tenants {
                        println!(
                            "{:<38} {:<20} {:<25} {:<14} {}",
                            tenant.id,
                            tenant.subdomain,
                            tenant.name,
                            tenant.plan.as_str(),
                            status_text(tenant),
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Create { name, plan, owner_email, owner_password } => {
            let plan: PlanTier = plan
                .parse()
                .map_err(|_| anyhow::anyhow!("Unknown plan '{plan}' (expected basic or professional)"))?;

            let tenant = service.provision(&name, plan, actor).await?;

            let owner = match (owner_email, owner_password) {
                (Some(email), Some(password)) => {
                    Some(service.create_owner(&tenant, &email, &password, "", "", actor).await?)
                }
                _ => None,
            };

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "tenant": tenant,
                            "owner": owner,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Tenant '{}' provisioned", tenant.name);
                    println!("  id:        {}", tenant.id);
                    println!("  subdomain: {}", tenant.subdomain);
                    println!("  plan:      {}", tenant.plan.as_str());
                    if let Some(owner) = owner {
                        println!("  owner:     {}", owner.email);
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Suspend { id, reason } => {
            let tenant = service.suspend(id, &reason, actor).await?;
            output_lifecycle(&output_format, &tenant, "suspended")
        }
        TenantCommands::Restore { id } => {
            let tenant = service.restore(id, actor).await?;
            output_lifecycle(&output_format, &tenant, "restored")
        }
        TenantCommands::Inspect { id } => {
            let tenant = sqlx::query_as::<_, Tenant>(
                "SELECT * FROM \"tenants\" WHERE \"id\" = $1 AND \"is_deleted\" = false",
            )
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tenant '{id}' not found"))?;

            let domains = sqlx::query_as::<_, TenantDomain>(
                "SELECT * FROM \"tenant_domains\" WHERE \"tenant_id\" = $1 ORDER BY \"domain\"",
            )
            .bind(id)
            .fetch_all(&pool)
            .await?;

            let user_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM \"users\" WHERE \"tenant_id\" = $1 AND \"is_deleted\" = false",
            )
            .bind(id)
            .fetch_one(&pool)
            .await?;

            record_audit_event(
                &pool,
                actor,
                "tenant_inspected",
                "tenant",
                Some(&id.to_string()),
                Some(id),
                None,
                json!({}),
            )
            .await?;

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "tenant": tenant,
                            "domains": domains,
                            "user_count": user_count,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Tenant: {}", tenant.name);
                    println!("  id:        {}", tenant.id);
                    println!("  subdomain: {}", tenant.subdomain);
                    println!("  plan:      {}", tenant.plan.as_str());
                    println!("  status:    {}", status_text(&tenant));
                    if let Some(reason) = &tenant.suspension_reason {
                        println!("  reason:    {reason}");
                    }
                    println!("  users:     {user_count}");
                    if domains.is_empty() {
                        println!("  domains:   (none)");
                    } else {
                        println!("  domains:");
                        for domain in &domains {
                            let state = if domain.is_verified { "verified" } else { "pending" };
                            println!("    {} ({state})", domain.domain);
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

fn status_text(tenant: &Tenant) -> &'static str {
    if tenant.is_active {
        "active"
    } else {
        "suspended"
    }
}

fn output_lifecycle(
    output_format: &OutputFormat,
    tenant: &Tenant,
    verb: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "tenant": tenant }))?);
        }
        OutputFormat::Text => {
            println!("Tenant '{}' {verb}", tenant.subdomain);
        }
    }
    Ok(())
}
