use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::database::models::{Account, Budget, Category, Expense, PlanTier, Project};
use crate::database::{pool, CrossTenantAccess, Record};
use crate::services::TenantService;
use crate::tenancy::PgTenantDirectory;

#[derive(Debug, Deserialize)]
struct SeedFile {
    tenant: SeedTenant,
    owner: SeedOwner,
    #[serde(default)]
    categories: Vec<SeedCategory>,
    #[serde(default)]
    accounts: Vec<SeedAccount>,
    #[serde(default)]
    projects: Vec<SeedProject>,
    #[serde(default)]
    budgets: Vec<SeedBudget>,
    #[serde(default)]
    expenses: Vec<SeedExpense>,
}

#[derive(Debug, Deserialize)]
struct SeedTenant {
    name: String,
    #[serde(default = "default_plan")]
    plan: String,
}

fn default_plan() -> String {
    "basic".to_string()
}

#[derive(Debug, Deserialize)]
struct SeedOwner {
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct SeedCategory {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeedAccount {
    name: String,
    kind: String,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    opening_balance: f64,
    #[serde(default)]
    low_balance_threshold: Option<f64>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
struct SeedProject {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    starting_budget: f64,
    #[serde(default = "default_currency")]
    currency: String,
}

#[derive(Debug, Deserialize)]
struct SeedBudget {
    name: String,
    project: String,
    #[serde(default)]
    category: Option<String>,
    amount: f64,
    period: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default = "default_threshold")]
    alert_threshold: i64,
}

fn default_threshold() -> i64 {
    80
}

#[derive(Debug, Deserialize)]
struct SeedExpense {
    project: String,
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    category: Option<String>,
    title: String,
    amount: f64,
    expense_date: NaiveDate,
    #[serde(default)]
    vendor: Option<String>,
}

/// Provision a tenant from a YAML fixture and fill it with sample data.
///
/// Everything after provisioning goes through the audited bypass and the
/// scoped repositories, so the fixture exercises the same write path as the
/// API, cross-tenant reference checks included.
pub async fn handle(file: &Path, actor: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Cannot read fixture '{}': {e}", file.display()))?;
    let seed: SeedFile = serde_yaml::from_str(&raw)?;

    let plan: PlanTier = seed
        .tenant
        .plan
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown plan '{}'", seed.tenant.plan))?;

    let pool = pool::connect().await?;
    let directory = std::sync::Arc::new(PgTenantDirectory::new(pool.clone()));
    let service = TenantService::new(pool.clone(), directory);

    let tenant = service.provision(&seed.tenant.name, plan, actor).await?;
    let owner = service
        .create_owner(
            &tenant,
            &seed.owner.email,
            &seed.owner.password,
            &seed.owner.first_name,
            &seed.owner.last_name,
            actor,
        )
        .await?;

    let access = CrossTenantAccess::enter(&pool, tenant.id, actor, "fixture seeding").await?;

    let mut categories: HashMap<String, Uuid> = HashMap::new();
    let repo = access.repository::<Category>();
    for entry in &seed.categories {
        let mut record = Record::new();
        record.set("name", entry.name.as_str());
        if let Some(color) = &entry.color {
            record.set("color", color.as_str());
        }
        let row = repo.insert(record).await?;
        categories.insert(entry.name.clone(), row.id);
    }

    let mut accounts: HashMap<String, Uuid> = HashMap::new();
    let repo = access.repository::<Account>();
    for entry in &seed.accounts {
        let mut record = Record::new();
        record
            .set("name", entry.name.as_str())
            .set("kind", entry.kind.as_str())
            .set("currency", entry.currency.as_str())
            .set("opening_balance", entry.opening_balance);
        if let Some(threshold) = entry.low_balance_threshold {
            record.set("low_balance_threshold", threshold);
        }
        let row = repo.insert_created_by(record, owner.id).await?;
        accounts.insert(entry.name.clone(), row.id);
    }

    let mut projects: HashMap<String, Uuid> = HashMap::new();
    let repo = access.repository::<Project>();
    for entry in &seed.projects {
        let mut record = Record::new();
        record
            .set("name", entry.name.as_str())
            .set("starting_budget", entry.starting_budget)
            .set("currency", entry.currency.as_str())
            .set("status", "active");
        if let Some(description) = &entry.description {
            record.set("description", description.as_str());
        }
        let row = repo.insert_created_by(record, owner.id).await?;
        projects.insert(entry.name.clone(), row.id);
    }

    let repo = access.repository::<Budget>();
    for entry in &seed.budgets {
        let project_id = resolve(&projects, &entry.project, "project")?;
        let mut record = Record::new();
        record
            .set("name", entry.name.as_str())
            .set("project_id", project_id.to_string())
            .set("amount", entry.amount)
            .set("period", entry.period.as_str())
            .set("start_date", entry.start_date.to_string())
            .set("end_date", entry.end_date.to_string())
            .set("alert_threshold", entry.alert_threshold)
            .set("alert_enabled", true)
            .set("is_active", true);
        if let Some(category) = &entry.category {
            record.set("category_id", resolve(&categories, category, "category")?.to_string());
        }
        repo.insert(record).await?;
    }

    let repo = access.repository::<Expense>();
    for entry in &seed.expenses {
        let project_id = resolve(&projects, &entry.project, "project")?;
        let mut record = Record::new();
        record
            .set("project_id", project_id.to_string())
            .set("title", entry.title.as_str())
            .set("amount", entry.amount)
            .set("currency", "USD")
            .set("expense_date", entry.expense_date.to_string());
        if let Some(account) = &entry.account {
            record.set("account_id", resolve(&accounts, account, "account")?.to_string());
        }
        if let Some(category) = &entry.category {
            record.set("category_id", resolve(&categories, category, "category")?.to_string());
        }
        if let Some(vendor) = &entry.vendor {
            record.set("vendor", vendor.as_str());
        }
        repo.insert_created_by(record, owner.id).await?;
    }

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "tenant": tenant,
                    "owner": owner.email,
                    "categories": seed.categories.len(),
                    "accounts": seed.accounts.len(),
                    "projects": seed.projects.len(),
                    "budgets": seed.budgets.len(),
                    "expenses": seed.expenses.len(),
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Seeded tenant '{}' ({})", tenant.name, tenant.subdomain);
            println!("  owner:      {}", owner.email);
            println!("  categories: {}", seed.categories.len());
            println!("  accounts:   {}", seed.accounts.len());
            println!("  projects:   {}", seed.projects.len());
            println!("  budgets:    {}", seed.budgets.len());
            println!("  expenses:   {}", seed.expenses.len());
        }
    }

    Ok(())
}

fn resolve(map: &HashMap<String, Uuid>, name: &str, kind: &str) -> anyhow::Result<Uuid> {
    map.get(name)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Fixture references unknown {kind} '{name}'"))
}
