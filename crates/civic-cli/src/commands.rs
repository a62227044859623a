//! CLI command implementations

use anyhow::{Context, Result, anyhow, bail};
use civic_core::{
    CATEGORIES, Caller, Config, Issue, IssueFilter, IssueService, Location, NewIssue, Status,
    StatusUpdate, Store,
};
use colored::{ColoredString, Colorize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

const REDACTED: &str = "********";

fn load_config() -> Result<Config> {
    let path = Config::default_path();
    Config::load_default()
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn open_service() -> Result<IssueService> {
    let config = load_config()?;
    config.validate()?;
    let store = Store::open(&config.data_dir)
        .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?;
    Ok(IssueService::new(store, config.prefix))
}

fn colored_status(status: Status) -> ColoredString {
    let label = status.to_string();
    match status {
        Status::Pending => label.white(),
        Status::InProgress => label.yellow(),
        Status::Resolved => label.green(),
        Status::Rejected => label.red(),
    }
}

pub fn init(prefix: &str, force: bool) -> Result<()> {
    let path = Config::default_path();
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let content = Config::default_with_comments().replacen(
        "prefix = \"iss\"",
        &format!("prefix = {prefix:?}"),
        1,
    );
    let mut config = Config::parse(&content)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    let store = Store::open(&config.data_dir)?;

    println!("{} Wrote {}", "✓".green(), path.display());
    if let Some(issues) = store.issues_path() {
        println!("  Issues file: {}", issues.display());
    }
    println!("  Issue prefix: {}", config.prefix);
    Ok(())
}

/// Arguments of `civic create`
pub struct CreateArgs {
    pub title: String,
    pub description: String,
    pub category: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub created_by: String,
    pub image: Option<String>,
}

pub fn create(args: CreateArgs, json: bool) -> Result<()> {
    let service = open_service()?;
    let location = Location::new(args.lat, args.lng, args.address)?;

    if !CATEGORIES.contains(&args.category.trim()) {
        eprintln!(
            "{} '{}' is not a well-known category",
            "warning:".yellow(),
            args.category
        );
    }

    let issue = service.create(NewIssue {
        title: args.title,
        description: args.description,
        category: args.category,
        location: location.into(),
        created_by: args.created_by,
        image: args.image,
    })?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} Created issue: {}", "✓".green(), issue.id);
        println!("  Title: {}", issue.title);
        println!("  Category: {}", issue.category);
    }

    Ok(())
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Votes")]
    votes: usize,
    #[tabled(rename = "Reported")]
    reported: String,
    #[tabled(rename = "Title")]
    title: String,
}

impl From<&Issue> for IssueRow {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            status: issue.status.to_string(),
            category: issue.category.clone(),
            votes: issue.upvote_count(),
            reported: issue.created_at.format("%Y-%m-%d %H:%M").to_string(),
            title: issue.title.clone(),
        }
    }
}

pub fn list(
    category: Option<String>,
    status: Option<String>,
    created_by: Option<String>,
    json: bool,
) -> Result<()> {
    let service = open_service()?;
    let issues = service.list(&IssueFilter {
        category,
        status,
        created_by,
    })?;

    if json {
        println!("{}", serde_json::to_string(&issues)?);
    } else if issues.is_empty() {
        println!("No issues found");
    } else {
        let rows: Vec<IssueRow> = issues.iter().map(IssueRow::from).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
        println!("{} issue(s)", issues.len());
    }

    Ok(())
}

fn print_issue(issue: &Issue) {
    println!("{} {}", issue.id.cyan().bold(), issue.title.bold());
    println!();
    println!("Status:   {}", colored_status(issue.status));
    println!("Category: {}", issue.category);
    println!("Reporter: {}", issue.created_by);
    println!(
        "Location: {} ({:.5}, {:.5})",
        issue.location.address, issue.location.lat, issue.location.lng
    );
    println!("Upvotes:  {}", issue.upvote_count());
    println!("Created:  {}", issue.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:  {}", issue.updated_at.format("%Y-%m-%d %H:%M"));
    if let Some(ref image) = issue.image {
        println!("Image:    {}", image);
    }
    if let Some(ref eta) = issue.estimated_fix_time {
        println!("ETA:      {}", eta);
    }

    println!();
    println!("{}", "Description:".bold());
    println!("{}", issue.description);

    if let Some(ref remarks) = issue.remarks {
        println!();
        println!("{}", "Remarks:".bold());
        println!("{}", remarks);
    }
}

pub fn show(id: &str, json: bool) -> Result<()> {
    let service = open_service()?;
    let issue = service.get(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
    } else {
        print_issue(&issue);
    }

    Ok(())
}

pub fn upvote(id: &str, user: &str, json: bool) -> Result<()> {
    let service = open_service()?;
    let issue = service.toggle_upvote(id, user)?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else if issue.upvotes.contains(user.trim()) {
        println!(
            "{} {} upvoted {} ({} total)",
            "✓".green(),
            user.trim(),
            issue.id,
            issue.upvote_count()
        );
    } else {
        println!(
            "{} {} withdrew upvote on {} ({} total)",
            "✓".green(),
            user.trim(),
            issue.id,
            issue.upvote_count()
        );
    }

    Ok(())
}

pub fn status(
    id: &str,
    status: Option<String>,
    remarks: Option<String>,
    eta: Option<String>,
    json: bool,
) -> Result<()> {
    let update = StatusUpdate {
        status,
        remarks,
        estimated_fix_time: eta,
    };
    if update.is_empty() {
        bail!("Nothing to update: pass --status, --remarks or --eta");
    }

    let service = open_service()?;
    let admin = Caller::operator()
        .admin_capability()
        .ok_or_else(|| anyhow!("operator lacks the admin role"))?;
    let issue = service.update_status(&admin, id, &update)?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!(
            "{} {} is now {}",
            "✓".green(),
            issue.id,
            colored_status(issue.status)
        );
    }

    Ok(())
}

pub fn categories(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(CATEGORIES)?);
    } else {
        for category in CATEGORIES {
            println!("{}", category);
        }
    }
    Ok(())
}

/// Config with credentials masked, for display
fn redacted(mut config: Config) -> Config {
    if !config.media.cloudinary.api_secret.is_empty() {
        config.media.cloudinary.api_secret = REDACTED.to_string();
    }
    for entry in &mut config.auth.tokens {
        entry.token = REDACTED.to_string();
    }
    config
}

pub fn config_show(json: bool) -> Result<()> {
    let config = redacted(load_config()?);

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!(
            "{} {}",
            "Current configuration:".bold(),
            Config::default_path().display()
        );
        println!();
        print!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}

pub fn config_reset() -> Result<()> {
    let config_path = Config::default_path();
    std::fs::write(&config_path, Config::default_with_comments())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("{} Configuration reset to defaults", "✓".green());
    Ok(())
}

pub fn config_get(key: &str, json: bool) -> Result<()> {
    let config = redacted(load_config()?);
    let config_json = serde_json::to_value(&config)?;

    // "server.port" -> ["server", "port"]
    let mut value = &config_json;
    for part in key.split('.') {
        value = value
            .get(part)
            .ok_or_else(|| anyhow!("Config key not found: {}", key))?;
    }

    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Bool(b) => println!("{}", b),
            serde_json::Value::Number(n) => println!("{}", n),
            serde_json::Value::Null => println!("null"),
            _ => println!("{}", serde_json::to_string_pretty(value)?),
        }
    }

    Ok(())
}
