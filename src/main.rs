use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use countersign_config::{HostConfig, RequestDef, TemplateDef, Templates};
use countersign_service::{ChannelGranter, ChannelNotifier, WorkflowService};
use countersign_store::SqliteStore;
use countersign_workflow::{AggregateStatus, Command, Identity, Resubmission};

/// Countersign - two-phase document approval workflows
#[derive(Parser)]
#[command(name = "countersign")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.countersign)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the host config file (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Open a workflow from a request file (JSON)
  Request {
    /// Path to the request file; reads stdin when omitted
    request_file: Option<PathBuf>,
  },

  /// Apply a command (JSON, tagged by "action") to a workflow
  Act {
    workflow_id: String,

    /// Email of the acting user
    #[arg(long = "as")]
    actor: String,

    /// Display name of the acting user
    #[arg(long, default_value = "")]
    name: String,

    /// Path to the command file; reads stdin when omitted
    command_file: Option<PathBuf>,
  },

  /// Resubmit a rejected workflow with optional revisions (JSON)
  Resubmit {
    workflow_id: String,

    /// Email of the requester
    #[arg(long = "as")]
    actor: String,

    #[arg(long, default_value = "")]
    name: String,

    /// Path to the revisions file; no revisions when omitted and stdin is a terminal
    revisions_file: Option<PathBuf>,
  },

  /// Print a workflow
  Show { workflow_id: String },

  /// Print a workflow's history
  History { workflow_id: String },

  /// List workflows waiting on an approver
  Inbox { email: String },

  /// List workflows, optionally by status (e.g. under_review)
  List {
    #[arg(long)]
    status: Option<String>,

    /// Only workflows opened by this email
    #[arg(long)]
    requester: Option<String>,
  },

  /// Re-send document grants for a completed workflow
  Grant { workflow_id: String },

  /// List the configured line templates
  Templates {
    /// Only templates for this document tag
    #[arg(long)]
    tag: Option<String>,
  },

  /// Add, replace or remove a line template
  Template {
    #[command(subcommand)]
    action: TemplateAction,
  },
}

#[derive(Subcommand)]
enum TemplateAction {
  /// Add a template from a JSON file
  Add {
    /// Path to the template file; reads stdin when omitted
    template_file: Option<PathBuf>,
  },

  /// Replace the template called NAME
  Replace {
    name: String,

    /// Path to the template file; reads stdin when omitted
    template_file: Option<PathBuf>,
  },

  /// Remove the template called NAME
  Remove { name: String },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".countersign"),
  };
  let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));
  let config = HostConfig::load_or_default(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;

  init_tracing(&config.log_filter);

  match cli.command {
    Some(command) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run(command, data_dir, config).await })
    }
    None => {
      println!("countersign - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(default_filter: &str) {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();
}

async fn run(command: Commands, data_dir: PathBuf, config: HostConfig) -> Result<()> {
  let templates_path = config.templates_path(&data_dir);
  let templates = Templates::load_or_default(&templates_path)
    .with_context(|| format!("failed to load templates: {}", templates_path.display()))?;

  match command {
    Commands::Templates { tag } => {
      for template in templates.iter() {
        if tag.as_deref().is_none_or(|t| t == template.document_tag) {
          let marker = if template.is_default { " (default)" } else { "" };
          println!("{}\t{}{}", template.name, template.document_tag, marker);
        }
      }
      Ok(())
    }
    Commands::Template { action } => manage_template(action, templates, &templates_path),
    command => run_workflow_command(command, data_dir, config, templates).await,
  }
}

fn manage_template(action: TemplateAction, mut templates: Templates, path: &Path) -> Result<()> {
  match action {
    TemplateAction::Add { template_file } => {
      let template = read_template(template_file.as_deref())?;
      let name = template.name.clone();
      templates.add(template).context("failed to add template")?;
      eprintln!("Added template: {}", name);
    }
    TemplateAction::Replace {
      name,
      template_file,
    } => {
      let template = read_template(template_file.as_deref())?;
      templates
        .replace(&name, template)
        .context("failed to replace template")?;
      eprintln!("Replaced template: {}", name);
    }
    TemplateAction::Remove { name } => {
      templates.remove(&name).context("failed to remove template")?;
      eprintln!("Removed template: {}", name);
    }
  }

  templates
    .save(path)
    .with_context(|| format!("failed to save templates: {}", path.display()))?;
  debug!(path = %path.display(), templates = templates.len(), "templates saved");
  Ok(())
}

fn read_template(path: Option<&Path>) -> Result<TemplateDef> {
  let input = read_input(path)?;
  serde_json::from_str(&input).context("failed to parse template")
}

async fn run_workflow_command(
  command: Commands,
  data_dir: PathBuf,
  config: HostConfig,
  templates: Templates,
) -> Result<()> {
  tokio::fs::create_dir_all(&data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
  let database = config.database_path(&data_dir);
  let store = SqliteStore::connect(&database)
    .await
    .with_context(|| format!("failed to open database: {}", database.display()))?;

  let (grant_tx, mut grant_rx) = mpsc::unbounded_channel();
  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let service = WorkflowService::new(
    store,
    ChannelGranter::new(grant_tx),
    ChannelNotifier::new(event_tx),
    config.grant_role,
  );

  match command {
    Commands::Request { request_file } => {
      let input = read_input(request_file.as_deref())?;
      let def: RequestDef = serde_json::from_str(&input).context("failed to parse request")?;
      let workflow = service
        .create_from_def(&def, &templates)
        .await
        .context("failed to open workflow")?;
      eprintln!("Opened workflow: {}", workflow.id());
      println!("{}", serde_json::to_string_pretty(&workflow)?);
    }
    Commands::Act {
      workflow_id,
      actor,
      name,
      command_file,
    } => {
      let input = read_input(command_file.as_deref())?;
      let command: Command = serde_json::from_str(&input).context("failed to parse command")?;
      let transition = service
        .execute(&workflow_id, &Identity::new(actor, name), command)
        .await
        .context("command failed")?;
      eprintln!(
        "Status: {} -> {}",
        transition.from_status(),
        transition.to_status()
      );
      println!("{}", serde_json::to_string_pretty(&transition.workflow)?);
    }
    Commands::Resubmit {
      workflow_id,
      actor,
      name,
      revisions_file,
    } => {
      let input = read_optional_input(revisions_file.as_deref())?;
      let revisions: Resubmission = match input {
        Some(json) => serde_json::from_str(&json).context("failed to parse revisions")?,
        None => Resubmission::default(),
      };
      let transition = service
        .execute(
          &workflow_id,
          &Identity::new(actor, name),
          Command::Resubmit(revisions),
        )
        .await
        .context("resubmission failed")?;
      eprintln!("Resubmitted, epoch {}", transition.workflow.epoch());
      println!("{}", serde_json::to_string_pretty(&transition.workflow)?);
    }
    Commands::Show { workflow_id } => {
      let workflow = service.get(&workflow_id).await.context("failed to load workflow")?;
      println!("{}", serde_json::to_string_pretty(&workflow)?);
    }
    Commands::History { workflow_id } => {
      let history = service
        .history(&workflow_id)
        .await
        .context("failed to load history")?;
      println!("{}", serde_json::to_string_pretty(&history)?);
    }
    Commands::Inbox { email } => {
      for workflow in service.pending_for(&email).await? {
        print_summary(&workflow);
      }
    }
    Commands::List { status, requester } => {
      let status = status
        .map(|s| s.parse::<AggregateStatus>())
        .transpose()
        .context("invalid status")?;
      let workflows = match requester {
        Some(email) => {
          let mine = service.requested_by(&email).await?;
          mine
            .into_iter()
            .filter(|w| status.is_none_or(|s| w.status() == s))
            .collect()
        }
        None => service.list(status).await?,
      };
      for workflow in &workflows {
        print_summary(workflow);
      }
    }
    Commands::Grant { workflow_id } => {
      let failures = service
        .retry_grants(&workflow_id)
        .await
        .context("failed to re-send grants")?;
      for failure in &failures {
        eprintln!("Grant failed: {}", failure);
      }
    }
    Commands::Templates { .. } | Commands::Template { .. } => {}
  }

  drop(service);
  while let Ok(grant) = grant_rx.try_recv() {
    eprintln!(
      "Grant {} on {}: {}",
      grant.role,
      grant.document_id,
      grant.user_emails.join(", ")
    );
  }
  while let Ok(event) = event_rx.try_recv() {
    debug!(workflow_id = %event.workflow_id(), ?event, "workflow event");
  }

  Ok(())
}

fn print_summary(workflow: &countersign_workflow::Workflow) {
  let current = workflow
    .current_step()
    .map(|(line, step)| format!("{} step {} ({})", line, step.order, step.assignee.email))
    .unwrap_or_else(|| "-".to_string());
  println!(
    "{}\t{}\t{}\t{}",
    workflow.id(),
    workflow.status(),
    current,
    workflow.title()
  );
}

fn read_input(path: Option<&Path>) -> Result<String> {
  match path {
    Some(path) => std::fs::read_to_string(path)
      .with_context(|| format!("failed to read file: {}", path.display())),
    None => {
      let mut input = String::new();
      io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
      Ok(input)
    }
  }
}

/// Like [`read_input`], but stdin only counts when it is piped and non-empty.
fn read_optional_input(path: Option<&Path>) -> Result<Option<String>> {
  use std::io::IsTerminal;

  if path.is_none() && io::stdin().is_terminal() {
    return Ok(None);
  }
  let input = read_input(path)?;
  if input.trim().is_empty() {
    Ok(None)
  } else {
    Ok(Some(input))
  }
}
