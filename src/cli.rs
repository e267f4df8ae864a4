//! CLI Tooling
//!
//! Command-line interface over the sync engine. Commands that reach the
//! device open one session for the run and close it on the way out; the
//! tree and config commands work entirely from local state.

use crate::config::{ConfigStore, SyncConfig};
use crate::engine::{SyncEngine, SyncPaths};
use crate::error::SyncError;
use crate::logging::{init_logging, LoggingConfig};
use crate::mirror::{DocumentTree, FileNode, TreeBuilder};
use crate::session::{DeviceSession, NullEvents};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Remsync CLI - reMarkable tablet synchronization
#[derive(Parser)]
#[command(name = "remsync")]
#[command(about = "Sync documents, templates, and splashscreens with a reMarkable tablet")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Device address (host or host:port; defaults to the last used address)
    #[arg(long)]
    pub host: Option<String>,

    /// SSH username on the device
    #[arg(long, default_value = "root")]
    pub user: String,

    /// SSH password (prompted interactively when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download device content into the local mirror
    Pull {
        #[command(subcommand)]
        target: PullTarget,
    },
    /// Upload local mirror content to the device
    Push {
        #[command(subcommand)]
        target: PushTarget,
    },
    /// Print the local document tree
    Tree,
    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum PullTarget {
    /// Mirror the document store and rebuild the tree
    Documents,
    /// Mirror the template catalog and images
    Templates,
    /// Mirror the splashscreen images
    Splashscreens,
    /// Mirror every category
    All,
}

#[derive(Subcommand)]
pub enum PushTarget {
    /// Upload one document bundle by its hash
    Document {
        /// Document hash (metadata file name without extension)
        hash: String,
    },
    /// Upload one splashscreen into its device slot
    Splashscreen {
        /// Slot id (file name without .png)
        id: String,
    },
    /// Upload the template catalog and images
    Templates,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the stored settings and where they live
    Show,
    /// Change stored settings (only the given fields are touched)
    Set {
        /// Local mirror directory for documents
        #[arg(long)]
        documents_dir: Option<PathBuf>,
        /// Local mirror directory for templates
        #[arg(long)]
        templates_dir: Option<PathBuf>,
        /// Local mirror directory for splashscreens
        #[arg(long)]
        splashscreens_dir: Option<PathBuf>,
        /// Device address to connect to by default
        #[arg(long)]
        address: Option<String>,
    },
}

/// Run one parsed invocation to completion and return its printed output.
pub async fn run(cli: Cli) -> Result<String, SyncError> {
    let logging = LoggingConfig {
        level: cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
        format: cli.log_format.clone().unwrap_or_else(|| "text".to_string()),
        output: cli.log_output.clone().unwrap_or_else(|| "stderr".to_string()),
        file: cli.log_file.clone(),
    };
    init_logging(Some(&logging))?;

    let mut config = ConfigStore::load()?;
    match &cli.command {
        Commands::Tree => {
            let paths = SyncPaths::from_config(&config)?;
            let (tree, report) = TreeBuilder::new(paths.documents.clone()).scan()?;
            let mut out = render_tree(&tree);
            if !report.orphans.is_empty() {
                let _ = write!(out, "\n{} orphaned record(s) excluded", report.orphans.len());
            }
            Ok(out)
        }
        Commands::Config { command } => run_config(command, &mut config),
        Commands::Pull { .. } | Commands::Push { .. } => {
            let paths = SyncPaths::from_config(&config)?;
            let session = connect(&cli, &mut config).await?;
            let mut engine = SyncEngine::open(session, paths)?;
            let result = run_transfer(&cli.command, &mut engine).await;
            let _ = engine.transport().close().await;
            result
        }
    }
}

async fn run_transfer(
    command: &Commands,
    engine: &mut SyncEngine<DeviceSession>,
) -> Result<String, SyncError> {
    match command {
        Commands::Pull { target } => match target {
            PullTarget::Documents => {
                engine.pull_documents().await?;
                Ok(format!(
                    "documents synced, {} node(s) in tree",
                    engine.mirror().tree.len()
                ))
            }
            PullTarget::Templates => {
                engine.pull_templates().await?;
                Ok(format!(
                    "templates synced, {} in catalog",
                    engine.mirror().templates.len()
                ))
            }
            PullTarget::Splashscreens => {
                engine.pull_splashscreens().await?;
                Ok(format!(
                    "splashscreens synced, {} image(s)",
                    engine.mirror().splashscreens.len()
                ))
            }
            PullTarget::All => {
                engine.pull_all().await?;
                Ok("all categories synced".to_string())
            }
        },
        Commands::Push { target } => match target {
            PushTarget::Document { hash } => {
                let uploaded = engine.push_document(hash).await?;
                if uploaded {
                    Ok(format!("document {} uploaded", hash))
                } else {
                    Ok(format!("document {} has no bundle files locally", hash))
                }
            }
            PushTarget::Splashscreen { id } => {
                engine.push_splashscreen(id).await?;
                Ok(format!("splashscreen {} uploaded", id))
            }
            PushTarget::Templates => {
                engine.push_templates().await?;
                Ok("template catalog uploaded".to_string())
            }
        },
        _ => unreachable!("transfer dispatch only receives pull and push"),
    }
}

fn run_config(command: &ConfigCommands, config: &mut SyncConfig) -> Result<String, SyncError> {
    match command {
        ConfigCommands::Show => {
            let path = ConfigStore::default_path()?;
            Ok(format!(
                "config file:       {}\ndocuments dir:     {}\ntemplates dir:     {}\nsplashscreens dir: {}\ndevice address:    {}",
                path.display(),
                display_or_unset(&config.documents_dir),
                display_or_unset(&config.templates_dir),
                display_or_unset(&config.splashscreens_dir),
                display_or_unset(&config.previous_address),
            ))
        }
        ConfigCommands::Set {
            documents_dir,
            templates_dir,
            splashscreens_dir,
            address,
        } => {
            if let Some(dir) = documents_dir {
                config.documents_dir = dir.display().to_string();
            }
            if let Some(dir) = templates_dir {
                config.templates_dir = dir.display().to_string();
            }
            if let Some(dir) = splashscreens_dir {
                config.splashscreens_dir = dir.display().to_string();
            }
            if let Some(addr) = address {
                config.previous_address = addr.clone();
            }
            ConfigStore::save(config)?;
            Ok("config saved".to_string())
        }
    }
}

/// Open an authenticated session, remembering the address for next time.
async fn connect(cli: &Cli, config: &mut SyncConfig) -> Result<DeviceSession, SyncError> {
    let host = match (&cli.host, config.previous_address.as_str()) {
        (Some(host), _) => host.clone(),
        (None, "") => {
            return Err(SyncError::Config(
                "no device address given and none remembered; pass --host".to_string(),
            ))
        }
        (None, previous) => previous.to_string(),
    };
    let password = match &cli.password {
        Some(password) => password.clone(),
        None if !config.device_password.is_empty() => config.device_password.clone(),
        None => dialoguer::Password::new()
            .with_prompt(format!("Password for {}@{}", cli.user, host))
            .interact()
            .map_err(|e| SyncError::Config(e.to_string()))?,
    };

    let session = DeviceSession::connect(&host, &cli.user, &password, Arc::new(NullEvents)).await?;
    if config.previous_address != host {
        config.previous_address = host;
        ConfigStore::save(config)?;
    }
    Ok(session)
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

/// Render the tree as an indented listing, directories first at each level.
pub fn render_tree(tree: &DocumentTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/");
    render_children(tree, tree.root(), 1, &mut out);
    out
}

fn render_children(tree: &DocumentTree, node: &FileNode, depth: usize, out: &mut String) {
    let mut children: Vec<&FileNode> = match tree.children_of(&node.hash) {
        Ok(children) => children,
        Err(_) => return,
    };
    children.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.visible_name.cmp(&b.visible_name))
    });
    for child in children {
        let marker = if child.is_directory() { "/" } else { "" };
        let _ = writeln!(
            out,
            "{}{}{}",
            "  ".repeat(depth),
            child.visible_name,
            marker
        );
        if child.is_directory() {
            render_children(tree, child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, parent: &str, kind: &str) -> String {
        format!(
            r#"{{"visibleName":"{}","parent":"{}","type":"{}"}}"#,
            name, parent, kind
        )
    }

    #[test]
    fn renders_directories_before_documents() {
        let records = vec![
            ("doc1".to_string(), record("Alpha", "", "DocumentType")),
            ("dir1".to_string(), record("Zeta", "", "CollectionType")),
            ("doc2".to_string(), record("Nested", "dir1", "DocumentType")),
        ];
        let (tree, _) = TreeBuilder::build_from_records(records, None).unwrap();
        let rendered = render_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "/");
        assert_eq!(lines[1], "  Zeta/");
        assert_eq!(lines[2], "    Nested");
        assert_eq!(lines[3], "  Alpha");
    }

    #[test]
    fn empty_tree_renders_just_the_root() {
        let rendered = render_tree(&DocumentTree::empty());
        assert_eq!(rendered.trim_end(), "/");
    }
}
