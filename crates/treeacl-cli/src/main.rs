//! Treeacl CLI
//!
//! Loads a policy snapshot and answers access queries against it.
//!
//! # Usage
//!
//! ```bash
//! treeacl --policy policy.json check editor docs --action update
//! treeacl --policy policy.json explain intern wiki --action delete
//! treeacl --policy policy.json tree roles
//! ```
//!
//! `check` and `check-denied` exit with status 0 when the answer is yes and 1
//! otherwise, so they can be used directly in shell conditionals.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use treeacl::{Acl, Action, Entry, SimpleEntry, Snapshot, WILDCARD};

#[derive(Parser, Debug)]
#[command(name = "treeacl")]
#[command(version, about = "Query hierarchical access control policies")]
struct Args {
    /// JSON policy snapshot to load (defaults to an empty deny-all policy)
    #[arg(short, long, global = true)]
    policy: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Succeed if the role is allowed on the resource
    Check(Query),
    /// Succeed if the role is denied on the resource
    CheckDenied(Query),
    /// Print which permission decides the query
    Explain(Query),
    /// Print a hierarchy as an indented tree
    Tree {
        #[arg(value_enum)]
        hierarchy: Hierarchy,
    },
    /// Print every store of the loaded policy
    Dump,
}

#[derive(clap::Args, Debug)]
struct Query {
    /// Role id, or `*` for any role
    role: String,

    /// Resource id, or `*` for any resource
    resource: String,

    /// Restrict the query to one action (create, read, update, delete)
    #[arg(short, long, value_parser = parse_action)]
    action: Option<Action>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Hierarchy {
    Roles,
    Resources,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = if args.verbose {
        "treeacl=trace,treeacl_cli=debug"
    } else {
        "treeacl=info,treeacl_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let acl = match &args.policy {
        Some(path) => load_policy(path)?,
        None => {
            debug!("no policy given; using the default deny-all policy");
            Acl::new()
        }
    };

    let answer = match &args.command {
        Command::Check(query) => query.run(&acl, false),
        Command::CheckDenied(query) => query.run(&acl, true),
        Command::Explain(query) => {
            let why = acl.explain(
                query.role_entry().as_ref().map(as_entry),
                query.resource_entry().as_ref().map(as_entry),
                query.action.unwrap_or(Action::All),
            );
            println!("{why}");
            true
        }
        Command::Tree { hierarchy } => {
            let loader = SimpleEntry::new(WILDCARD);
            match hierarchy {
                Hierarchy::Roles => print!("{}", acl.visualize_roles(&loader)),
                Hierarchy::Resources => print!("{}", acl.visualize_resources(&loader)),
            }
            true
        }
        Command::Dump => {
            print!("{}", acl.visualize());
            true
        }
    };

    Ok(if answer {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

impl Query {
    fn role_entry(&self) -> Option<SimpleEntry> {
        entry_for(&self.role)
    }

    fn resource_entry(&self) -> Option<SimpleEntry> {
        entry_for(&self.resource)
    }

    /// Answers the query and prints the verdict.
    fn run(&self, acl: &Acl, denied: bool) -> bool {
        let role = self.role_entry();
        let resource = self.resource_entry();
        let role = role.as_ref().map(as_entry);
        let resource = resource.as_ref().map(as_entry);

        let answer = match (self.action, denied) {
            (None, false) => acl.is_allowed(role, resource),
            (None, true) => acl.is_denied(role, resource),
            (Some(action), false) => acl.is_allowed_action(role, resource, action),
            (Some(action), true) => acl.is_denied_action(role, resource, action),
        };
        info!(
            role = %self.role,
            resource = %self.resource,
            action = ?self.action,
            denied,
            answer,
            "answered query"
        );
        println!("{}", if answer { "yes" } else { "no" });
        answer
    }
}

fn as_entry(entry: &SimpleEntry) -> &dyn Entry {
    entry
}

fn entry_for(id: &str) -> Option<SimpleEntry> {
    (id != WILDCARD).then(|| SimpleEntry::new(id))
}

/// Reads a snapshot from disk into a fresh ACL.
fn load_policy(path: &Path) -> Result<Acl> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse policy {}", path.display()))?;

    let mut acl = Acl::new();
    acl.clear();
    acl.restore(&snapshot)?;

    if acl.default_policy().is_none() {
        warn!("policy has no default permission; unmatched queries answer no");
    }
    info!(
        roles = acl.roles().len(),
        resources = acl.resources().len(),
        permissions = acl.permissions().len(),
        "loaded policy from {}",
        path.display()
    );
    Ok(acl)
}

fn parse_action(name: &str) -> std::result::Result<Action, String> {
    let action = Action::from_name(name);
    if action == Action::All && !name.eq_ignore_ascii_case("all") {
        return Err(format!(
            "unknown action '{name}' (expected all, create, read, update or delete)"
        ));
    }
    Ok(action)
}
