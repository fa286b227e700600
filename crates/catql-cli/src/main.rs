//! Catql CLI
//!
//! Runs one query through the pipeline and prints the stage asked for:
//! - `lex`, `parse`: the grammar alone, no collaborators needed
//! - `tree`, `expand`: the disambiguated and expanded query trees
//! - `compile`: the engine request (query plus post filter)
//! - `describe`: the search mapping of a node, with up links

use anyhow::{anyhow, bail, Result};
use catql_core::{
    expand, EsQueryTree, LinkParams, Node, QueryContext, QueryTree, SearchMapping, SelectedFacets, Settings,
};
use catql_dsl::{flatten, lex, parse_query};
use catql_vocab::{EsMappings, JsonVocab};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value as Json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "catql")]
#[command(author, version, about = "Catql: catalogue query compiler")]
struct Cli {
    #[command(flatten)]
    sources: Sources,
    #[command(subcommand)]
    command: Commands,
}

/// Collaborator snapshots. Only commands past parsing need them.
#[derive(Args)]
struct Sources {
    /// Vocabulary snapshot JSON
    #[arg(long, global = true)]
    vocab: Option<PathBuf>,
    /// Search-index field mappings JSON
    #[arg(long, global = true)]
    mappings: Option<PathBuf>,
    /// Pipeline settings JSON (defaults when omitted)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the symbols of a query
    Lex { query: String },

    /// Print the syntax tree of a query
    Parse {
        query: String,
        /// Print the flattened tree instead
        #[arg(long)]
        flat: bool,
    },

    /// Print the disambiguated query tree
    Tree {
        query: String,
        /// Also report the token under this character offset
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// Print the expanded query tree
    Expand { query: String },

    /// Print the engine request as JSON
    Compile { query: String },

    /// Print the search mapping of a node as JSON
    Describe {
        query: String,
        /// Dotted child indices of the node (`0.1`); the root when omitted
        #[arg(long, default_value = "")]
        path: String,
        /// Describe the expanded tree
        #[arg(long)]
        expanded: bool,
        /// Request parameters carried into up links (`_limit=20`)
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Lex { query } => {
            for symbol in lex(&query)? {
                println!("{}", serde_json::to_string(&symbol)?);
            }
        }
        Commands::Parse { query, flat } => {
            let ast = parse_query(&query)?;
            let json = if flat {
                let ctx = cli.sources.load_optional()?;
                let flat = flatten(&ast, &|word| ctx.as_ref().is_some_and(|c| c.filters.contains(word)));
                serde_json::to_value(&flat)?
            } else {
                serde_json::to_value(&ast)?
            };
            print_json(&json)?;
        }
        Commands::Tree { query, cursor } => {
            let ctx = cli.sources.load("tree")?;
            let tree = QueryTree::parse(&query, &ctx)?;
            println!("{} {}", "query:".green().bold(), tree.to_query_string());
            print_outline(tree.root(), 0);
            if let Some(cursor) = cursor {
                match tree.currently_edited_token(cursor) {
                    Some(token) => println!("{} {}", "editing:".yellow().bold(), token.value),
                    None => println!("{} nothing at {cursor}", "editing:".yellow().bold()),
                }
            }
        }
        Commands::Expand { query } => {
            let ctx = cli.sources.load("expand")?;
            let tree = QueryTree::parse(&query, &ctx)?;
            let expanded = expand(&tree, &ctx);
            println!("{} {}", "expanded:".green().bold(), expanded.tree.to_query_string());
            print_outline(expanded.root(), 0);
        }
        Commands::Compile { query } => {
            let ctx = cli.sources.load("compile")?;
            let tree = QueryTree::parse(&query, &ctx)?;
            let selected = SelectedFacets::from_tree(&tree, &ctx.settings.facets);
            let compiled = EsQueryTree::compile(&expand(&tree, &ctx), &ctx, &selected);
            print_json(&compiled.to_es())?;
        }
        Commands::Describe {
            query,
            path,
            expanded,
            params,
        } => {
            let ctx = cli.sources.load("describe")?;
            let tree = QueryTree::parse(&query, &ctx)?;
            let path = parse_path(&path)?;
            let params = parse_params(&params)?;
            let described = if expanded {
                SearchMapping::describe_expanded(&expand(&tree, &ctx), &path, &params, &ctx)
            } else {
                SearchMapping::describe(&tree, &path, &params, &ctx)
            };
            if described.is_null() {
                bail!("no node at path {path:?}");
            }
            print_json(&described)?;
        }
    }
    Ok(())
}

impl Sources {
    fn load(&self, command: &str) -> Result<QueryContext> {
        self.load_optional()?
            .ok_or_else(|| anyhow!("`{command}` needs --vocab and --mappings"))
    }

    /// `None` when either the vocabulary or the mappings are missing.
    fn load_optional(&self) -> Result<Option<QueryContext>> {
        let (Some(vocab), Some(mappings)) = (&self.vocab, &self.mappings) else {
            return Ok(None);
        };
        let settings = match &self.settings {
            Some(path) => Settings::from_path(path)?,
            None => Settings::default(),
        };
        let vocab = JsonVocab::from_path(vocab)?;
        let mappings = EsMappings::from_path(mappings)?;
        debug!(filters = settings.filters.len(), facets = settings.facets.len(), "collaborators loaded");
        Ok(Some(QueryContext::new(Arc::new(vocab), Arc::new(mappings), settings)))
    }
}

fn parse_path(path: &str) -> Result<Vec<usize>> {
    if path.trim().is_empty() {
        return Ok(Vec::new());
    }
    path.split('.')
        .map(|i| {
            i.trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid path segment '{i}' (expected e.g. 0.1)"))
        })
        .collect()
}

fn parse_params(params: &[String]) -> Result<LinkParams> {
    params
        .iter()
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("invalid parameter '{p}' (expected key=value)"))
        })
        .collect()
}

fn print_json(json: &Json) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(json)?);
    Ok(())
}

fn print_outline(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::And(children) | Node::Or(children) => {
            let label = if matches!(node, Node::And(_)) { "AND" } else { "OR" };
            println!("{indent}{}", label.cyan().bold());
            for child in children {
                print_outline(child, depth + 1);
            }
        }
        Node::Not(inner) => {
            println!("{indent}{}", "NOT".red().bold());
            print_outline(inner, depth + 1);
        }
        Node::Condition(c) => println!(
            "{indent}{} {} {}",
            c.selector.query_key().green(),
            c.operator.term_key().dimmed(),
            c.value.query_form()
        ),
        Node::FreeText(ft) => {
            let label = if ft.negated { "text, negated" } else { "text" };
            println!("{indent}{} {}", label.yellow(), ft.text());
        }
        Node::ActiveFilter(f) => println!("{indent}{} {}", "filter".magenta(), f.alias),
        Node::InactiveFilter(f) => println!("{indent}{} {}", "NOT filter".magenta(), f.alias),
        Node::Any(kind) => println!("{indent}{}", kind.as_str().dimmed()),
    }
}
