mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use fmkit::config::Settings;
use fmkit::flows::ExportFormat;
use fmkit::profiles::AgentProfile;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter, e.g. "info" or "fmkit=debug"
    #[arg(long, global = true, env = "FMKIT_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to the model and save the response
    Chat {
        prompt: String,

        /// Print the response as it arrives
        #[arg(long)]
        stream: bool,

        /// Skip writing the transcript file
        #[arg(long)]
        no_save: bool,
    },

    /// Run a tool-calling agent on a query
    Agent {
        query: String,

        #[arg(short, long, default_value_t = AgentProfile::General)]
        profile: AgentProfile,

        #[arg(long)]
        stream: bool,
    },

    /// Route a query to a worker agent by keyword
    Supervisor { query: String },

    /// Answer a question from the text files in a directory
    Rag {
        /// Directory of .txt and .md files to index
        #[arg(long)]
        docs: PathBuf,

        query: String,

        /// Print the matching passages instead of asking the model
        #[arg(long)]
        search_only: bool,
    },

    /// List or export the bundled flow definitions
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },

    /// Manage few-shot prompt templates
    Template {
        /// Directory holding the stored templates
        #[arg(long, default_value = "data/templates")]
        dir: PathBuf,

        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum FlowCommand {
    List,
    Export {
        name: String,

        #[arg(short, long, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// Store a template read from a JSON file
    Store { file: PathBuf },
    List,
    Show { id: String },
    /// Replace a stored template with one read from a JSON file
    Update { id: String, file: PathBuf },
    Delete { id: String },
    /// Fill a stored template, e.g. `render <id> --var object=compiler`
    Render {
        id: String,

        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
}

fn load_settings() -> Settings {
    match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", style("Configuration error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chat {
            prompt,
            stream,
            no_save,
        } => commands::chat::execute(&load_settings(), &prompt, stream, !no_save).await,
        Command::Agent {
            query,
            profile,
            stream,
        } => commands::agent::execute(&load_settings(), profile, &query, stream).await,
        Command::Supervisor { query } => {
            commands::supervisor::execute(&load_settings(), &query).await
        }
        Command::Rag {
            docs,
            query,
            search_only,
        } => commands::rag::execute(&load_settings(), &docs, &query, search_only).await,
        Command::Flow { command } => match command {
            FlowCommand::List => commands::flow::list(),
            FlowCommand::Export {
                name,
                format,
                output,
            } => commands::flow::export(&name, format, output.as_deref()),
        },
        Command::Template { dir, command } => {
            let store = fmkit::templates::TemplateStore::new(dir);
            match command {
                TemplateCommand::Store { file } => commands::template::store(&store, &file),
                TemplateCommand::List => commands::template::list(&store),
                TemplateCommand::Show { id } => commands::template::show(&store, &id),
                TemplateCommand::Update { id, file } => {
                    commands::template::update(&store, &id, &file)
                }
                TemplateCommand::Delete { id } => commands::template::delete(&store, &id),
                TemplateCommand::Render { id, vars } => {
                    commands::template::render(&store, &id, &vars)
                }
            }
        }
        Command::Version => commands::version::execute(),
    }
}
