use bulkfields::export::write_document;
use bulkfields::gate::{Action, AdminTokenGate, AuthorizationGate, LocalOperator, RequestContext};
use bulkfields::{Edits, KeyPolicy, MatchStrategy, RecordId, Store};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

/// Bulk field editor: page through records and edit their custom fields,
/// or move them in and out as JSON
#[derive(Parser)]
#[command(name = "bulkfields", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Anti-forgery token, required for save/import when BULKFIELDS_SECRET is set
    #[arg(long, env = "BULKFIELDS_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyPolicyArg {
    /// Write every submitted key
    Unrestricted,
    /// Only write keys configured in settings.yaml
    SchemaOnly,
}

impl From<KeyPolicyArg> for KeyPolicy {
    fn from(arg: KeyPolicyArg) -> Self {
        match arg {
            KeyPolicyArg::Unrestricted => KeyPolicy::Unrestricted,
            KeyPolicyArg::SchemaOnly => KeyPolicy::SchemaOnly,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show the active settings
    Settings,

    /// Add a record of the configured type
    Add {
        /// Record title
        title: String,
        /// Explicit permalink (generated from the title otherwise)
        #[arg(long)]
        permalink: Option<String>,
        /// Body text, searched by `page --search`
        #[arg(long, default_value = "")]
        content: String,
    },

    /// Show one page of records with their editable fields
    Page {
        /// 1-based page number
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
        /// Free-text search over title and content
        #[arg(long)]
        search: Option<String>,
    },

    /// Save field values
    Save {
        /// Field assignments (e.g. --set 12:color=blue)
        #[arg(long = "set", value_parser = parse_assignment)]
        assignments: Vec<(RecordId, String, String)>,
        /// JSON file of {"<id>": {"<key>": "<value>"}}
        #[arg(long)]
        edits_file: Option<PathBuf>,
        /// Which submitted keys are written
        #[arg(long, value_enum, default_value = "unrestricted")]
        key_policy: KeyPolicyArg,
    },

    /// Export all records of the configured type as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON document, matching items to existing records
    Import {
        /// Path to the import document
        file: PathBuf,
        /// Matching strategy: title, permalink or field:<key>
        #[arg(long = "match", default_value = "permalink", value_parser = parse_strategy)]
        strategy: MatchStrategy,
        /// Print the per-item report
        #[arg(long)]
        report: bool,
    },
}

fn parse_assignment(s: &str) -> Result<(RecordId, String, String), String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid assignment: no '=' found in '{s}'"))?;
    let (id, key) = target
        .split_once(':')
        .ok_or_else(|| format!("Invalid assignment: expected <id>:<key>=<value>, got '{s}'"))?;
    let id: RecordId = id
        .parse()
        .map_err(|e| format!("Invalid record id '{id}': {e}"))?;
    Ok((id, key.to_string(), value.to_string()))
}

fn parse_strategy(s: &str) -> Result<MatchStrategy, String> {
    s.parse().map_err(|e: bulkfields::BulkFieldsError| e.to_string())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&cli.data_dir)?;
    let gate = gate();
    // Whoever runs the binary on the data directory is its administrator;
    // only the token is checked, and only when BULKFIELDS_SECRET is set.
    let request = RequestContext {
        is_admin: true,
        token: cli.token.clone(),
    };

    match cli.command {
        Command::Settings => {
            let settings = store.settings()?;
            print_output(&serde_json::to_value(&settings)?, &cli.format)?;
        }

        Command::Add {
            title,
            permalink,
            content,
        } => {
            let id = store.add_record(&title, permalink.as_deref(), &content)?;
            print_output(&serde_json::json!({ "id": id }), &cli.format)?;
        }

        Command::Page { page, search } => {
            let page = store.load_page(page, search.as_deref())?;
            print_output(&serde_json::to_value(&page)?, &cli.format)?;
        }

        Command::Save {
            assignments,
            edits_file,
            key_policy,
        } => {
            gate.check(&request, Action::Save)?;
            let mut edits: Edits = match edits_file {
                Some(path) => {
                    let text = std::fs::read_to_string(&path).map_err(|e| {
                        format!("Failed to read edits file '{}': {e}", path.display())
                    })?;
                    serde_json::from_str(&text)?
                }
                None => BTreeMap::new(),
            };
            for (id, key, value) in assignments {
                edits.entry(id).or_default().insert(key, value);
            }
            store.apply_edits(&edits, key_policy.into())?;
            print_output(
                &serde_json::json!({ "ok": true, "records": edits.len() }),
                &cli.format,
            )?;
        }

        Command::Export { output } => {
            gate.check(&request, Action::Export)?;
            let entries = store.export()?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    write_document(&entries, std::io::BufWriter::new(file))?;
                    log::info!("Wrote {} entries to {}", entries.len(), path.display());
                }
                None => write_document(&entries, std::io::stdout().lock())?,
            }
        }

        Command::Import {
            file,
            strategy,
            report,
        } => {
            gate.check(&request, Action::Import)?;
            let result = store.import_file(&file, &strategy)?;
            if report {
                print_output(&serde_json::to_value(&result)?, &cli.format)?;
            } else {
                print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
            }
        }
    }

    Ok(())
}

/// Token checking is enabled by setting BULKFIELDS_SECRET; without it the
/// local operator is trusted.
fn gate() -> Box<dyn AuthorizationGate> {
    match std::env::var("BULKFIELDS_SECRET") {
        Ok(secret) if !secret.is_empty() => Box::new(AdminTokenGate::new(&secret)),
        _ => Box::new(LocalOperator),
    }
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
