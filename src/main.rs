use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use querycraft::{sample_catalog, EngineConfig, GeneratedQuery, QueryEngine, RowSet, SqliteDatabase};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "querycraft")]
#[command(about = "Deterministic natural-language to SQL over a SQLite schema")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides QUERYCRAFT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a question into SQL
    Ask {
        question: String,

        /// Run the generated SQL against the database
        #[arg(short, long)]
        execute: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print the introspected tables and relationships
    Schema,
    /// Print the sample questions grouped by complexity
    Samples,
    /// Print the entity-relationship graph
    Erd {
        /// Mermaid erDiagram instead of JSON
        #[arg(long)]
        mermaid: bool,
    },
    /// Create the demo e-commerce database at <path>
    Seed { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    Csv,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    match args.command {
        Command::Seed { path } => {
            let db = SqliteDatabase::open(&path)?;
            db.seed_sample_data()?;
            println!("Sample database created: {}", path.display());
        }
        Command::Samples => {
            for (tier, samples) in sample_catalog() {
                println!("{}:", tier);
                for sample in samples {
                    println!("  {:<50} {}", sample.question, sample.description);
                }
            }
        }
        Command::Schema => {
            let (_, engine) = open_engine(&config)?;
            let snapshot = engine.schema();
            println!("Schema v{} ({} tables)", snapshot.version, snapshot.model.table_count());
            for table in snapshot.model.tables() {
                println!("\n{}", table.name);
                for column in &table.columns {
                    let key = if column.primary_key { " PK" } else { "" };
                    println!("  {:<24} {}{}", column.name, column.data_type, key);
                }
            }
            if !snapshot.model.relationships().is_empty() {
                println!("\nRelationships:");
                for rel in snapshot.model.relationships() {
                    println!(
                        "  {}.{} -> {}.{} ({:?})",
                        rel.from_table, rel.from_column, rel.to_table, rel.to_column, rel.origin
                    );
                }
            }
        }
        Command::Erd { mermaid } => {
            let (_, engine) = open_engine(&config)?;
            let graph = engine.erd();
            if mermaid {
                print!("{}", graph.to_mermaid());
            } else {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            }
        }
        Command::Ask {
            question,
            execute,
            format,
        } => {
            let (db, engine) = open_engine(&config)?;
            if execute {
                let response = engine.ask(&question, &db)?;
                info!("Answered in {}ms", response.elapsed_ms);
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                    OutputFormat::Csv => write_csv(&response.rows)?,
                    OutputFormat::Table => {
                        print_query(&response.query);
                        println!();
                        print_rows(&response.rows);
                    }
                }
            } else {
                let query = engine.generate(&question)?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&query)?),
                    OutputFormat::Csv => {
                        let confidence = query.confidence.to_string();
                        let complexity = query.complexity.to_string();
                        let mut writer = csv::Writer::from_writer(io::stdout());
                        writer.write_record(["question", "sql", "confidence", "complexity", "rule"])?;
                        writer.write_record([
                            query.question.as_str(),
                            query.sql.as_str(),
                            confidence.as_str(),
                            complexity.as_str(),
                            query.rule.as_str(),
                        ])?;
                        writer.flush()?;
                    }
                    OutputFormat::Table => print_query(&query),
                }
            }
        }
    }

    Ok(())
}

fn open_engine(config: &EngineConfig) -> Result<(SqliteDatabase, QueryEngine)> {
    if !config.database_path.exists() {
        bail!(
            "database {} does not exist (create one with `querycraft seed {}`)",
            config.database_path.display(),
            config.database_path.display()
        );
    }
    let db = SqliteDatabase::open(&config.database_path)?.with_max_rows(config.max_result_rows);
    let engine = QueryEngine::from_source(config, &db)
        .with_context(|| format!("introspecting {}", config.database_path.display()))?;
    Ok((db, engine))
}

fn print_query(query: &GeneratedQuery) {
    println!("SQL:         {}", query.sql);
    println!("Confidence:  {} ({})", query.confidence, query.confidence_band);
    println!("Complexity:  {}", query.complexity);
    println!("Rule:        {}", query.rule);
    println!("Tables:      {}", query.tables_used.join(", "));
    println!("\n{}", query.explanation);
}

fn print_rows(rows: &RowSet) {
    let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.len()).collect();
    let cells: Vec<Vec<String>> = (0..rows.row_count).map(|i| rows.text_row(i)).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(rows.columns.as_slice()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &cells {
        println!("{}", line(row.as_slice()));
    }
    println!(
        "({} rows{}, {}ms)",
        rows.row_count,
        if rows.truncated { ", truncated" } else { "" },
        rows.execution_time_ms
    );
}

fn write_csv(rows: &RowSet) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(&rows.columns)?;
    for i in 0..rows.row_count {
        writer.write_record(rows.text_row(i))?;
    }
    writer.flush()?;
    Ok(())
}
