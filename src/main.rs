//! MarkerLens CLI
//!
//! Usage:
//!   markerlens --registry markers.json --text "your text here"   # Single evaluation
//!   markerlens --registry markers.json --interactive             # Interactive session
//!   markerlens --registry markers.json --conversation chat.txt   # Evaluate a message file
//!   markerlens --registry markers.json --serve                   # HTTP API server
//!   markerlens --registry markers.json --text "text" --json      # JSON output

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use markerlens::core::{
    run_server, FileRegistrySource, HashEmbedder, MarkerEngine, MemorySink, RegistryCache,
};
use markerlens::types::{EngineConfig, Hit, MarkerLevel, UnitEvaluation};
use markerlens::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "markerlens",
    version = VERSION,
    about = "MarkerLens - Classify text against a layered marker hierarchy",
    long_about = "MarkerLens evaluates free text against a registry of markers arranged\n\
                  in four levels: ATOMIC (regex and similarity evidence), SEMANTIC\n\
                  (quorum over atoms), CLUSTER (windowed quorum over semantics) and\n\
                  META (coverage over the whole conversation).\n\n\
                  Modes:\n  \
                  --text          Evaluate one text unit\n  \
                  --interactive   Feed messages from stdin, hits update live\n  \
                  --conversation  Evaluate a file with one message per line\n  \
                  --serve         HTTP API server mode"
)]
struct Args {
    /// Marker registry JSON file
    #[arg(short, long, default_value = "markers.json")]
    registry: String,

    /// Text to evaluate (single mode)
    #[arg(short, long)]
    text: Option<String>,

    /// Interactive mode - read messages from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Conversation file with one message per line
    #[arg(short, long)]
    conversation: Option<String>,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Show raw evidence and uncertain signals
    #[arg(long)]
    verbose: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let sink = Arc::new(MemorySink::new());
    let engine = match build_engine(&args.registry, sink.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("{} {}", "registry error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if args.serve {
        run_serve(&args, engine).await;
    } else if let Some(ref path) = args.conversation {
        run_conversation(path, &args, &engine);
    } else if let Some(ref text) = args.text {
        run_single(text, &args, &engine, &sink);
    } else {
        // Default to interactive if no mode specified
        run_interactive(&args, &engine, &sink);
    }
}

fn build_engine(registry_path: &str, sink: Arc<MemorySink>) -> markerlens::Result<MarkerEngine> {
    let config = EngineConfig::default();
    let source = FileRegistrySource::new(registry_path);
    let cache = RegistryCache::new(
        Box::new(source),
        Duration::from_secs(config.registry_ttl_secs),
    )?;
    Ok(MarkerEngine::with_config(
        cache,
        Arc::new(HashEmbedder::new()),
        sink,
        config,
    ))
}

/// Run single text evaluation
fn run_single(text: &str, args: &Args, engine: &MarkerEngine, sink: &MemorySink) {
    let unit = engine.evaluate_unit(text);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&unit).unwrap());
    } else if args.no_color {
        println!("{}", unit.to_parseable_string());
    } else {
        print_unit(&unit, args.verbose);
        if args.verbose {
            print_uncertain(sink);
        }
    }
}

/// Run interactive mode: each stdin line is one message, hits accumulate
fn run_interactive(args: &Args, engine: &MarkerEngine, sink: &MemorySink) {
    print_header();
    println!("Type a message and press Enter. Type 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut units: Vec<String> = Vec::new();

    loop {
        print!("[{}] > ", units.len());
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Messages: {}", units.len());
            break;
        }
        if line.is_empty() {
            continue;
        }

        units.push(line.to_string());
        let hits = engine.evaluate_sequence(&units);

        if args.json {
            println!("{}", serde_json::to_string(&hits).unwrap());
        } else {
            let unit = engine.evaluate_unit(line);
            print_unit(&unit, args.verbose);
            for hit in hits.iter().filter(|h| h.level >= MarkerLevel::Cluster) {
                print_hit(hit);
            }
            if args.verbose {
                print_uncertain(sink);
            }
        }
    }
}

/// Evaluate a conversation file, one message per line, and print all hits
fn run_conversation(path: &str, args: &Args, engine: &MarkerEngine) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} {}: {}", "read error:".red().bold(), path, e);
            std::process::exit(1);
        }
    };
    let units: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    let hits = engine.evaluate_sequence(&units);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits).unwrap());
        return;
    }

    println!("{} messages, {} hits", units.len(), hits.len());
    for hit in &hits {
        print_hit(hit);
    }
}

/// Print one unit evaluation
fn print_unit(unit: &UnitEvaluation, verbose: bool) {
    if unit.is_empty() {
        println!("{}", "no markers".dimmed());
        return;
    }
    if !unit.ato.is_empty() {
        println!("  {} {}", "ATO".cyan().bold(), unit.ato.join(", "));
    }
    if !unit.sem.is_empty() {
        println!("  {} {}", "SEM".yellow().bold(), unit.sem.join(", "));
    }
    if !unit.clu.is_empty() {
        println!("  {} {}", "CLU".magenta().bold(), unit.clu.join(", "));
    }
    if verbose {
        for e in &unit.evidence {
            let matched = e.matched_text.as_deref().unwrap_or("~");
            println!(
                "    {} {} conf={:.2} [{}]",
                "evidence".dimmed(),
                e.marker_id,
                e.confidence,
                matched
            );
        }
    }
}

/// Print one sequence hit
fn print_hit(hit: &Hit) {
    let label = match hit.level {
        MarkerLevel::Atomic => "ATO".cyan().bold(),
        MarkerLevel::Semantic => "SEM".yellow().bold(),
        MarkerLevel::Cluster => "CLU".magenta().bold(),
        MarkerLevel::Meta => "META".green().bold(),
    };
    let at = match hit.unit_index {
        Some(i) => format!("@{}", i),
        None => "@*".to_string(),
    };
    println!(
        "  {} {} conf={:.2} {} <- [{}]",
        label,
        hit.marker_id,
        hit.confidence,
        at.dimmed(),
        hit.provenance.join(", ")
    );
}

/// Print and drain uncertain similarity signals
fn print_uncertain(sink: &MemorySink) {
    for signal in sink.drain() {
        println!(
            "    {} {} score={:.3}",
            "uncertain".dimmed(),
            signal.marker_id,
            signal.score
        );
    }
}

fn print_header() {
    println!("{}", "========================================".bold());
    println!("{}", format!("  MarkerLens v{}", VERSION).bold());
    println!("{}", "========================================".bold());
    println!();
}

/// Run HTTP API server
async fn run_serve(args: &Args, engine: Arc<MarkerEngine>) {
    println!();
    println!("{}", format!("MarkerLens API Server v{}", VERSION).bold());
    println!();

    if let Err(e) = run_server(&args.addr, engine).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
