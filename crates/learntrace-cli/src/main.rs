use std::{
    fs,
    io::{self, BufRead as _, Write as _},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use learntrace::{
    EngineTranscript, ExecutionEngine, Highlighter, LearntraceConfig, OutputEventRouter, ProgramSource,
    RaisedException, ReplayEngine, RoutedOutput, TracebackSerializer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "learntrace", version, about = "Serialize learner tracebacks and replay engine transcripts")]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serialize a recorded exception chain and print it as JSON.
    Traceback {
        /// JSON file holding the raised exception.
        exception: PathBuf,
        /// The learner program the exception was raised from.
        #[arg(long)]
        source: PathBuf,
    },
    /// Route a recorded engine transcript, printing one JSON line per chunk.
    ///
    /// Input requests are answered with lines read from stdin.
    Replay {
        transcript: PathBuf,
        #[arg(long)]
        source: PathBuf,
        /// Run mode attached to traceback chunks.
        #[arg(long, default_value = "editor")]
        mode: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => LearntraceConfig::from_toml_file(path)?,
        None => LearntraceConfig::default(),
    };
    let highlighter = Highlighter::from_config(&config)?;
    let serializer = TracebackSerializer::new(Arc::new(config), Arc::new(highlighter))?;

    match args.command {
        Command::Traceback { exception, source } => traceback(&serializer, &exception, &source),
        Command::Replay {
            transcript,
            source,
            mode,
        } => replay(&serializer, &transcript, &source, &mode),
    }
}

fn read_program(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading program {}", path.display()))
}

fn traceback(serializer: &TracebackSerializer, exception_path: &Path, source: &Path) -> Result<()> {
    let text = fs::read_to_string(exception_path)
        .with_context(|| format!("reading exception {}", exception_path.display()))?;
    let exception: RaisedException =
        serde_json::from_str(&text).with_context(|| format!("parsing exception {}", exception_path.display()))?;
    let program = read_program(source)?;

    let records = serializer.format_exception(&exception, &ProgramSource::new(&program));
    let json = serde_json::to_string_pretty(&records)?;
    println!("{json}");
    Ok(())
}

fn replay(serializer: &TracebackSerializer, transcript: &Path, source: &Path, mode: &str) -> Result<()> {
    let mut engine = ReplayEngine::new(EngineTranscript::from_json_file(transcript)?);
    let program = read_program(source)?;
    let program_source = ProgramSource::new(&program);

    let stdin = io::stdin();
    let input = |prompt: &str| {
        eprint!("{prompt}");
        let _ = io::stderr().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                error!("failed to read input: {err}");
                None
            }
        }
    };
    let output = |routed: RoutedOutput| {
        for chunk in &routed.parts {
            match serde_json::to_string(chunk) {
                Ok(line) => println!("{line}"),
                Err(err) => error!("failed to encode chunk: {err}"),
            }
        }
    };

    let mut router = OutputEventRouter::new(serializer, &program_source, mode, input, output);
    let outcome = engine.run(mode, &program, &mut router)?;
    if let Some(prompt) = serializer.config().prompt() {
        router.emit_prompt(prompt);
    }
    info!(
        interrupted = outcome.interrupted,
        output_bytes = router.captured_output().len(),
        "replay finished"
    );
    Ok(())
}
