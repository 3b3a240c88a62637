use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use paramcad::{
    CommandEngine, Diagnostic, Document, EngineAssets, FailureKind, OrchestratorConfig,
    ParamValue, PreviewCache, RenderEvent, RenderOrchestrator, RenderOutput, RenderState,
    StateDetail, Tier,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "paramcad", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the extracted schema and diagnostics as JSON.
    Schema(SchemaArgs),
    /// Print the normalized schema as annotated source.
    Emit(EmitArgs),
    /// Render the design with the external engine and write the artifact.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct SchemaArgs {
    /// Annotated design source.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Pretty-print the JSON.
    #[arg(long)]
    pretty: bool,
}

#[derive(Parser, Debug)]
struct EmitArgs {
    /// Annotated design source.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Annotated design source.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output artifact path. Its extension selects the engine's output format.
    #[arg(long)]
    out: PathBuf,

    /// Parameter override, repeatable.
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_override)]
    set: Vec<(String, String)>,

    /// Quality tier to render at.
    #[arg(long, value_enum, default_value_t = TierChoice::Preview)]
    tier: TierChoice,

    /// Engine program (defaults to `openscad` on PATH).
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Orchestrator config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Library directory made visible to the engine, repeatable.
    #[arg(long = "lib", value_name = "DIR")]
    library_paths: Vec<PathBuf>,

    /// File included by the design, relative to the input's directory, repeatable.
    #[arg(long = "aux", value_name = "PATH")]
    auxiliary_files: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TierChoice {
    Preview,
    Full,
}

impl From<TierChoice> for Tier {
    fn from(t: TierChoice) -> Self {
        match t {
            TierChoice::Preview => Tier::Preview,
            TierChoice::Full => Tier::Full,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Schema(args) => cmd_schema(args),
        Command::Emit(args) => cmd_emit(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn parse_override(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, value)) if !id.trim().is_empty() => {
            Ok((id.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected ID=VALUE, got '{s}'")),
    }
}

fn read_design(path: &Path) -> anyhow::Result<(String, paramcad::ParsedSchema)> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let parsed =
        paramcad::parse_bytes(&bytes).with_context(|| format!("parse '{}'", path.display()))?;
    let source = String::from_utf8(bytes).context("source is not UTF-8")?;
    Ok((source, parsed))
}

fn report(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!("{d}");
    }
}

fn cmd_schema(args: SchemaArgs) -> anyhow::Result<()> {
    let (_, parsed) = read_design(&args.in_path)?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&parsed)
    } else {
        serde_json::to_string(&parsed)
    }
    .context("serialize schema JSON")?;
    println!("{json}");
    Ok(())
}

fn cmd_emit(args: EmitArgs) -> anyhow::Result<()> {
    let (_, parsed) = read_design(&args.in_path)?;
    report(&parsed.diagnostics);
    print!("{}", paramcad::emit_source(&parsed.schema));
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (source, parsed) = read_design(&args.in_path)?;
    report(&parsed.diagnostics);

    let config = match &args.config {
        Some(path) => OrchestratorConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => OrchestratorConfig::default(),
    };

    // Overrides become the defaults, so loading the document renders exactly the requested values.
    let mut schema = parsed.schema;
    for (id, raw) in args.set {
        let Some(p) = schema.parameters.iter_mut().find(|p| p.id == id) else {
            anyhow::bail!("unknown parameter '{id}'");
        };
        let requested = ParamValue::String(raw.clone());
        let Some(value) = p.coerce(&requested) else {
            anyhow::bail!("'{raw}' is not a valid value for {:?} parameter '{id}'", p.param_type);
        };
        if let (Some(asked), Some(got)) = (requested.coerce_f64(), value.as_f64())
            && asked != got
        {
            eprintln!("warning: '{id}' = {raw} adjusted to {}", value.to_literal());
        }
        p.default = value;
    }

    let base = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let mut doc = Document::new(source, schema);
    for rel in &args.auxiliary_files {
        let path = base.join(rel);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read auxiliary file '{}'", path.display()))?;
        doc = doc.with_auxiliary_file(rel.to_string_lossy(), bytes);
    }

    let mut engine = CommandEngine::default();
    if let Some(ext) = args.out.extension() {
        engine = engine.with_output_format(ext.to_string_lossy());
    }
    // Jobs run inside scratch directories, so a relative program path must be resolved here.
    let program = match &args.engine {
        Some(p) if p.components().count() > 1 => Some(
            std::fs::canonicalize(p)
                .with_context(|| format!("resolve engine '{}'", p.display()))?,
        ),
        other => other.clone(),
    };
    let assets = EngineAssets {
        program,
        library_paths: args.library_paths.clone(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let output = runtime.block_on(render(doc, engine, config, assets, args.tier.into()))?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, output.artifact.bytes())
        .with_context(|| format!("write artifact '{}'", args.out.display()))?;

    for w in &output.stats.warnings {
        eprintln!("{w}");
    }
    eprintln!(
        "wrote {} ({} bytes, {} ms)",
        args.out.display(),
        output.artifact.len(),
        output.stats.elapsed_ms
    );
    Ok(())
}

async fn render(
    doc: Document,
    engine: CommandEngine,
    config: OrchestratorConfig,
    assets: EngineAssets,
    tier: Tier,
) -> anyhow::Result<RenderOutput> {
    let store = PreviewCache::new(config.cache_capacity);
    let (handle, mut events) = RenderOrchestrator::spawn(engine, store, config, assets);
    handle.load_document(doc)?;
    if tier == Tier::Full {
        handle.request_full_quality()?;
    }

    let result = loop {
        let Some(event) = events.recv().await else {
            anyhow::bail!("render orchestrator stopped unexpectedly");
        };
        match event {
            RenderEvent::StateChanged {
                state: RenderState::Current,
                detail: Some(StateDetail::Rendered(out)),
            } if tier == Tier::Preview => break Ok(out),
            RenderEvent::StateChanged {
                state: RenderState::Error,
                detail: Some(StateDetail::Failure(f)),
            } if tier == Tier::Preview || f.kind == FailureKind::BoundaryInitFailed => break Err(f),
            RenderEvent::FullQuality(result) if tier == Tier::Full => break result,
            RenderEvent::Progress { tier, percent } => {
                tracing::debug!(%tier, percent, "render progress");
            }
            _ => {}
        }
    };
    if handle.shutdown().is_err() {
        tracing::debug!("orchestrator already stopped");
    }
    Ok(result?)
}
