use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use surat_justifikasi::config::{init_default_config, Settings};
use surat_justifikasi::docx::builder::write_docx;
use surat_justifikasi::fields::FieldMap;
use surat_justifikasi::letter::{read_request, write_letter, STARTER_TEMPLATE};
use surat_justifikasi::progress::ConsoleProgress;
use surat_justifikasi::server;

#[derive(Parser, Debug)]
#[command(name = "surat-justifikasi")]
#[command(about = "Purchase request (.docx) to justification letter (.docx)", long_about = None)]
struct Args {
    /// Write a default surat-justifikasi.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory for --init-config (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config with --init-config
    #[arg(long)]
    force: bool,

    /// Write a starter letter template with every placeholder, then exit
    #[arg(long, value_name = "DOCX")]
    init_template: Option<PathBuf>,

    /// Run the upload/download web server
    #[arg(long)]
    serve: bool,

    /// Listen address for --serve (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Config file path (default: search for surat-justifikasi.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Purchase request .docx
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output letter .docx (default: <input_stem>_surat.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Letter template .docx (overrides config)
    #[arg(short, long, value_name = "DOCX")]
    template: Option<PathBuf>,

    /// Only extract fields and write them as JSON (`-` for stdout)
    #[arg(long, value_name = "JSON")]
    extract_json: Option<PathBuf>,

    /// Fill the template from a field JSON instead of a purchase request
    #[arg(long, value_name = "JSON")]
    fields_json: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surat_justifikasi=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();
    let progress = ConsoleProgress::new(!args.serve);

    if args.init_config {
        let dir = match args.init_config_dir.clone() {
            Some(d) => d,
            None => std::env::current_dir().context("current dir")?,
        };
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    if let Some(path) = args.init_template.as_ref() {
        write_docx(path, &STARTER_TEMPLATE)?;
        eprintln!("Wrote template: {}", path.display());
        return Ok(());
    }

    let mut settings = Settings::load(args.config.clone())?;
    if let Some(t) = args.template.clone() {
        settings.template = t;
    }
    if let Some(b) = args.bind.clone() {
        settings.bind = b;
    }

    if args.serve {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("build tokio runtime")?;
        return runtime.block_on(server::serve(settings));
    }

    if let Some(fields_json) = args.fields_json.as_ref() {
        let output = args
            .output
            .clone()
            .context("--fields-json needs -o/--output")?;
        let bytes = std::fs::read(fields_json)
            .with_context(|| format!("read fields json: {}", fields_json.display()))?;
        let fields: FieldMap = serde_json::from_slice(&bytes).context("parse fields json")?;
        progress.stage("fields", format!("{} from {}", fields.len(), fields_json.display()));
        let report = write_letter(&settings.template, &fields, &output)?;
        progress.list("unfilled", &report.unresolved);
        progress.stage("done", output.display().to_string());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  surat-justifikasi <pr.docx> [-t template.docx] [-o surat.docx]\n  surat-justifikasi --serve\n"
            );
            return Ok(());
        }
    };

    progress.stage("read", input.display().to_string());
    let extraction = read_request(&input)?;
    let missing = extraction.missing();
    progress.stage(
        "extract",
        format!(
            "{} fields, {} item rows, {} price rows",
            extraction.fields.len(),
            extraction.table.items.len(),
            extraction.table.unit_prices.len()
        ),
    );
    progress.list("missing", missing.iter().map(|f| f.key()));

    if let Some(json_path) = args.extract_json.as_ref() {
        let json = serde_json::to_string_pretty(&extraction.fields).context("serialize fields")?;
        if json_path == Path::new("-") {
            println!("{json}");
        } else {
            std::fs::write(json_path, json)
                .with_context(|| format!("write fields json: {}", json_path.display()))?;
            progress.stage("done", json_path.display().to_string());
        }
        return Ok(());
    }

    let output = args.output.unwrap_or_else(|| default_output_for(&input));
    progress.stage("fill", settings.template.display().to_string());
    let report = write_letter(&settings.template, &extraction.fields, &output)?;
    progress.list("unfilled", &report.unresolved);
    progress.stage(
        "done",
        format!("{} ({} replacements)", output.display(), report.replacements),
    );
    Ok(())
}

fn default_output_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_surat.docx"))
}
