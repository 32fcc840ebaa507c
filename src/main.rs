use anyhow::{Context, Result};
use clap::Parser;
use plotscope::{
    telemetry, ExportConfig, ExportScope, MathBundleLocator, ScopeFlags, SubprocessRenderer, TransformOptions,
};
use serde_json::Value;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "plotscope")]
#[command(about = "Export chart figures (JSON) to static images", long_about = None)]
struct Args {
    /// Figure JSON file; reads stdin when omitted or "-"
    figure: Option<PathBuf>,

    /// Output file; writes to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// png, jpg, jpeg, webp, svg, pdf, eps or json
    #[arg(short, long)]
    format: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    scale: Option<f64>,

    /// JSON file with export defaults and renderer resources
    #[arg(long)]
    config: Option<PathBuf>,

    /// Renderer executable; looked up on PATH when omitted
    #[arg(long)]
    renderer: Option<PathBuf>,

    /// Browser argument for the renderer, repeatable; any given replace the default set
    #[arg(long = "chromium-arg", allow_hyphen_values = true)]
    chromium_args: Vec<String>,

    #[arg(long)]
    plotlyjs: Option<String>,

    #[arg(long)]
    mathjax: Option<String>,

    #[arg(long)]
    topojson: Option<String>,

    #[arg(long)]
    mapbox_access_token: Option<String>,
}

fn main() -> Result<()> {
    telemetry::init_tracing("warn");
    let args = Args::parse();

    let figure = read_figure(args.figure.as_ref()).context("Failed to read figure JSON")?;

    let mut renderer = match args.renderer {
        Some(path) => SubprocessRenderer::new(path),
        None => SubprocessRenderer::locate()?,
    };
    if !args.chromium_args.is_empty() {
        renderer = renderer.with_chromium_args(args.chromium_args);
    }

    let flags = ScopeFlags {
        script_bundle: args.plotlyjs,
        math_bundle: args.mathjax,
        geo_bundle: args.topojson,
        access_token: args.mapbox_access_token,
    };
    let locator = MathBundleLocator::for_renderer(Some(renderer.executable()));
    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ExportConfig::from_json_with(&text, flags, &locator).context("Invalid config file")?
        }
        None => ExportConfig::with_locator(flags, &locator),
    };
    let mut scope = ExportScope::new(config, renderer);

    let options = TransformOptions {
        format: args.format,
        width: args.width,
        height: args.height,
        scale: args.scale,
    };
    let bytes = scope
        .transform_value(&figure, &options)
        .context("Failed to export figure")?;
    scope.shutdown();

    match args.output {
        Some(path) => fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .context("Failed to write image to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}

fn read_figure(path: Option<&PathBuf>) -> Result<Value> {
    let text = match path {
        Some(p) if p.as_os_str() != "-" => fs::read_to_string(p)?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&text)?)
}
