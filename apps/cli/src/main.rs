use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use printflow_highlight::{Highlighter, ProcessHighlighter, RegistryHighlighter};
use printflow_printing::{
    ContentResolution, ContentTypeResolver, DeviceGeometry, Document, Orientation, PageSpan,
    PaginationController, PaperSize, RasterSurface, RenderOutcome, Resolution,
};
use printflow_settings::{FileAssociations, SettingsProvider, SettingsSnapshot};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "printflow",
    about = "Resolve, paginate and preview documents for printing",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示檔案的內容類型。 / Show the content type and engine kind for a file.
    Resolve(ResolveArgs),
    /// 分頁並列出每頁範圍。 / Paginate a file and list the range of every page.
    Paginate(PaginateArgs),
    /// 將單頁轉為 PNG 預覽。 / Rasterize one page into a PNG preview.
    Preview(PreviewArgs),
}

#[derive(Args)]
struct HighlighterArgs {
    /// 外部語法標示程式；預設使用內建規則。 / External tokenizer program; the built-in rules are used when omitted.
    #[arg(long, value_name = "PROGRAM")]
    highlighter: Option<PathBuf>,

    /// 傳給外部標示程式的參數。 / Extra argument passed to the tokenizer before the language id.
    #[arg(long = "highlighter-arg", value_name = "ARG", requires = "highlighter")]
    highlighter_args: Vec<String>,
}

impl HighlighterArgs {
    fn build(&self) -> Arc<dyn Highlighter> {
        match &self.highlighter {
            Some(program) => Arc::new(
                ProcessHighlighter::new(program.clone()).with_args(self.highlighter_args.clone()),
            ),
            None => Arc::new(RegistryHighlighter::default()),
        }
    }
}

#[derive(Args)]
struct ResolveArgs {
    /// 檔案路徑或內容類型。 / File path or content type.
    #[arg(value_name = "PATH")]
    input: String,

    #[command(flatten)]
    highlighter: HighlighterArgs,

    /// 以 JSON 輸出。 / Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RenderArgs {
    /// 待列印的檔案。 / Document to paginate.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// JSON 列印設定檔。 / JSON print settings file.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// 紙張大小。 / Paper size.
    #[arg(long, value_enum, default_value_t = PaperChoice::A4)]
    paper: PaperChoice,

    /// 橫向列印。 / Print in landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// 略過副檔名對應，直接指定內容類型。 / Content type or language id, bypassing the association table.
    #[arg(long, value_name = "TYPE")]
    content_type: Option<String>,

    #[command(flatten)]
    highlighter: HighlighterArgs,
}

#[derive(Args)]
struct PaginateArgs {
    #[command(flatten)]
    render: RenderArgs,

    /// 以 JSON 輸出。 / Print the page index as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PreviewArgs {
    #[command(flatten)]
    render: RenderArgs,

    /// 頁碼（從 1 開始）。 / Page to rasterize (1-based).
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// PNG 輸出路徑。 / Output PNG path.
    #[arg(long, value_name = "FILE.png")]
    out: PathBuf,

    /// 預覽解析度。 / Preview resolution in dots per inch.
    #[arg(long, default_value_t = 96.0)]
    dpi: f32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaperChoice {
    A4,
    Letter,
    Legal,
    A3,
}

impl From<PaperChoice> for PaperSize {
    fn from(choice: PaperChoice) -> Self {
        match choice {
            PaperChoice::A4 => PaperSize::A4,
            PaperChoice::Letter => PaperSize::LETTER,
            PaperChoice::Legal => PaperSize::LEGAL,
            PaperChoice::A3 => PaperSize::A3,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let Cli { command } = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async move {
        match command {
            Commands::Resolve(args) => execute_resolve(args).await,
            Commands::Paginate(args) => execute_paginate(args).await,
            Commands::Preview(args) => execute_preview(args).await,
        }
    })
}

async fn execute_resolve(args: ResolveArgs) -> Result<()> {
    let associations = FileAssociations::with_defaults();
    let highlighter = args.highlighter.build();
    let resolution = ContentTypeResolver::new(&associations, highlighter.as_ref())
        .resolve(&args.input)
        .await;
    report_warning(&resolution);

    if args.json {
        let value = json!({
            "input": args.input,
            "content_type": resolution.content_type,
            "kind": resolution.kind.to_string(),
            "warning": resolution.warning,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}\t{}", resolution.content_type, resolution.kind);
    }
    Ok(())
}

async fn execute_paginate(args: PaginateArgs) -> Result<()> {
    let (mut controller, resolution) = open(&args.render).await?;
    let page_count = render(&mut controller).await?;
    let index = controller
        .page_index()
        .context("pagination produced no page index")?;

    if args.json {
        let value = json!({
            "path": args.render.path.display().to_string(),
            "content_type": resolution.content_type,
            "kind": resolution.kind.to_string(),
            "warning": resolution.warning,
            "page_count": page_count,
            "pages": index.spans(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "{}: {} ({})",
            args.render.path.display(),
            resolution.kind,
            resolution.content_type
        );
        println!("pages: {page_count}");
        for (slot, span) in index.spans().iter().enumerate() {
            println!("  page {}: {}", slot + 1, describe_span(span));
        }
    }
    controller.close();
    Ok(())
}

async fn execute_preview(args: PreviewArgs) -> Result<()> {
    let (mut controller, resolution) = open(&args.render).await?;
    let page_count = render(&mut controller).await?;

    let mut surface = RasterSurface::from_geometry(&controller.geometry(), args.dpi);
    controller
        .paint_page(&mut surface, args.page)
        .with_context(|| format!("cannot preview page {}", args.page))?;
    let (width, height) = (surface.width(), surface.height());
    let png = surface.into_png().context("failed to encode PNG")?;
    write_output(&args.out, &png)?;

    println!(
        "Wrote page {} of {} ({}) to {} [{}x{} px]",
        args.page,
        page_count,
        resolution.kind,
        args.out.display(),
        width,
        height
    );
    controller.close();
    Ok(())
}

async fn open(args: &RenderArgs) -> Result<(PaginationController, ContentResolution)> {
    let settings = match &args.settings {
        Some(path) => SettingsSnapshot::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => SettingsSnapshot::default(),
    };
    let provider = SettingsProvider::new(settings);
    let orientation = if args.landscape {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    let geometry =
        DeviceGeometry::from_paper(args.paper.into(), orientation, Resolution::default());

    let associations = FileAssociations::with_defaults();
    let highlighter = args.highlighter.build();
    let (controller, resolution) = match &args.content_type {
        Some(content_type) => {
            let resolution = ContentTypeResolver::new(&associations, highlighter.as_ref())
                .resolve_content_type(content_type)
                .await;
            let document = Document::load(&args.path)?;
            let controller = PaginationController::with_document(
                resolution.kind.clone(),
                highlighter,
                document,
                provider,
                geometry,
            )?;
            (controller, resolution)
        }
        None => {
            PaginationController::open(&args.path, &associations, highlighter, provider, geometry)
                .await?
        }
    };
    report_warning(&resolution);
    debug!(path = %args.path.display(), kind = %resolution.kind, "document_opened");
    Ok((controller, resolution))
}

async fn render(controller: &mut PaginationController) -> Result<u32> {
    match controller.render(None).await? {
        RenderOutcome::Rendered { page_count } => Ok(page_count),
        RenderOutcome::Superseded => bail!("settings changed while rendering"),
    }
}

fn report_warning(resolution: &ContentResolution) {
    if let Some(warning) = &resolution.warning {
        eprintln!("warning: {warning}");
    }
}

fn describe_span(span: &PageSpan) -> String {
    match span {
        PageSpan::Lines(range) => format!("lines {}..{}", range.start, range.end),
        PageSpan::Blocks { start, end } => format!(
            "blocks {}:{}..{}:{}",
            start.block, start.line, end.block, end.line
        ),
    }
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}
