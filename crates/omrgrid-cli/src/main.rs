//! omrgrid CLI — read, grade and analyze photographed answer sheets.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use omrgrid::homography::WarpInterpolation;
use omrgrid::{
    analyze, AnswerKey, AnswerSheet, GradeConfig, Grader, Recognition, ReportConfig,
    SheetTemplate,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "omrgrid")]
#[command(about = "Optical mark recognition for photographed multiple-choice answer sheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize codes and answers on a sheet photo.
    Recognize(CliRecognizeArgs),

    /// Recognize a sheet photo and score it against an answer key.
    Grade {
        #[command(flatten)]
        recognize: CliRecognizeArgs,

        /// Answer key (JSON, as written by `make-key`).
        #[arg(long)]
        key: PathBuf,
    },

    /// Build an answer key from a photo of a key sheet.
    MakeKey(CliRecognizeArgs),

    /// Item analysis over recognized sheets of one version.
    Analyze(CliAnalyzeArgs),

    /// Print the parsed sheet layout.
    TemplateInfo {
        /// Path to the sheet layout template.
        #[arg(long)]
        template: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliRecognizeArgs {
    /// Path to the input photo.
    #[arg(long)]
    image: PathBuf,

    /// Path to the sheet layout template.
    #[arg(long)]
    template: PathBuf,

    /// Grading configuration (JSON); fields left out keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum kernel score for a bubble to count as marked.
    #[arg(long)]
    mark_threshold: Option<f32>,

    /// Resampling used when warping the photo onto the template canvas.
    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    /// Exam code reserved for answer-key sheets.
    #[arg(long)]
    key_code: Option<u16>,

    /// Output path (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Answer key (JSON).
    #[arg(long)]
    key: PathBuf,

    /// Recognized sheets (JSON files from `recognize`/`grade`, or arrays of sheets).
    #[arg(long, num_args = 1.., required = true)]
    sheets: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = DelimiterArg::Tab)]
    delimiter: DelimiterArg,

    /// Digits after the decimal point.
    #[arg(long, default_value = "2")]
    decimals: usize,

    /// Placeholder for undefined statistics.
    #[arg(long, default_value = "---")]
    undefined: String,

    /// Also write the full report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Output path for the table. Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterpolationArg {
    Nearest,
    Bilinear,
}

impl InterpolationArg {
    fn to_core(self) -> WarpInterpolation {
        match self {
            Self::Nearest => WarpInterpolation::Nearest,
            Self::Bilinear => WarpInterpolation::Bilinear,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DelimiterArg {
    Tab,
    Comma,
}

impl DelimiterArg {
    fn as_char(self) -> char {
        match self {
            Self::Tab => '\t',
            Self::Comma => ',',
        }
    }
}

/// Sheet files accepted by `analyze`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum SheetFile {
    Recognition(Box<Recognition>),
    Sheet(AnswerSheet),
    Batch(Vec<AnswerSheet>),
}

impl SheetFile {
    fn into_sheets(self) -> Vec<AnswerSheet> {
        match self {
            Self::Recognition(r) => vec![r.sheet],
            Self::Sheet(s) => vec![s],
            Self::Batch(v) => v,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Recognize(args) => run_recognize(&args),
        Commands::Grade { recognize, key } => run_grade(&recognize, &key),
        Commands::MakeKey(args) => run_make_key(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::TemplateInfo { template } => run_template_info(&template),
    }
}

// ── shared ─────────────────────────────────────────────────────────────

fn read_text(path: &Path, what: &str) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read {} {}: {}", what, path.display(), e).into()
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> CliResult<T> {
    let text = read_text(path, what)?;
    serde_json::from_str(&text).map_err(|e| -> CliError {
        format!("Invalid {} {}: {}", what, path.display(), e).into()
    })
}

fn load_template(path: &Path) -> CliResult<SheetTemplate> {
    let text = read_text(path, "template")?;
    SheetTemplate::parse(&text).map_err(|e| -> CliError {
        format!("Invalid template {}: {}", path.display(), e).into()
    })
}

fn write_output(out: Option<&Path>, text: &str) -> CliResult<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(out: Option<&Path>, value: &T) -> CliResult<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_output(out, &json)
}

impl CliRecognizeArgs {
    fn to_config(&self) -> CliResult<GradeConfig> {
        let mut config = match &self.config {
            Some(path) => read_json::<GradeConfig>(path, "config")?,
            None => GradeConfig::default(),
        };
        if let Some(t) = self.mark_threshold {
            config.classifier.mark_threshold = t;
        }
        if let Some(i) = self.interpolation {
            config.rectify.interpolation = i.to_core();
        }
        if let Some(code) = self.key_code {
            if code > 999 {
                return Err(format!("--key-code must be at most 999, got {}", code).into());
            }
            config.key_exam_code = code;
        }
        Ok(config)
    }

    fn grader(&self) -> CliResult<Grader> {
        let template = load_template(&self.template)?;
        Ok(Grader::with_config(template, self.to_config()?))
    }

    fn load_image(&self) -> CliResult<image::DynamicImage> {
        tracing::info!("Loading image: {}", self.image.display());
        image::open(&self.image).map_err(|e| -> CliError {
            format!("Failed to open image {}: {}", self.image.display(), e).into()
        })
    }
}

// ── recognize ──────────────────────────────────────────────────────────

fn run_recognize(args: &CliRecognizeArgs) -> CliResult<()> {
    let grader = args.grader()?;
    let img = args.load_image()?;
    let rec = grader.recognize(&img)?;

    tracing::info!(
        "Exam {:03}, version {:03}, {} questions, {} marked bubbles",
        rec.sheet.exam_code(),
        rec.sheet.version_code(),
        rec.sheet.answers().len(),
        rec.n_marked()
    );
    write_json(args.out.as_deref(), &rec)
}

// ── grade ──────────────────────────────────────────────────────────────

fn run_grade(args: &CliRecognizeArgs, key_path: &Path) -> CliResult<()> {
    let grader = args.grader()?;
    let key: AnswerKey = read_json(key_path, "answer key")?;
    let img = args.load_image()?;
    let rec = grader.grade(&img, &key)?;

    tracing::info!(
        "Exam {:03}: {}/{} correct",
        rec.sheet.exam_code(),
        rec.sheet.total(),
        key.len()
    );
    write_json(args.out.as_deref(), &rec)
}

// ── make-key ───────────────────────────────────────────────────────────

fn run_make_key(args: &CliRecognizeArgs) -> CliResult<()> {
    let grader = args.grader()?;
    let img = args.load_image()?;
    let key = grader.recognize_key(&img)?;

    let letters: String = key.correct.iter().map(|o| o.as_char()).collect();
    tracing::info!("Key for version {:03}: {}", key.version_code, letters);
    write_json(args.out.as_deref(), &key)
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let key: AnswerKey = read_json(&args.key, "answer key")?;
    let mut sheets = Vec::new();
    for path in &args.sheets {
        let file: SheetFile = read_json(path, "sheet file")?;
        sheets.extend(file.into_sheets());
    }
    tracing::info!(
        "Analyzing {} sheets against key version {:03}",
        sheets.len(),
        key.version_code
    );

    let config = ReportConfig {
        decimals: args.decimals,
        undefined: args.undefined.clone(),
    };
    let report = analyze(&key, &sheets, &config)?;

    if let Some(path) = &args.json {
        write_json(Some(path), &report)?;
    }
    write_output(args.out.as_deref(), &report.to_delimited(args.delimiter.as_char()))
}

// ── template-info ──────────────────────────────────────────────────────

fn run_template_info(path: &Path) -> CliResult<()> {
    let template = load_template(path)?;
    let paper = template.paper();

    println!("omrgrid sheet template {}", path.display());
    println!("  canvas:         {}x{} px", paper.width, paper.height);
    println!(
        "  cell:           {}x{} px, border {} px",
        paper.cell_width, paper.cell_height, paper.cell_border_thickness
    );
    println!("  scale:          {}", paper.scale);
    println!("  questions:      {}", template.question_count());
    for field in template.fields() {
        println!(
            "  {:<14}  anchors v{}..{} h{}..{}  {}x{} cells  first row {}  first column {}",
            field.kind.label(),
            field.start_vertical,
            field.end_vertical,
            field.start_horizontal,
            field.end_horizontal,
            field.row_count,
            field.column_count,
            field.start_row_value,
            field.start_column
        );
    }
    Ok(())
}
