use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing::level_filters::LevelFilter;

use autovot::autovot::{AutoVot, reintegrate_files};
use autovot::classifier::ExternalTools;
use autovot::inputs::{SourcePair, resolve_pairs, resolve_textgrid_pairs};
use autovot::instance::FrontEndFiles;
use autovot::logging;
use autovot::opts::{
    CrossValidation, DEFAULT_PREDICTION_TIER, DecodeOpts, MarkFilter, TierDefinitions, TrainOpts,
};
use autovot::output_type::OutputType;
use autovot::performance::{PerformanceReport, VotPair, collect_pairs};
use autovot::textgrid::{self, Tier};

fn main() -> Result<()> {
    let params = Params::parse();
    logging::init(params.logging_level.into());

    match params.command {
        Command::ExtractFeatures(cmd) => extract_features(cmd, params.logging_level),
        Command::Train(cmd) => train(cmd, params.logging_level),
        Command::Decode(cmd) => decode(cmd, params.logging_level),
        Command::Reintegrate(cmd) => reintegrate(cmd),
        Command::Tiers(cmd) => tiers(cmd),
        Command::Performance(cmd) => performance(cmd),
    }
}

#[derive(Parser, Debug)]
#[command(name = "autovot")]
#[command(about = "Automatic VOT measurement on Praat TextGrids")]
struct Params {
    /// Verbosity of this program and of the external programs it runs.
    #[arg(long = "logging-level", value_enum, default_value_t = LogLevel::Info, global = true)]
    pub logging_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare front-end files for a set of TextGrids and extract acoustic features.
    ExtractFeatures(ExtractFeaturesCmd),

    /// Train a classifier from manually labeled VOTs.
    Train(TrainCmd),

    /// Predict VOTs and append them to each TextGrid as a new tier.
    Decode(DecodeCmd),

    /// Append predictions made from previously extracted features to a TextGrid.
    Reintegrate(ReintegrateCmd),

    /// List the tiers of a TextGrid, or the labeled intervals of one tier.
    Tiers(TiersCmd),

    /// Compare predicted VOTs against manually labeled ones.
    Performance(PerformanceCmd),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Audio and annotations: a WAV file and a TextGrid, or two list files with one path per line.
#[derive(Args, Debug)]
struct SourceArgs {
    /// WAV file (16 kHz, 16-bit, mono) or a file listing WAV files.
    pub audio: PathBuf,

    /// TextGrid file or a file listing TextGrid files, in the same order as the audio.
    pub textgrid: PathBuf,
}

impl SourceArgs {
    fn pairs(&self) -> Result<Vec<SourcePair>> {
        resolve_pairs(&self.audio, &self.textgrid).with_context(|| {
            format!(
                "unable to pair {} with {}",
                self.audio.display(),
                self.textgrid.display()
            )
        })
    }
}

#[derive(Args, Debug)]
struct TierArgs {
    /// Tier holding manually labeled VOTs.
    #[arg(long = "vot-tier")]
    pub vot_tier: Option<String>,

    /// Only VOT intervals with this mark are used; "*" means any non-blank mark.
    #[arg(long = "vot-mark", default_value = "*")]
    pub vot_mark: String,

    /// Tier holding windows to search. With --vot-tier as well, both contribute instances.
    #[arg(long = "window-tier")]
    pub window_tier: Option<String>,

    /// Only window intervals with this mark are used; "*" means any non-blank mark.
    #[arg(long = "window-mark", default_value = "*")]
    pub window_mark: String,

    /// Window start relative to the VOT start, in milliseconds.
    #[arg(long = "window-min", default_value_t = -50.0, allow_hyphen_values = true)]
    pub window_min_ms: f64,

    /// Window end relative to the VOT end, in milliseconds.
    #[arg(long = "window-max", default_value_t = 800.0, allow_hyphen_values = true)]
    pub window_max_ms: f64,

    /// Use at most this many instances per file (0 uses all of them).
    #[arg(long = "max-num-instances", default_value_t = 0)]
    pub max_num_instances: usize,
}

impl TierArgs {
    fn definitions(&self) -> Result<TierDefinitions> {
        let defs = TierDefinitions {
            vot_tier: self.vot_tier.clone(),
            vot_mark: MarkFilter::from(self.vot_mark.as_str()),
            window_tier: self.window_tier.clone(),
            window_mark: MarkFilter::from(self.window_mark.as_str()),
            window_min_offset: self.window_min_ms / 1000.0,
            window_max_offset: self.window_max_ms / 1000.0,
            max_instances_per_file: self.max_num_instances,
        };
        defs.validate()?;
        Ok(defs)
    }
}

#[derive(Args, Debug)]
struct ToolArgs {
    #[arg(long = "front-end", default_value = "VotFrontEnd2")]
    pub front_end: PathBuf,

    #[arg(long = "trainer", default_value = "VotTrain")]
    pub trainer: PathBuf,

    #[arg(long = "decoder", default_value = "VotDecode")]
    pub decoder: PathBuf,

    /// Shortest VOT the decoder may predict (milliseconds).
    #[arg(long = "min-vot-length", default_value_t = 15)]
    pub min_vot_length: u32,

    /// Longest VOT the decoder may predict (milliseconds).
    #[arg(long = "max-vot-length", default_value_t = 250)]
    pub max_vot_length: u32,
}

impl ToolArgs {
    fn tools(&self, level: LogLevel) -> ExternalTools {
        ExternalTools {
            front_end: self.front_end.clone(),
            trainer: self.trainer.clone(),
            decoder: self.decoder.clone(),
            verbosity: level.as_str().to_owned(),
            min_vot_length: self.min_vot_length,
            max_vot_length: self.max_vot_length,
            ..ExternalTools::default()
        }
    }
}

#[derive(Args, Debug)]
struct ExtractFeaturesCmd {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Front-end input file to write.
    pub input_file: PathBuf,

    /// Feature-file list to write.
    pub feature_list: PathBuf,

    /// Labels file the front end writes.
    pub labels: PathBuf,

    /// Directory for the per-instance feature files.
    pub features_dir: PathBuf,

    #[command(flatten)]
    pub tiers: TierArgs,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Args, Debug)]
struct TrainCmd {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Where to write the trained model.
    pub model: PathBuf,

    #[command(flatten)]
    pub tiers: TierArgs,

    /// Hold out 20% of the training instances for cross-validation.
    #[arg(long = "cv-auto", conflicts_with = "cv_textgrid")]
    pub cv_auto: bool,

    /// WAV file or list of WAV files used for cross-validation.
    #[arg(long = "cv-audio", requires = "cv_textgrid")]
    pub cv_audio: Option<PathBuf>,

    /// TextGrid file or list of TextGrids used for cross-validation.
    #[arg(long = "cv-textgrid", requires = "cv_audio")]
    pub cv_textgrid: Option<PathBuf>,

    /// Keep intermediate files in this directory instead of a temporary one.
    #[arg(long = "work-dir")]
    pub work_dir: Option<PathBuf>,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Args, Debug)]
struct DecodeCmd {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Trained model.
    pub model: PathBuf,

    #[command(flatten)]
    pub tiers: TierArgs,

    /// Name of the tier the predictions are written to.
    #[arg(long = "tier-name", default_value = DEFAULT_PREDICTION_TIER)]
    pub tier_name: String,

    /// Add the prediction tier even if a tier with that name already exists.
    #[arg(long = "ignore-existing-tiers", default_value_t = false)]
    pub ignore_existing_tiers: bool,

    /// Also write one record per predicted VOT to this file ("-" for stdout).
    #[arg(long = "output")]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'o',
        long = "output-type",
        value_enum,
        default_value_t = OutputType::Csv
    )]
    pub output_type: OutputType,

    /// Keep each file's working directory for inspection.
    #[arg(long = "keep-work-dir", default_value_t = false)]
    pub keep_work_dir: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Args, Debug)]
struct ReintegrateCmd {
    /// TextGrid to append the predictions to (rewritten in place).
    pub textgrid: PathBuf,

    /// Front-end input file the features were extracted from.
    pub input_file: PathBuf,

    /// Decoder predictions, one line per instance.
    pub predictions: PathBuf,

    #[arg(long = "tier-name", default_value = DEFAULT_PREDICTION_TIER)]
    pub tier_name: String,

    #[arg(long = "ignore-existing-tiers", default_value_t = false)]
    pub ignore_existing_tiers: bool,
}

#[derive(Args, Debug)]
struct TiersCmd {
    pub textgrid: PathBuf,

    /// Print the labeled intervals of this tier instead of the tier names.
    #[arg(long = "tier")]
    pub tier: Option<String>,
}

#[derive(Args, Debug)]
struct PerformanceCmd {
    /// Manually labeled TextGrid, or a list of them.
    pub labeled: PathBuf,

    /// Predicted TextGrid, or a list of them (may be the same files as the labeled ones).
    pub predicted: PathBuf,

    pub labeled_tier: String,
    pub predicted_tier: String,

    /// Dump every labeled/predicted pair to this CSV file.
    #[arg(long = "csv-file")]
    pub csv_file: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

fn extract_features(cmd: ExtractFeaturesCmd, level: LogLevel) -> Result<()> {
    let pairs = cmd.sources.pairs()?;
    let defs = cmd.tiers.definitions()?;
    let files = FrontEndFiles {
        input: cmd.input_file,
        feature_list: cmd.feature_list,
        labels: cmd.labels,
        features_dir: cmd.features_dir,
    };

    let autovot = AutoVot::new(cmd.tools.tools(level));
    let extraction = autovot.extract_features(&pairs, &defs, &files)?;
    info!(instances = extraction.instances, "feature extraction finished");
    extraction.problems.log_summary();
    Ok(())
}

fn train(cmd: TrainCmd, level: LogLevel) -> Result<()> {
    let pairs = cmd.sources.pairs()?;
    let defs = cmd.tiers.definitions()?;
    if defs.uses_window_tier() {
        bail!("training needs manually labeled VOTs: use --vot-tier without --window-tier");
    }

    let cross_validation = match (&cmd.cv_audio, &cmd.cv_textgrid) {
        (Some(audio), Some(textgrid)) => CrossValidation::Files(
            resolve_pairs(audio, textgrid).context("unable to read cross-validation files")?,
        ),
        _ if cmd.cv_auto => CrossValidation::Auto,
        _ => CrossValidation::None,
    };
    let opts = TrainOpts {
        cross_validation,
        work_dir: cmd.work_dir,
    };

    let autovot = AutoVot::new(cmd.tools.tools(level));
    let report = autovot.train(&pairs, &defs, &cmd.model, &opts)?;
    info!(
        trained_on = report.trained_on,
        held_out = report.held_out,
        model = %cmd.model.display(),
        "training finished"
    );
    report.problems.log_summary();
    Ok(())
}

fn decode(cmd: DecodeCmd, level: LogLevel) -> Result<()> {
    let pairs = cmd.sources.pairs()?;
    let defs = cmd.tiers.definitions()?;
    let opts = DecodeOpts {
        tier_name: cmd.tier_name,
        allow_duplicate_tier: cmd.ignore_existing_tiers,
        keep_work_dir: cmd.keep_work_dir || matches!(level, LogLevel::Debug),
    };

    let autovot = AutoVot::new(cmd.tools.tools(level));
    let report = match cmd.output.as_deref() {
        None => autovot.decode(&pairs, &defs, &cmd.model, &opts, None)?,
        Some(path) if path == Path::new("-") => {
            let stdout = io::stdout();
            autovot.decode_to_writer(&pairs, &defs, &cmd.model, &opts, cmd.output_type, stdout.lock())?
        }
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create {}", path.display()))?;
            autovot.decode_to_writer(&pairs, &defs, &cmd.model, &opts, cmd.output_type, file)?
        }
    };

    report.problems.log_summary();
    Ok(())
}

fn reintegrate(cmd: ReintegrateCmd) -> Result<()> {
    let opts = DecodeOpts {
        tier_name: cmd.tier_name,
        allow_duplicate_tier: cmd.ignore_existing_tiers,
        ..DecodeOpts::default()
    };
    let done = reintegrate_files(&cmd.textgrid, &cmd.input_file, &cmd.predictions, &opts)
        .with_context(|| format!("unable to add predictions to {}", cmd.textgrid.display()))?;
    info!(outcome = ?done.outcome, predictions = done.vots.len(), "reintegration finished");
    Ok(())
}

fn tiers(cmd: TiersCmd) -> Result<()> {
    let grid = textgrid::read(&cmd.textgrid)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cmd.tier {
        None => {
            for tier in grid.tiers() {
                match tier {
                    Tier::Interval(_) => writeln!(out, "{}", tier.name())?,
                    Tier::Point(_) => writeln!(out, "{} ({})", tier.name(), tier.kind())?,
                }
            }
        }
        Some(name) => {
            for interval in grid.interval_tier(&name)?.iter().filter(|i| i.is_labeled()) {
                writeln!(
                    out,
                    "{} {} {}",
                    interval.min_time, interval.max_time, interval.mark
                )?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn performance(cmd: PerformanceCmd) -> Result<()> {
    let files = resolve_textgrid_pairs(&cmd.labeled, &cmd.predicted)?;
    let (pairs, problems) = collect_pairs(&files, &cmd.labeled_tier, &cmd.predicted_tier);
    if pairs.is_empty() {
        problems.log_summary();
        bail!("no labeled/predicted VOT pairs to compare");
    }

    let report = PerformanceReport::from_pairs(&pairs);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cmd.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "Compared {} VOTs", report.count)?;
        writeln!(out, "Pearson correlation, labeled vs. predicted:")?;
        writeln!(out, "  left edge (burst onset):    {:.4}", report.onset_correlation)?;
        writeln!(out, "  right edge (voicing onset): {:.4}", report.offset_correlation)?;
        writeln!(out, "  VOT:                        {:.4}", report.vot_correlation)?;
        writeln!(
            out,
            "Absolute VOT difference: mean {:.2} ms, std {:.2} ms",
            report.mean_abs_difference_ms, report.std_abs_difference_ms
        )?;
        writeln!(out, "Share of VOTs differing by less than:")?;
        for agreement in &report.within {
            writeln!(out, "  {:>3} ms: {:.1}%", agreement.threshold_ms, agreement.percent)?;
        }
    }
    out.flush()?;

    if let Some(path) = &cmd.csv_file {
        write_pairs_csv(path, &pairs, &cmd.labeled_tier, &cmd.predicted_tier)
            .with_context(|| format!("unable to write {}", path.display()))?;
    }

    problems.log_summary();
    Ok(())
}

fn write_pairs_csv(path: &Path, pairs: &[VotPair], labeled_tier: &str, predicted_tier: &str) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "filename_labeled,filename_predicted,time_in_labeled,time_in_predicted,tier_in_labeled,tier_in_predicted,vot_labeled,vot_predicted"
    )?;
    for p in pairs {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            p.labeled_file.display(),
            p.predicted_file.display(),
            p.labeled_min,
            p.predicted_min,
            labeled_tier,
            predicted_tier,
            p.labeled_vot(),
            p.predicted_vot()
        )?;
    }
    w.flush()?;
    Ok(())
}
