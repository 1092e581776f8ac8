use anyhow::{Context, Result, bail, format_err};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use encoding::all::encodings;
use encoding::types::Encoding;
use log::{LevelFilter, warn};
use serde::Serialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tabmeta::{FileFormat, ParserSettings, TabMetadata, TabParser};

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq)]
pub enum DumpOutputFormat {
    Json,
    Jsonl,
    Text,
}

/// One line (or block) of output.
#[derive(Serialize)]
struct DumpRecord<'a> {
    path: &'a str,
    format: String,
    #[serde(flatten)]
    metadata: TabMetadata,
}

struct TabDump {
    parser_settings: ParserSettings,
    inputs: Vec<String>,
    num_threads: usize,
    output_format: DumpOutputFormat,
    // It's ok to rely on interior mutability here,
    // since there is only one code flow writing to output which is trivial to verify.
    output: RefCell<Box<dyn Write>>,
    verbosity_level: Option<LevelFilter>,
}

/// Tries to write a line to a given target, aborts program if fails.
macro_rules! try_writeln {
    ($($arg:tt)*) => (
        match writeln!($($arg)*) {
            Ok(_) => {},
            Err(e) => {
                eprintln!("{}", &e);
                exit(1)
            }
        }
    );
}

impl TabDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<String> = matches
            .get_many::<String>("INPUT")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
        {
            Some("jsonl") => DumpOutputFormat::Jsonl,
            Some("text") => DumpOutputFormat::Text,
            _ => DumpOutputFormat::Json,
        };

        let num_threads = matches.get_one::<usize>("num-threads").copied().unwrap_or(0);
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, 0 | 1) => 1,
            (false, _) => {
                eprintln!(
                    "turned on threads, but library was compiled without `multithreading` feature! using fallback sync iterator"
                );
                1
            }
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than  -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        let codec_name = matches
            .get_one::<String>("legacy-codec")
            .context("legacy codec has a default value")?;
        let legacy_codec = *encodings()
            .iter()
            .find(|c| c.name() == codec_name.as_str())
            .ok_or_else(|| format_err!("unknown codec `{codec_name}`"))?;

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => {
                let prompt = !matches.get_flag("no-confirm-overwrite");
                let file = Self::create_output_file(path, prompt).with_context(|| {
                    format!("An error occurred while creating output file at `{path}`")
                })?;
                Box::new(file)
            }
            None => Box::new(io::stdout()),
        };

        Ok(TabDump {
            parser_settings: ParserSettings::new().legacy_codec(legacy_codec),
            inputs,
            num_threads,
            output_format,
            output: RefCell::new(output),
            verbosity_level,
        })
    }

    /// Main entry point for `TabDump`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let results = parse_inputs(&self.inputs, &self.parser_settings, self.num_threads);

        let mut failed = 0;
        for (input, result) in self.inputs.iter().zip(results) {
            match result {
                Ok((format, metadata)) => self.dump_record(input, format, metadata)?,
                Err(e) => {
                    eprintln!("{input}: {e:#}");
                    failed += 1;
                }
            }
        }

        self.output.borrow_mut().flush()?;
        if failed > 0 {
            bail!("{failed} input(s) could not be read");
        }
        Ok(())
    }

    fn dump_record(&self, path: &str, format: FileFormat, metadata: TabMetadata) -> Result<()> {
        let record = DumpRecord {
            path,
            format: format.to_string(),
            metadata,
        };

        match self.output_format {
            DumpOutputFormat::Json => {
                let s = serde_json::to_string_pretty(&record)?;
                try_writeln!(self.output.borrow_mut(), "{s}");
            }
            DumpOutputFormat::Jsonl => {
                let s = serde_json::to_string(&record)?;
                try_writeln!(self.output.borrow_mut(), "{s}");
            }
            DumpOutputFormat::Text => {
                let mut out = self.output.borrow_mut();
                let m = &record.metadata;
                try_writeln!(out, "{}", record.path);
                try_writeln!(out, "  format:  {}", record.format);
                try_writeln!(out, "  version: {}", m.version);
                try_writeln!(out, "  title:   {}", m.title);
                try_writeln!(out, "  artist:  {}", m.artist);
                try_writeln!(out, "  album:   {}", m.album);
                try_writeln!(out, "  tempo:   {}", m.tempo);
                try_writeln!(out, "  tracks:  {}", m.track_count);
                for name in &m.track_names {
                    try_writeln!(out, "    - {name}");
                }
            }
        }
        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }
}

/// Read one input (`-` is stdin) and parse it.
fn parse_input(input: &str, settings: &ParserSettings) -> Result<(FileFormat, TabMetadata)> {
    let parser = if input == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read stdin")?;
        TabParser::from_buffer(buffer)
    } else {
        TabParser::from_path(input)?
    };

    let parser = parser.with_configuration(settings.clone());
    Ok((parser.format(), parser.metadata()))
}

/// Parse every input, preserving input order in the result.
#[cfg(feature = "multithreading")]
fn parse_inputs(
    inputs: &[String],
    settings: &ParserSettings,
    num_threads: usize,
) -> Vec<Result<(FileFormat, TabMetadata)>> {
    use rayon::prelude::*;

    let parse_all = || -> Vec<Result<(FileFormat, TabMetadata)>> {
        inputs
            .par_iter()
            .map(|input| parse_input(input, settings))
            .collect()
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool.install(parse_all),
        Err(e) => {
            warn!("failed to build thread pool ({e}), using the global pool");
            parse_all()
        }
    }
}

#[cfg(not(feature = "multithreading"))]
fn parse_inputs(
    inputs: &[String],
    settings: &ParserSettings,
    _num_threads: usize,
) -> Vec<Result<(FileFormat, TabMetadata)>> {
    inputs
        .iter()
        .map(|input| parse_input(input, settings))
        .collect()
}

fn main() {
    let codec_names: Vec<&'static str> = encodings()
        .iter()
        .filter(|&e| e.raw_decoder().is_ascii_compatible())
        .map(|e| e.name())
        .collect();

    let matches = Command::new("Tablature metadata parser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to extract metadata from Guitar Pro files (GP3-GP5, GPX, GP7+)")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .num_args(1..)
                .help("Files to parse, `-` reads from stdin."),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .default_value("0")
                .value_parser(clap::value_parser!(usize))
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["json", "jsonl", "text"])
                .default_value("json")
                .help("Sets the output format")
                .long_help(
                    "Sets the output format:
    \"json\"  - one pretty printed object per file.
    \"jsonl\" - one compact object per line.
    \"text\"  - a human readable block per file.",
                ),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                     Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                     Will create parent directories if needed.",
                ),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("legacy-codec")
                .long("legacy-codec")
                .value_parser(PossibleValuesParser::new(codec_names))
                .default_value(encoding::all::GBK.name())
                .help("Codec tried for header strings that are not valid UTF-8, before falling back to Latin-1."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace."),
        )
        .get_matches();

    let app = match TabDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:#}");
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{e:#}");
        exit(1)
    }
}
