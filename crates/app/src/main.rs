mod console;

use std::fmt;
use std::sync::Arc;

use backend::{ExamApi, ExamFixture, HttpConfig, HttpExamApi, InMemoryExamApi};
use exam_core::model::ExamId;
use services::{Clock, SessionConfig, SessionController};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingExam,
    UnknownArg(String),
    InvalidExamId { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExam => write!(f, "run needs --exam <id> or EXAM_ID"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid --exam value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run  --exam <id> [--duration <minutes>] [--api <url>]");
    eprintln!("  cargo run -p app -- demo [--questions <n>] [--options <n>] [--duration <minutes>] [--seed <n>]");
    eprintln!();
    eprintln!("Defaults for demo:");
    eprintln!("  --questions 10 --options 4 --duration 15");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_URL, EXAM_API_TOKEN, EXAM_ID, RUST_LOG");
    eprintln!("  EXAM_TIMER_POLL_MS, EXAM_PROGRESS_POLL_MS, EXAM_ANSWERS_POLL_MS,");
    eprintln!("  EXAM_TICK_MS, EXAM_CALL_TIMEOUT_MS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Demo,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
struct RunArgs {
    exam: ExamId,
    duration: Option<u32>,
    api_url: Option<String>,
}

impl RunArgs {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_exam: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut exam = env_exam;
        let mut duration = None;
        let mut api_url = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--exam" => exam = Some(require_value(args, "--exam")?),
                "--duration" => duration = Some(require_number(args, "--duration")?),
                "--api" => api_url = Some(require_value(args, "--api")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let raw = exam.ok_or(ArgsError::MissingExam)?;
        let exam = raw
            .trim()
            .parse()
            .map_err(|_| ArgsError::InvalidExamId { raw: raw.clone() })?;
        Ok(Self {
            exam,
            duration,
            api_url,
        })
    }
}

#[derive(Debug, PartialEq)]
struct DemoArgs {
    questions: u32,
    options: u32,
    duration: u32,
    seed: Option<u64>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            questions: 10,
            options: 4,
            duration: 15,
            seed: None,
        }
    }
}

impl DemoArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--questions" => parsed.questions = require_number(args, "--questions")?,
                "--options" => parsed.options = require_number(args, "--options")?,
                "--duration" => parsed.duration = require_number(args, "--duration")?,
                "--seed" => parsed.seed = Some(require_number(args, "--seed")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the exam console.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            log_fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let config = SessionConfig::from_env();
    let clock = Clock::system();
    let mut iter = argv.into_iter();
    let report_usage = |e: ArgsError| {
        eprintln!("{e}");
        print_usage();
        e
    };

    let controller = match cmd {
        Command::Run => {
            let parsed =
                RunArgs::parse(&mut iter, std::env::var("EXAM_ID").ok()).map_err(report_usage)?;
            let mut http = HttpConfig::from_env();
            if let Some(url) = parsed.api_url {
                http.base_url = url;
            }
            let api: Arc<dyn ExamApi> = Arc::new(HttpExamApi::new(http)?);
            tracing::info!(exam_id = %parsed.exam, "starting exam session");
            SessionController::start(api, parsed.exam, parsed.duration, clock, config).await?
        }
        Command::Demo => {
            let parsed = DemoArgs::parse(&mut iter).map_err(report_usage)?;
            let fixture = ExamFixture::generated(parsed.questions, parsed.options, parsed.duration);
            let exam = fixture.exam_id;
            let mut memory = InMemoryExamApi::new(clock.clone()).with_fixture(fixture);
            if let Some(seed) = parsed.seed {
                memory = memory.with_shuffle_seed(seed);
            }
            let api: Arc<dyn ExamApi> = Arc::new(memory);
            tracing::info!(exam_id = %exam, questions = parsed.questions, "starting demo session");
            SessionController::start(api, exam, None, clock, config).await?
        }
    };

    console::drive(controller).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> std::vec::IntoIter<String> {
        raw.iter()
            .map(|s| (*s).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn run_takes_exam_from_flag_over_env() {
        let exam = ExamId::generate();
        let parsed = RunArgs::parse(
            &mut args(&["--exam", &exam.to_string(), "--duration", "20"]),
            Some("not-used".into()),
        )
        .unwrap();
        assert_eq!(parsed.exam, exam);
        assert_eq!(parsed.duration, Some(20));
    }

    #[test]
    fn run_without_exam_is_an_error() {
        assert!(matches!(
            RunArgs::parse(&mut args(&[]), None),
            Err(ArgsError::MissingExam)
        ));
        assert!(matches!(
            RunArgs::parse(&mut args(&["--exam", "nope"]), None),
            Err(ArgsError::InvalidExamId { .. })
        ));
    }

    #[test]
    fn demo_flags_override_defaults() {
        let parsed = DemoArgs::parse(&mut args(&["--questions", "3", "--seed", "7"])).unwrap();
        assert_eq!(parsed.questions, 3);
        assert_eq!(parsed.options, 4);
        assert_eq!(parsed.seed, Some(7));
        assert!(matches!(
            DemoArgs::parse(&mut args(&["--duration"])),
            Err(ArgsError::MissingValue { flag: "--duration" })
        ));
        assert!(matches!(
            DemoArgs::parse(&mut args(&["--options", "x"])),
            Err(ArgsError::InvalidNumber { .. })
        ));
    }
}
