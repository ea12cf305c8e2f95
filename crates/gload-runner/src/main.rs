//! gload - command line G-code loader for GRBL controllers.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use gload_runner::{
    check_program, LineReader, LoaderConfig, LoaderResult, SerialTransport, StreamOptions,
    StreamingController,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Exit code for usage, input and setup failures.
const EXIT_USAGE: u8 = 1;

/// Stream a G-code file to a GRBL controller, one acknowledged line at a time.
#[derive(Parser, Debug)]
#[command(name = "gload", version)]
struct Cli {
    /// Unlock the machine if it is in alarm state
    #[arg(short = 'a', long)]
    alarm: bool,

    /// Baud rate (default 115200)
    #[arg(short = 'b', long)]
    baud: Option<u32>,

    /// Only check the given G-code file and exit
    #[arg(short = 'c', long)]
    check: bool,

    /// GRBL device (default /dev/ttyUSB0)
    #[arg(short = 'd', long)]
    device: Option<String>,

    /// Keep sending when GRBL reports an error
    #[arg(short = 'i', long)]
    ignore: bool,

    /// Do not wait for the machine after the last line is sent
    #[arg(short = 'n', long = "no-wait")]
    no_wait: bool,

    /// Reset/stop the running job before sending
    #[arg(short = 'r', long)]
    reset: bool,

    /// YAML file with device and timing settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// G-code file to send
    file: PathBuf,
}

impl Cli {
    /// Load the configuration file, if any, and apply command line overrides.
    fn resolve_config(&self) -> LoaderResult<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_file(path)?,
            None => LoaderConfig::default(),
        };
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        config.validate()?;
        Ok(config)
    }

    fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            unlock_alarm: self.alarm,
            ignore_errors: self.ignore,
            no_wait: self.no_wait,
            reset: self.reset,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    init_logging(cli.verbose);
    debug!("{:?}", cli);

    ExitCode::from(run(&cli))
}

fn run(cli: &Cli) -> u8 {
    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_USAGE;
        }
    };

    let file = match File::open(&cli.file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("cannot open file {}: {}", cli.file.display(), e);
            return EXIT_USAGE;
        }
    };
    let mut input = LineReader::for_line_length(BufReader::new(file), config.max_line_len);

    let stdout = io::stdout();

    if cli.check {
        let mut out = stdout.lock();
        let _ = writeln!(out, "check only - no transfer to machine!\n");
        return match check_program(&mut input, &mut out, config.max_line_len) {
            Ok(_) => {
                let _ = writeln!(out, "\ncheck done");
                0
            }
            Err(e) => {
                error!("Check failed: {}", e);
                eprintln!("{}", e);
                EXIT_USAGE
            }
        };
    }

    let transport = match SerialTransport::open_configured(&config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_USAGE;
        }
    };

    let controller = StreamingController::new(
        config,
        cli.stream_options(),
        transport,
        input,
        stdout.lock(),
    );
    let report = controller.run();

    if let Some(hint) = report.outcome.hint() {
        if report.outcome.exit_code() == 0 {
            println!("{}", hint);
        } else {
            eprintln!("{}", hint);
        }
    }

    report.outcome.exit_code()
}
