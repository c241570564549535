//! Laracrypt CLI - Laravel-compatible file encryption
//!
//! Command-line interface for encrypting and decrypting files into the
//! payload format Laravel's encrypter reads and writes.

use clap::{ArgAction, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use laracrypt::Key;
use laracrypt::file_ops::{self, PlaintextFormat};
use laracrypt::keysource::{
    DEFAULT_KEY_VAR, EnvFileKeyReader, EnvKeyReader, KeyReader, ReaderKeyReader,
    TerminalKeyReader,
};

#[derive(Parser)]
#[command(name = "laracrypt")]
#[command(version)]
#[command(about = "Laravel-compatible payload encryption.", long_about = None)]
struct Cli {
    /// Read the key from stdin instead of the environment
    #[arg(long, global = true, conflicts_with = "env_file")]
    key_stdin: bool,

    /// Read APP_KEY from this dotenv file (e.g. a Laravel project's .env)
    #[arg(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Environment variable holding the key; prompts on the terminal if unset
    #[arg(long, global = true, value_name = "VAR", default_value = DEFAULT_KEY_VAR)]
    key_env: String,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the payload to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Treat the input as JSON and encrypt it as a serialized value
        #[arg(long)]
        json: bool,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file holding the payload
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the plaintext to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Unserialize the plaintext and write it out as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a new random key in `base64:` form
    GenerateKey,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Encrypt {
            input,
            output,
            json,
        } => {
            let mut reader = get_key_reader(&cli);
            file_ops::encrypt_file(input, output, &mut *reader, format(*json))
        }
        Commands::Decrypt {
            input,
            output,
            json,
        } => {
            let mut reader = get_key_reader(&cli);
            file_ops::decrypt_file(input, output, &mut *reader, format(*json))
        }
        Commands::GenerateKey => {
            println!("{}", Key::generate().to_base64_string().as_str());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format(json: bool) -> PlaintextFormat {
    if json {
        PlaintextFormat::Json
    } else {
        PlaintextFormat::Raw
    }
}

fn get_key_reader(cli: &Cli) -> Box<dyn KeyReader> {
    if cli.key_stdin {
        Box::new(ReaderKeyReader::new(Box::new(std::io::stdin())))
    } else if let Some(path) = &cli.env_file {
        Box::new(EnvFileKeyReader::new(path))
    } else if std::env::var_os(&cli.key_env).is_some() {
        Box::new(EnvKeyReader::new(&cli.key_env))
    } else {
        Box::new(TerminalKeyReader)
    }
}
