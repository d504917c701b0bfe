use std::io::Write;
use std::path::PathBuf;
use std::process;

use chrono::{Local, LocalResult, TimeZone};
use clap::{Parser, Subcommand};
use fatkit_core::{FatError, FileInfo};
use fatkit_filesystems::FatVolume;

#[derive(Parser)]
#[command(name = "fatkit")]
#[command(about = "Inspect and edit FAT12/16/32 filesystem images", long_about = None)]
struct Cli {
    /// Path to the filesystem image
    image: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file's contents to stdout
    Read {
        /// Backslash-separated path inside the image
        path: String,
    },
    /// List a directory
    View {
        /// Backslash-separated path inside the image
        path: String,
    },
    /// Create a file, or an empty directory with -d
    Create {
        /// Backslash-separated path inside the image
        path: String,
        /// Contents of the new file; required unless -d is given
        payload: Option<String>,
        /// Create a directory instead of a file
        #[arg(short = 'd', long = "directory")]
        directory: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(exit_code(&e));
    }
}

/// 2 for I/O failures, 3 for filesystem-level failures.
fn exit_code(err: &FatError) -> i32 {
    match err {
        FatError::Io(_) => 2,
        _ => 3,
    }
}

fn run(cli: Cli) -> Result<(), FatError> {
    let mut volume = FatVolume::mount(&cli.image)?;

    match cli.command {
        Commands::Read { path } => {
            let data = volume.read_file(&path)?;
            std::io::stdout().write_all(&data)?;
        }
        Commands::View { path } => {
            for info in volume.read_directory(&path)? {
                print_entry(&info);
            }
        }
        Commands::Create {
            path,
            payload,
            directory,
        } => {
            if directory {
                volume.create_directory(&path)?;
            } else {
                let payload = match payload {
                    Some(p) => p,
                    None => {
                        eprintln!("error: missing payload for \"create {}\"", path);
                        process::exit(1);
                    }
                };
                volume.create_file(&path, payload.as_bytes())?;
            }
        }
    }

    Ok(())
}

fn print_entry(info: &FileInfo) {
    print!("Name: {}", info.name);
    if info.is_directory {
        println!(" (directory)");
    } else {
        println!("\n  size: {} bytes", info.size);
    }
    println!("  created: {}", format_timestamp(info.created));
    println!("  last modified: {}", format_timestamp(info.modified));
    println!("  last accessed: {}", format_timestamp(info.accessed));
    println!();
}

fn format_timestamp(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0) {
        LocalResult::Single(dt) => dt.format("%a %b %e %H:%M:%S %Y").to_string(),
        _ => "-".to_string(),
    }
}
