//! cpmtool - Work with CP/M disk images from the host.
//!
//! Usage:
//!   cpmtool [-f format] <command> image [args...]
//!
//! Examples:
//!   cpmtool ls disk.img                     # List all files by user
//!   cpmtool -f pcw ls -l disk.dsk 0:*.com   # Long listing of user 0 .COM files
//!   cpmtool cp disk.img 0:stat.com .        # Copy a file out
//!   cpmtool cp disk.img notes.txt 3:        # Copy a file in, to user 3
//!   cpmtool chattr disk.img rs 0:ccp.com    # Make a file read-only and system
//!   cpmtool diskdef --json ibm-3740         # Show a resolved geometry

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cpmfs_core::format::AMSTRAD;

/// Options shared by every subcommand.
#[derive(clap::Args, Debug)]
pub struct Global {
    /// Disk format from the diskdefs file, or `amstrad` to read the boot record
    #[arg(short, long, global = true, default_value = "ibm-3740")]
    pub format: String,

    /// diskdefs file to use instead of the usual search path
    #[arg(long, global = true)]
    pub diskdefs: Option<PathBuf>,

    /// Device options, e.g. `physical` for cylinder/head ordered images
    #[arg(short = 'T', long, global = true)]
    pub options: Option<String>,

    /// Log engine activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CP/M disk image tool
#[derive(Parser, Debug)]
#[command(name = "cpmtool")]
#[command(about = "List, copy and modify files on CP/M disk images")]
struct Args {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files
    Ls {
        /// Show mode, size and modification time
        #[arg(short = 'l', long = "long")]
        long: bool,
        /// Show file attributes
        #[arg(short, long)]
        attrs: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        image: PathBuf,
        /// `user:name.ext` patterns, `*` and `?` allowed
        patterns: Vec<String>,
    },

    /// Show block and directory usage
    Df {
        #[arg(long)]
        json: bool,
        image: PathBuf,
    },

    /// Copy files out of (`user:file... host`) or into (`host... user:[file]`) an image
    Cp {
        /// Text mode: CR LF line ends, ^Z end of file
        #[arg(short, long)]
        text: bool,
        /// Keep modification times on files copied out
        #[arg(short, long)]
        preserve: bool,
        image: PathBuf,
        /// Sources followed by the destination
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Delete files
    Rm {
        image: PathBuf,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Rename a file
    Mv {
        image: PathBuf,
        old: String,
        new: String,
    },

    /// Change the mode of files; only the owner write bit is kept
    Chmod {
        image: PathBuf,
        /// Octal mode
        mode: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Set attributes: 1-4 (F1-F4), r (read-only), s (system), a (archive)
    Chattr {
        image: PathBuf,
        attrs: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Show a disk definition and its derived geometry
    Diskdef {
        #[arg(long)]
        json: bool,
        name: String,
        /// Image to read the boot record from, for `amstrad`
        image: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let g = &args.global;
    let result = match args.command {
        Command::Ls {
            long,
            attrs,
            json,
            image,
            patterns,
        } => {
            let style = if json {
                commands::ListStyle::Json
            } else if long {
                commands::ListStyle::Long
            } else if attrs {
                commands::ListStyle::Attributes
            } else {
                commands::ListStyle::Plain
            };
            commands::ls(g, &image, &patterns, style)
        }
        Command::Df { json, image } => commands::df(g, &image, json),
        Command::Cp {
            text,
            preserve,
            image,
            mut paths,
        } => match paths.pop() {
            Some(dest) => commands::cp(g, &image, &paths, &dest, text, preserve),
            None => Err("nothing to copy".into()),
        },
        Command::Rm { image, files } => commands::rm(g, &image, &files),
        Command::Mv { image, old, new } => commands::mv(g, &image, &old, &new),
        Command::Chmod { image, mode, files } => commands::chmod(g, &image, &mode, &files),
        Command::Chattr {
            image,
            attrs,
            files,
        } => commands::chattr(g, &image, &attrs, &files),
        Command::Diskdef { json, name, image } => {
            if name == AMSTRAD && image.is_none() {
                Err("the amstrad format needs an image to read".into())
            } else {
                commands::diskdef(g, &name, image.as_deref(), json)
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cpmtool: {e}");
            ExitCode::FAILURE
        }
    }
}
