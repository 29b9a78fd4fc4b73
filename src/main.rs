//! zub-dump CLI - snapshot directories, dump them as zip or tar

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zubdump::ops::{dump, dump_stream, snapshot, DumpRequest};
use zubdump::{list_refs, read_ref, read_snapshot, resolve_ref, Error, Repo};

#[derive(Parser)]
#[command(name = "zub-dump")]
#[command(about = "content-addressed snapshots, streamed out as zip or tar archives")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, default_value = ".", env = "ZUB_DUMP_REPO")]
    repo: PathBuf,

    /// more logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// path to create repository at
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// snapshot a directory to a ref
    Snapshot {
        /// source directory
        source: PathBuf,

        /// ref name to store the snapshot under
        #[arg(short = 'r', long)]
        ref_name: String,

        /// snapshot message
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// write a snapshot path as an archive (or a single file as-is)
    Dump {
        /// ref name or snapshot hash
        ref_name: String,

        /// path inside the snapshot
        #[arg(default_value = "/")]
        path: String,

        /// archive format: zip or tar (default from config)
        #[arg(short, long)]
        format: Option<String>,

        /// output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// absolute path archive names are made relative to
        #[arg(long)]
        root: Option<String>,

        /// block cache size in bytes (default from config)
        #[arg(long)]
        cache_size: Option<usize>,
    },

    /// list all refs
    Refs,

    /// show what a ref points at
    ShowRef {
        /// ref name or snapshot hash
        ref_name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// log to stderr so archive bytes on stdout stay clean; RUST_LOG wins
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zubdump={},zub_dump={}", level, level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> zubdump::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            Repo::init(&path)?;
            println!("initialized zub-dump repository at {}", path.display());
        }

        Commands::Snapshot {
            source,
            ref_name,
            message,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let hash = snapshot(&repo, &source, &ref_name, &message)?;
            println!("{}", hash);
        }

        Commands::Dump {
            ref_name,
            path,
            format,
            output,
            root,
            cache_size,
        } => {
            let repo = Repo::open(&cli.repo)?;

            let mut request = DumpRequest::from_config(repo.config())?;
            if let Some(format) = format {
                request.format = format.parse()?;
            }
            if let Some(root) = root {
                request.root = root;
            }
            if let Some(size) = cache_size {
                request.cache_size = size;
            }

            match output {
                Some(output) => dump_to_file(&repo, &ref_name, &path, &output, request)?,
                None => dump_to_stdout(&repo, &ref_name, &path, request)?,
            }
        }

        Commands::Refs => {
            let repo = Repo::open(&cli.repo)?;

            for ref_name in list_refs(&repo)? {
                let hash = read_ref(&repo, &ref_name)?;
                println!("{} {}", hash, ref_name);
            }
        }

        Commands::ShowRef { ref_name } => {
            let repo = Repo::open(&cli.repo)?;
            let hash = resolve_ref(&repo, &ref_name)?;
            let snap = read_snapshot(&repo, &hash)?;

            println!("snapshot {}", hash);
            println!("tree {}", snap.tree);
            for parent in &snap.parents {
                println!("parent {}", parent);
            }
            println!("host {}", snap.hostname);
            println!("source {}", snap.source);
            println!("timestamp {}", snap.timestamp);
            if !snap.message.is_empty() {
                println!();
                println!("{}", snap.message);
            }
        }
    }

    Ok(())
}

fn dump_to_file(
    repo: &Repo,
    ref_name: &str,
    path: &str,
    output: &Path,
    request: DumpRequest,
) -> zubdump::Result<()> {
    let mut file = File::create(output).map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })?;
    dump(repo, ref_name, path, &mut file, request)?;
    file.sync_all().map_err(|source| Error::Io {
        path: output.to_path_buf(),
        source,
    })
}

fn dump_to_stdout(repo: &Repo, ref_name: &str, path: &str, request: DumpRequest) -> zubdump::Result<()> {
    let stdout_err = |source| Error::Io {
        path: PathBuf::from("<stdout>"),
        source,
    };
    let stdout = io::stdout();

    if !request.format.needs_seek() {
        let mut out = stdout.lock();
        dump_stream(repo, ref_name, path, &mut out, request)?;
        return out.flush().map_err(stdout_err);
    }

    // zip patches headers after the fact, so go through a temp file
    let mut spool = tempfile::tempfile().map_err(|source| Error::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    dump(repo, ref_name, path, &mut spool, request)?;
    spool.seek(SeekFrom::Start(0)).map_err(stdout_err)?;

    let mut out = stdout.lock();
    io::copy(&mut spool, &mut out).map_err(stdout_err)?;
    out.flush().map_err(stdout_err)
}
