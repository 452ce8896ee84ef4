mod logging;
mod workflows_image;

use std::{io, path::PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use logging::Logger;

use workflows_image::{FormatOptions, ImageOptions};

#[derive(Debug, Parser)]
#[command(name = "cardctl")]
#[command(about = "Field logger card image tool")]
struct Cli {
    /// Print storage stack debug logs to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an image with one FAT32 partition.
    Format(FormatArgs),
    Ls(ImageArgs),
    Mkdir(NameArgs),
    /// Copy a host file into a new file on the image.
    Put(PutArgs),
    Append(AppendArgs),
    Cat(NameArgs),
    Rm(NameArgs),
    Mv(MvArgs),
    /// Open the next numbered session directory and copy files into it.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct FormatArgs {
    image: PathBuf,
    #[arg(long, default_value_t = 65_536)]
    blocks: u32,
    #[arg(long = "cluster-blocks", default_value_t = 8)]
    cluster_blocks: u8,
}

#[derive(Debug, Args)]
struct ImageArgs {
    image: PathBuf,
    #[arg(long)]
    dir: Option<String>,
    /// Report block failures of create, rename and delete.
    #[arg(long)]
    strict: bool,
    #[arg(long, default_value_t = 0)]
    partition: u8,
}

impl ImageArgs {
    fn options(&self) -> ImageOptions {
        ImageOptions {
            image: self.image.clone(),
            dir: self.dir.clone(),
            strict: self.strict,
            partition: self.partition,
        }
    }
}

#[derive(Debug, Args)]
struct NameArgs {
    #[command(flatten)]
    image: ImageArgs,
    name: String,
}

#[derive(Debug, Args)]
struct PutArgs {
    #[command(flatten)]
    image: ImageArgs,
    src: PathBuf,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct AppendArgs {
    #[command(flatten)]
    image: ImageArgs,
    src: PathBuf,
    name: String,
}

#[derive(Debug, Args)]
struct MvArgs {
    #[command(flatten)]
    image: ImageArgs,
    from: String,
    to: String,
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[command(flatten)]
    image: ImageArgs,
    files: Vec<PathBuf>,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::Ls(_) => "ls",
            Self::Mkdir(_) => "mkdir",
            Self::Put(_) => "put",
            Self::Append(_) => "append",
            Self::Cat(_) => "cat",
            Self::Rm(_) => "rm",
            Self::Mv(_) => "mv",
            Self::Session(_) => "session",
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::install_log_bridge(cli.verbose);
    let mut logger = Logger::from_env(cli.command.name())?;

    match cli.command {
        Commands::Format(args) => workflows_image::run_format(
            &mut logger,
            FormatOptions {
                image: args.image,
                blocks: args.blocks,
                cluster_blocks: args.cluster_blocks,
            },
        ),
        Commands::Ls(args) => workflows_image::run_ls(&mut logger, &args.options()),
        Commands::Mkdir(args) => {
            workflows_image::run_mkdir(&mut logger, &args.image.options(), &args.name)
        }
        Commands::Put(args) => workflows_image::run_put(
            &mut logger,
            &args.image.options(),
            &args.src,
            args.name.as_deref(),
        )
        .map(|_| ()),
        Commands::Append(args) => workflows_image::run_append(
            &mut logger,
            &args.image.options(),
            &args.src,
            &args.name,
        )
        .map(|_| ()),
        Commands::Cat(args) => {
            let mut stdout = io::stdout().lock();
            workflows_image::run_cat(&args.image.options(), &args.name, &mut stdout).map(|_| ())
        }
        Commands::Rm(args) => {
            workflows_image::run_rm(&mut logger, &args.image.options(), &args.name)
        }
        Commands::Mv(args) => {
            workflows_image::run_mv(&mut logger, &args.image.options(), &args.from, &args.to)
        }
        Commands::Session(args) => {
            workflows_image::run_session(&mut logger, &args.image.options(), &args.files)
                .map(|_| ())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
