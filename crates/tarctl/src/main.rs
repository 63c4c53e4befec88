//! tarctl - inspect and build USTAR archives.
//!
//! A thin command-line front end over `tar_codec`: list, print and extract
//! archive members, show the editable file tree, check header checksums,
//! and pack a directory into a new archive.

use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};

use tar_codec::{
    filetree::{AllowList, FileTree, Node, DEFAULT_ALLOWED_SUFFIXES},
    Defaults, Header, TarReader, TarWriter,
};

/// Inspect and build USTAR archives.
#[derive(Parser, Debug)]
#[command(name = "tarctl", version, about)]
struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Metadata applied to entries created by `tarctl create`.
#[derive(Args, Debug)]
struct DefaultsOptions {
    /// Owner user ID.
    #[arg(long, default_value_t = 1000)]
    uid: u64,
    /// Owner group ID.
    #[arg(long, default_value_t = 1000)]
    gid: u64,
    /// Owner user name.
    #[arg(long, default_value = "coder")]
    user: String,
    /// Owner group name.
    #[arg(long, default_value = "coder")]
    group: String,
    /// Permission bits for files, in octal.
    #[arg(long, default_value = "664", value_parser = parse_mode)]
    file_mode: u32,
    /// Permission bits for folders, in octal.
    #[arg(long, default_value = "775", value_parser = parse_mode)]
    dir_mode: u32,
    /// Modification time in seconds since the epoch (default: now).
    #[arg(long)]
    mtime: Option<u64>,
}

impl From<DefaultsOptions> for Defaults {
    fn from(opts: DefaultsOptions) -> Self {
        Defaults {
            uid: opts.uid,
            gid: opts.gid,
            file_mode: opts.file_mode,
            dir_mode: opts.dir_mode,
            mtime: opts.mtime,
            user: opts.user,
            group: opts.group,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List archive entries.
    Ls {
        /// Archive to inspect.
        archive: PathBuf,
    },

    /// Write the payload of one entry to stdout.
    Cat {
        /// Archive to read from.
        archive: PathBuf,
        /// Exact entry name.
        name: String,
    },

    /// Print the tree of editable files.
    Tree {
        /// Archive to inspect.
        archive: PathBuf,
        /// Editable filename suffix (can be specified multiple times).
        #[arg(long = "allow", action = clap::ArgAction::Append)]
        allow: Vec<String>,
    },

    /// Pack a directory into a new archive.
    Create {
        /// Output archive path.
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        defaults: DefaultsOptions,
        /// Directory to pack; entry names are relative to it.
        dir: PathBuf,
    },

    /// Unpack an archive.
    Extract {
        /// Archive to unpack.
        archive: PathBuf,
        /// Destination directory.
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,
    },

    /// Report entries whose header checksum does not match.
    Verify {
        /// Archive to check.
        archive: PathBuf,
    },
}

fn parse_mode(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8).map_err(|e| format!("invalid mode {s:?}: {e}"))
}

async fn open(path: &Path) -> Result<TarReader> {
    TarReader::open(path)
        .await
        .with_context(|| format!("reading archive {}", path.display()))
}

fn cmd_ls(reader: &TarReader, out: &mut impl Write) -> Result<()> {
    for entry in reader.entries() {
        let kind = if entry.is_dir() { 'd' } else { '-' };
        writeln!(
            out,
            "{kind}{:04o} {}/{} {:>10} {:>11} {}",
            entry.mode, entry.user, entry.group, entry.size, entry.mtime, entry.name
        )?;
    }
    Ok(())
}

fn cmd_cat(reader: &TarReader, name: &str, out: &mut impl Write) -> Result<()> {
    let Some(data) = reader.get_binary_file(name) else {
        bail!("no entry named {name:?}");
    };
    out.write_all(data)?;
    Ok(())
}

fn cmd_tree(reader: &TarReader, allow: Vec<String>, out: &mut impl Write) -> Result<()> {
    let allow = if allow.is_empty() {
        AllowList::new(DEFAULT_ALLOWED_SUFFIXES.iter().copied())
    } else {
        AllowList::new(allow)
    };
    let tree = FileTree::from_archive(reader, &allow);
    if tree.is_empty() {
        info!("no editable files");
        return Ok(());
    }

    let mut result = Ok(());
    tree.traverse(|node, name, full_path| {
        if result.is_err() {
            return;
        }
        let depth = full_path.matches('/').count();
        let suffix = match node {
            Node::Folder(_) => "/".to_string(),
            Node::File(content) => format!(" ({} bytes)", content.len()),
        };
        result = writeln!(out, "{:indent$}{name}{suffix}", "", indent = depth * 2);
    });
    Ok(result?)
}

/// Collect `dir` recursively as (relative name, is_dir, path), parents first
/// and siblings in name order.
fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, bool, PathBuf)>) -> Result<()> {
    let mut children = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let path = child.path();
        let relative = path.strip_prefix(root)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let file_type = child.file_type()?;
        if file_type.is_dir() {
            out.push((name, true, path.clone()));
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            out.push((name, false, path));
        } else {
            warn!("skipping {}: not a regular file or directory", path.display());
        }
    }
    Ok(())
}

async fn cmd_create(output: &Path, defaults: Defaults, dir: &Path) -> Result<()> {
    let mut found = Vec::new();
    walk(dir, dir, &mut found)?;

    let mut writer = TarWriter::with_defaults(defaults);
    for (name, is_dir, path) in found {
        if is_dir {
            writer.add_folder(name);
        } else {
            let payload = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            writer.add_file(name, payload);
        }
    }

    let data = writer.write();
    tokio::fs::write(output, &data)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        "wrote {} entries ({} bytes) to {}",
        writer.len(),
        data.len(),
        output.display()
    );
    Ok(())
}

/// Resolve an entry name under `dest`, refusing absolute paths and `..`.
fn safe_join(dest: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let mut path = dest.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    (path != dest).then_some(path)
}

async fn cmd_extract(reader: &TarReader, dest: &Path) -> Result<()> {
    for entry in reader.entries() {
        let Some(path) = safe_join(dest, &entry.name) else {
            warn!("skipping unsafe entry name {:?}", entry.name);
            continue;
        };
        debug!("extracting {}", path.display());
        if entry.is_dir() {
            tokio::fs::create_dir_all(&path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            continue;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, reader.payload(entry))
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn cmd_verify(reader: &TarReader) -> Result<()> {
    let data = reader.as_bytes();
    let mut bad = 0usize;
    for entry in reader.entries() {
        let Some(header) = Header::from_prefix(&data[entry.header_offset..]) else {
            continue;
        };
        if !header.verify_checksum() {
            println!(
                "{}: stored checksum {:o}, computed {:o}",
                entry.name,
                header.stored_checksum(),
                header.compute_checksum()
            );
            bad += 1;
        }
    }
    if bad > 0 {
        bail!("{bad} of {} entries have a bad checksum", reader.len());
    }
    info!("{} entries ok", reader.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout();

    match cli.command {
        Command::Ls { archive } => cmd_ls(&open(&archive).await?, &mut stdout),
        Command::Cat { archive, name } => cmd_cat(&open(&archive).await?, &name, &mut stdout),
        Command::Tree { archive, allow } => cmd_tree(&open(&archive).await?, allow, &mut stdout),
        Command::Create {
            output,
            defaults,
            dir,
        } => cmd_create(&output, defaults.into(), &dir).await,
        Command::Extract { archive, dir } => cmd_extract(&open(&archive).await?, &dir).await,
        Command::Verify { archive } => cmd_verify(&open(&archive).await?),
    }
}
