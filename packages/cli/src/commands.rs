use std::io::Write;
use std::path::PathBuf;

use clap::Subcommand;
use nu_ansi_term::Color;
use originfs::{
    FileContents, HandleRef, LocalDirectory, OriginFs, ReadKind, RootRef, WriteData,
};

use crate::error::{CliError, Result};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file
    Cat { path: String },
    /// Write text to a file, from the argument or stdin
    Write { path: String, text: Option<String> },
    /// Remove a file or directory
    Rm {
        path: String,
        /// Refuse to remove non-empty directories
        #[arg(long)]
        no_recursive: bool,
    },
    /// Copy a file or a directory's contents
    Cp { from: String, to: String },
    /// Mount a local directory under an id
    Mount { id: String, dir: PathBuf },
    /// Remove a mount
    Unmount { id: String },
    /// Show mounted ids and ids waiting for a grant
    Mounts,
}

/// Run one command against `fs`, writing its output to `out`.
pub async fn execute(
    fs: &OriginFs,
    root: RootRef,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Ls { path } => {
            let entries = fs
                .read_directory(root, &path)
                .await?
                .ok_or_else(|| CliError::NotFound(path.clone()))?;
            for (name, handle) in entries {
                match handle {
                    HandleRef::Directory(_) => {
                        writeln!(out, "{}", Color::Blue.bold().paint(format!("{}/", name)))?
                    }
                    HandleRef::File(_) => writeln!(out, "{}", name)?,
                }
            }
        }
        Command::Cat { path } => {
            match fs.read_file(root, &path, ReadKind::ArrayBuffer).await? {
                Some(contents) => out.write_all(&FileContents::into_bytes(contents))?,
                None => return Err(CliError::NotFound(path)),
            }
        }
        Command::Write { path, text } => {
            let text = match text {
                Some(text) => text,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            if !fs.write_file(root, &path, text).await? {
                return Err(CliError::NotWritten(path));
            }
            writeln!(out, "{} {}", Color::Green.paint("ok"), Color::Magenta.paint(&path))?;
        }
        Command::Rm { path, no_recursive } => {
            if !fs.remove_with(root, &path, !no_recursive).await? {
                return Err(CliError::NotFound(path));
            }
            writeln!(out, "{}", Color::Green.paint("ok"))?;
        }
        Command::Cp { from, to } => {
            let source = match fs.entry(root.clone(), &from).await {
                Some(HandleRef::File(file)) => WriteData::File(file),
                Some(HandleRef::Directory(dir)) => WriteData::Directory(dir),
                None => return Err(CliError::NotFound(from)),
            };
            if !fs.write_file(root, &to, source).await? {
                return Err(CliError::NotWritten(to));
            }
            writeln!(out, "{} {} -> {}", Color::Green.paint("ok"), from, to)?;
        }
        Command::Mount { id, dir } => {
            let handle = LocalDirectory::open(&dir)?;
            if let Some(seed) = fs.mount(&id, handle).await {
                if !seed.await.unwrap_or(false) {
                    writeln!(out, "{}", Color::Yellow.paint("warning: seeding the mount failed"))?;
                }
            }
            writeln!(
                out,
                "{} {} -> {}",
                Color::Green.paint("mounted"),
                Color::Cyan.paint(&id),
                dir.display()
            )?;
        }
        Command::Unmount { id } => {
            if !fs.unmount(&id).await {
                return Err(CliError::NotFound(id));
            }
            writeln!(out, "{} {}", Color::Green.paint("unmounted"), id)?;
        }
        Command::Mounts => {
            for id in fs.mounts() {
                writeln!(out, "{}", Color::Cyan.paint(&id))?;
            }
            for id in fs.pending_mounts() {
                writeln!(out, "{} {}", id, Color::DarkGray.paint("(needs grant)"))?;
            }
        }
    }
    Ok(())
}
