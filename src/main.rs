//! cloudinary-fs command-line entry point

use std::path::PathBuf;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use cloudinary_fs::adapter::{CloudinaryAdapter, FilesystemAdapter, WriteOptions};
use cloudinary_fs::config::Config;
use cloudinary_fs::metadata::FileAttributes;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: cloudinary-fs <config.yaml> <command> [args...]");
    eprintln!();
    eprintln!("cloudinary-fs - filesystem operations against a Cloudinary account");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ls <prefix>             List assets whose public ID starts with prefix");
    eprintln!("  stat <path>             Show the attributes of one asset");
    eprintln!("  exists <path>           Exit 0 if the asset exists, 1 otherwise");
    eprintln!("  cat <path>              Write the asset's content to stdout");
    eprintln!("  put <local-file> <path> Upload a local file");
    eprintln!("  cp <from> <to>          Copy an asset");
    eprintln!("  mv <from> <to>          Move an asset");
    eprintln!("  rm <path>               Delete an asset");
    eprintln!("  mkdir <dir>             Create a folder");
    eprintln!("  rmdir <dir>             Delete a folder");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  cloudinary-fs ~/.config/cloudinary-fs.yaml ls photos/");
}

/// A parsed command line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    List(String),
    Stat(String),
    Exists(String),
    Cat(String),
    Put(PathBuf, String),
    Copy(String, String),
    Move(String, String),
    Remove(String),
    MakeDir(String),
    RemoveDir(String),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        let command = match (name.as_str(), rest.as_slice()) {
            ("ls", []) => Command::List(String::new()),
            ("ls", [prefix]) => Command::List(prefix.to_string()),
            ("stat", [path]) => Command::Stat(path.to_string()),
            ("exists", [path]) => Command::Exists(path.to_string()),
            ("cat", [path]) => Command::Cat(path.to_string()),
            ("put", [local, path]) => Command::Put(PathBuf::from(local), path.to_string()),
            ("cp", [from, to]) => Command::Copy(from.to_string(), to.to_string()),
            ("mv", [from, to]) => Command::Move(from.to_string(), to.to_string()),
            ("rm", [path]) => Command::Remove(path.to_string()),
            ("mkdir", [dir]) => Command::MakeDir(dir.to_string()),
            ("rmdir", [dir]) => Command::RemoveDir(dir.to_string()),
            _ => return None,
        };
        Some(command)
    }
}

fn format_attributes(attrs: &FileAttributes) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        attrs.path, attrs.size, attrs.mime_type, attrs.last_modified, attrs.visibility
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let command = match Command::parse(&args[2..]) {
        Some(command) => command,
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Loaded configuration for cloud {:?} from {:?}",
        config.cloud.cloud_name, config_path
    );
    debug!("Running {:?}", command);

    let adapter = CloudinaryAdapter::from_config(config.cloud)?;

    match run(&adapter, command).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run a command; `Ok(false)` means it completed but reports failure (e.g. `exists`)
async fn run(
    adapter: &CloudinaryAdapter,
    command: Command,
) -> Result<bool, Box<dyn std::error::Error>> {
    let options = WriteOptions::default();

    match command {
        Command::List(prefix) => {
            let mut listing = adapter.list_contents(&prefix, true);
            let mut count = 0usize;
            while let Some(attrs) = listing.next().await {
                println!("{}", format_attributes(&attrs?));
                count += 1;
            }
            info!("Listed {} asset(s) under {:?}", count, prefix);
        }
        Command::Stat(path) => {
            let attrs = adapter.metadata(&path).await?;
            println!("{}", format_attributes(&attrs));
            for (key, value) in attrs.extra.iter() {
                println!("  {}: {}", key, value);
            }
        }
        Command::Exists(path) => {
            let exists = adapter.file_exists(&path).await?;
            println!("{}", exists);
            return Ok(exists);
        }
        Command::Cat(path) => {
            let mut stream = adapter.read_stream(&path).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = stream.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        }
        Command::Put(local, path) => {
            let contents = tokio::fs::read(&local).await?;
            adapter.write(&path, Bytes::from(contents), &options).await?;
            info!("Uploaded {:?} as {}", local, path);
        }
        Command::Copy(from, to) => adapter.copy(&from, &to, &options).await?,
        Command::Move(from, to) => adapter.move_file(&from, &to, &options).await?,
        Command::Remove(path) => adapter.delete(&path).await?,
        Command::MakeDir(dir) => adapter.create_directory(&dir).await?,
        Command::RemoveDir(dir) => adapter.delete_directory(&dir).await?,
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(&args(&["ls", "photos/"])),
            Some(Command::List("photos/".to_string()))
        );
        assert_eq!(
            Command::parse(&args(&["ls"])),
            Some(Command::List(String::new()))
        );
        assert_eq!(
            Command::parse(&args(&["put", "./a.png", "photos/a"])),
            Some(Command::Put(PathBuf::from("./a.png"), "photos/a".to_string()))
        );
        assert_eq!(
            Command::parse(&args(&["mv", "a", "b"])),
            Some(Command::Move("a".to_string(), "b".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        assert_eq!(Command::parse(&args(&["cp", "a"])), None);
        assert_eq!(Command::parse(&args(&["rm"])), None);
        assert_eq!(Command::parse(&args(&["frobnicate", "x"])), None);
        assert_eq!(Command::parse(&[]), None);
    }
}
