use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use layerscan_rs::backend::BackendRegistry;
use layerscan_rs::config::ScanConfig;
use layerscan_rs::credentials::CredentialKind;
use layerscan_rs::mediator::{ScriptedMediator, Selection};
use layerscan_rs::scanner::{VolumeScanner, WindowsVolumeScanner};
use layerscan_rs::TypeIndicator;

const USAGE: &str = "usage: layerscan <source> [--windows] [--partitions all|none|p1,p2] \
[--volumes all|none|apfs1] [--snapshots all|none|vss1] [--password PW] [--recovery-password PW] \
[--snapshot-file-system TYPE]";

struct Options {
    source: PathBuf,
    windows: bool,
    config: ScanConfig,
    mediator: ScriptedMediator,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut source = None;
    let mut windows = false;
    let mut config = ScanConfig::default();
    let mut mediator = ScriptedMediator::new();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{} needs a value", name));
        match arg.as_str() {
            "--windows" => windows = true,
            "--partitions" => mediator.partitions = Selection::parse(&value("--partitions")?),
            "--volumes" => mediator.apfs_volumes = Selection::parse(&value("--volumes")?),
            "--snapshots" => mediator.shadow_stores = Selection::parse(&value("--snapshots")?),
            "--password" => {
                mediator = mediator.credential(CredentialKind::Password, value("--password")?)
            }
            "--recovery-password" => {
                mediator = mediator.credential(
                    CredentialKind::RecoveryPassword,
                    value("--recovery-password")?,
                )
            }
            "--snapshot-file-system" => {
                let name = value("--snapshot-file-system")?;
                config.snapshot_file_system = TypeIndicator::from_name(&name)
                    .filter(|t| t.is_file_system())
                    .with_context(|| format!("unknown file system type {}", name))?;
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            path if source.is_none() => source = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {}\n{}", extra, USAGE),
        }
    }

    let source = source.context(USAGE)?;
    Ok(Options {
        source,
        windows,
        config,
        mediator,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("layerscan_rs=info".parse()?),
        )
        .init();

    let options = parse_args(std::env::args().skip(1))?;
    let registry = Arc::new(BackendRegistry::with_defaults());
    tracing::info!("layerscan starting, source: {:?}", options.source);

    let base_path_specs = if options.windows {
        let mut scanner = WindowsVolumeScanner::new(registry)
            .with_config(options.config)
            .with_mediator(Box::new(options.mediator));
        let specs = scanner
            .get_base_path_specs(&options.source)
            .with_context(|| format!("scanning {}", options.source.display()))?;
        if let Some(directory) = scanner.windows_directory() {
            println!("Windows directory: {}", directory);
        }
        specs
    } else {
        let mut scanner = VolumeScanner::new(registry)
            .with_config(options.config)
            .with_mediator(Box::new(options.mediator));
        scanner
            .get_base_path_specs(&options.source)
            .with_context(|| format!("scanning {}", options.source.display()))?
    };

    if base_path_specs.is_empty() {
        println!("No file systems found.");
        return Ok(());
    }
    for (index, path_spec) in base_path_specs.iter().enumerate() {
        println!("[{}]", index + 1);
        print!("{}", path_spec);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn options_are_parsed() {
        let options = parse_args(args(&[
            "disk.raw",
            "--windows",
            "--partitions",
            "1,p3",
            "--snapshots",
            "none",
        ]))
        .unwrap();
        assert_eq!(options.source, PathBuf::from("disk.raw"));
        assert!(options.windows);
        assert_eq!(
            options.mediator.partitions,
            Selection::Only(vec!["1".to_string(), "p3".to_string()])
        );
        assert_eq!(options.mediator.shadow_stores, Selection::None);
        assert_eq!(options.mediator.apfs_volumes, Selection::All);
        assert_eq!(options.config.snapshot_file_system, TypeIndicator::Tsk);
    }

    #[test]
    fn missing_source_and_values_are_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["disk.raw", "--password"])).is_err());
        assert!(parse_args(args(&["disk.raw", "--bogus"])).is_err());
        assert!(parse_args(args(&["disk.raw", "--snapshot-file-system", "GPT"])).is_err());
    }
}
