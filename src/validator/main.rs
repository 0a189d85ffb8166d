//! Standalone validator for plugin files.
//!
//! Checks a plugin manifest against the plugin contract, tries its entry
//! point offline and can install it into the plugin directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use nexus_userbot::commands::reserved_names;
use nexus_userbot::config::DEFAULT_CATALOG_BASE;
use nexus_userbot::plugins::{
    PluginCatalog, PluginHost, PluginInstaller, PluginManifest, bundled, is_valid_plugin_id,
};
use nexus_userbot::telegram::RouteTable;

/// Plugin file validator.
#[derive(Parser, Debug)]
#[command(name = "validate_plugin")]
#[command(about = "Validates plugin files for Nexus Userbot")]
#[command(version)]
struct Args {
    /// Path to the plugin JSON file to validate.
    #[arg(short, long)]
    file: PathBuf,

    /// Plugin id to validate against (defaults to the file stem).
    #[arg(long)]
    id: Option<String>,

    /// Install the plugin into the plugin directory when it is valid.
    #[arg(long)]
    install: bool,

    /// Plugin directory used by --install.
    #[arg(long, default_value = "plugins")]
    plugins_dir: PathBuf,

    /// Show the parsed manifest.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let Some(id) = args.id.clone().or_else(|| file_stem(&args.file)) else {
        eprintln!("✗ Cannot derive a plugin id from {}", args.file.display());
        return ExitCode::FAILURE;
    };

    println!("Validating: {}", args.file.display());
    println!("Plugin id:  {id}\n");

    let Some(manifest) = validate(&args.file, &id, args.verbose).await else {
        return ExitCode::FAILURE;
    };

    if args.install {
        return install(&args.file, &id, &args.plugins_dir).await;
    }

    println!(
        "\n✓ Plugin '{}' v{} is valid ({} command(s))",
        manifest.name,
        manifest.version,
        manifest.commands.len()
    );
    ExitCode::SUCCESS
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
}

async fn validate(path: &Path, id: &str, verbose: bool) -> Option<PluginManifest> {
    if !is_valid_plugin_id(id) {
        eprintln!("✗ Invalid plugin id '{id}' (1-32 chars of a-z, 0-9, _)");
        return None;
    }

    let source = match tokio::fs::read_to_string(path).await {
        Ok(source) => source,
        Err(e) => {
            eprintln!("✗ Failed to read plugin file: {e}");
            return None;
        }
    };

    let manifest = match PluginManifest::parse_for(&source, id) {
        Ok(manifest) => manifest,
        Err(e) => {
            println!("  ✗ Error: {e}");
            return None;
        }
    };
    println!("  ✓ Manifest matches the plugin contract");

    if verbose {
        println!("    name:        {}", manifest.name);
        println!("    version:     {}", manifest.version);
        println!("    entry point: {}", manifest.entry_point);
        println!("    commands:    {}", manifest.commands.join(", "));
        if !manifest.dependencies.is_empty() {
            println!("    depends on:  {}", manifest.dependencies.join(", "));
        }
    }

    // Register against a throwaway route table to exercise the entry point.
    let entries = bundled::entry_points();
    let Some(entry) = entries.get(&manifest.entry_point) else {
        println!(
            "  ✗ Error: unknown entry point '{}' (available: {})",
            manifest.entry_point,
            entries.names().join(", ")
        );
        return None;
    };

    let host = PluginHost::new(Arc::new(RouteTable::new()), reqwest::Client::new(), ".")
        .with_reserved(reserved_names());
    if let Some(command) = host.reserved_collision(&manifest) {
        println!("  ✗ Error: command '{command}' is reserved by the userbot");
        return None;
    }
    match entry.register(&host, &manifest).await {
        Ok(handle) => {
            println!("  ✓ Entry point '{}' registered {} route(s)", entry.name(), handle.len());
            handle.dispose().await;
            Some(manifest)
        }
        Err(e) => {
            println!("  ✗ Error: {e}");
            None
        }
    }
}

async fn install(path: &Path, id: &str, plugins_dir: &Path) -> ExitCode {
    let catalog = Arc::new(PluginCatalog::builtin(DEFAULT_CATALOG_BASE));
    let installer = PluginInstaller::new(plugins_dir, catalog, reqwest::Client::new());

    match installer.install_from_local(path, id).await {
        Ok(target) => {
            println!("\n✓ Installed to: {}", target.display());
            println!("Run `.load {id}` in Telegram or restart the userbot to activate it.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\n✗ Failed to install: {e}");
            ExitCode::FAILURE
        }
    }
}
