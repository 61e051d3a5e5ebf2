//! clipdrive CLI - Google Drive credential tooling for the clipping archive.
//!
//! This tool generates and inspects the OAuth token used to upload clipping
//! output files into a Drive folder, diagnoses broken setups, and performs
//! one-off uploads.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use clipdrive_common::AccessScope;
use clipdrive_drive::config::DEFAULT_TOKEN_PATH;
use clipdrive_drive::doctor::{self, Check, CheckStatus, FolderAccess, SCOPE_REMEDIATION};
use clipdrive_drive::upload::upload_clipping;
use clipdrive_drive::{
    AuthConfig, AuthManager, ConsentFlow, DriveClient, DriveFile, Settings, TokenManager,
    TokenStore,
};

#[derive(Parser)]
#[command(name = "clipdrive")]
#[command(about = "clipdrive - Google Drive auth and upload tooling")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser consent flow and store a fresh token.
    GenerateToken {
        /// Scope to request: "full" or "app-files".
        #[arg(short, long, default_value = "full")]
        scope: String,

        /// Replace an existing token without asking.
        #[arg(short, long)]
        force: bool,
    },

    /// Diagnose environment, token, and folder access.
    CheckAuth,

    /// Show which account the stored token belongs to.
    CheckUser,

    /// List recent folders with their IDs.
    ListFolders {
        /// Maximum number of folders to show.
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// List the contents of the configured folder.
    ListFolder,

    /// Upload a clipping output file into the configured folder.
    Upload {
        /// Local file to upload.
        file: PathBuf,

        /// Name to use in Drive instead of the local filename.
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::from_env();

    match cli.command {
        Commands::GenerateToken { scope, force } => {
            cmd_generate_token(&settings, &scope, force).await
        }

        Commands::CheckAuth => cmd_check_auth(&settings).await,

        Commands::CheckUser => cmd_check_user(&settings).await,

        Commands::ListFolders { limit } => cmd_list_folders(&settings, limit).await,

        Commands::ListFolder => cmd_list_folder(&settings).await,

        Commands::Upload { file, name } => {
            cmd_upload(&settings, &file, name.as_deref()).await
        }
    }
}

/// Build an authenticated Drive client from the configured token.
fn build_client(settings: &Settings) -> Result<DriveClient> {
    let source = settings.token_source();
    let artifact = source.load().with_context(|| {
        format!(
            "No usable token ({}). Run 'clipdrive generate-token' first",
            source.describe()
        )
    })?;

    // Prefer the client credentials embedded in the artifact; fall back to
    // the client secret file for artifacts produced by other tooling.
    let auth_config = AuthConfig::from_artifact(&artifact)
        .or_else(|_| AuthConfig::from_client_secret_file(&settings.client_secret_path))
        .context("Token has no embedded client credentials and no client secret file found")?;

    let auth_manager = AuthManager::new(auth_config)?;
    let store = source.path().map(TokenStore::new);
    let token_manager = Arc::new(TokenManager::new(auth_manager, artifact, store));

    Ok(DriveClient::new(token_manager))
}

/// Ask for confirmation on stdin.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N): ", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;

    Ok(line.trim().eq_ignore_ascii_case("y"))
}

/// Run the consent flow and persist the resulting token.
async fn cmd_generate_token(settings: &Settings, scope: &str, force: bool) -> Result<()> {
    let scope = AccessScope::parse_name(scope)?;

    let auth_config = AuthConfig::from_client_secret_file(&settings.client_secret_path)
        .with_context(|| {
            format!(
                "Cannot load OAuth client from {}. Create an OAuth client ID in the Google \
                 Cloud Console and save the download there",
                settings.client_secret_path.display()
            )
        })?;

    let store = TokenStore::new(
        settings
            .token_source()
            .path()
            .unwrap_or(Path::new(DEFAULT_TOKEN_PATH)),
    );

    if store.exists() {
        println!("Existing token found: {}", store.path().display());
        if !force && !confirm("Delete it and generate a new one?")? {
            println!("Cancelled.");
            return Ok(());
        }
        store.delete()?;
    }

    info!("Starting OAuth consent flow");
    println!("Requesting scope: {}", scope);

    let flow = ConsentFlow::start(auth_config, scope).await?;

    println!("\nOpen this URL to authorize access:");
    println!("  {}", flow.auth_url());

    if open::that(flow.auth_url()).is_ok() {
        println!("(a browser window should have opened)");
    }

    let artifact = flow.finish().await.context("Authorization failed")?;
    store.save(&artifact)?;

    println!("\nToken saved: {}", store.path().display());

    // Verify the new token actually works before declaring success.
    let auth_config = AuthConfig::from_artifact(&artifact)?;
    let token_manager = Arc::new(TokenManager::new(
        AuthManager::new(auth_config)?,
        artifact,
        Some(TokenStore::new(store.path())),
    ));
    let client = DriveClient::new(token_manager);
    let user = client.about_user().await.context("Token verification failed")?;

    println!("\nAuthorized account:");
    println!("  Email: {}", user.email_address.as_deref().unwrap_or("-"));
    println!("  Name:  {}", user.display_name.as_deref().unwrap_or("-"));

    println!("\nNext steps:");
    println!(
        "  1. Ensure .env contains: GOOGLE_TOKEN_JSON={}",
        store.path().display()
    );
    println!("  2. Run: clipdrive check-auth");

    Ok(())
}

fn print_check(check: &Check) {
    let marker = match check.status {
        CheckStatus::Pass => "[ ok ]",
        CheckStatus::Warn => "[warn]",
        CheckStatus::Fail => "[fail]",
    };
    println!("  {} {}: {}", marker, check.label, check.detail);

    if check.status != CheckStatus::Pass {
        if let Some(hint) = &check.hint {
            println!("         -> {}", hint);
        }
    }
}

fn print_folder_line(folder: &DriveFile) {
    println!("  [DIR]  {}", folder.name);
    println!("         ID: {}", folder.id);
}

/// Diagnose environment, token, and folder access.
async fn cmd_check_auth(settings: &Settings) -> Result<()> {
    println!("Environment:");
    for check in doctor::check_environment(settings) {
        print_check(&check);
    }

    println!("\nToken:");
    let report = doctor::check_token(settings);
    for check in &report.checks {
        print_check(check);
    }

    if report.artifact.is_none() {
        println!("\nSkipping API checks: no usable token.");
        return Ok(());
    }

    let client = build_client(settings)?;

    println!("\nAuthentication:");
    match client.about_user().await {
        Ok(user) => {
            println!(
                "  [ ok ] authenticated as {}",
                user.email_address.as_deref().unwrap_or("-")
            );
        }
        Err(e) => {
            println!("  [fail] authentication failed: {}", e);
            println!("         -> The token may be expired or revoked; run 'clipdrive generate-token'");
            return Ok(());
        }
    }

    let folder_id = match settings.require_folder_id() {
        Ok(id) => id,
        Err(_) => {
            println!("\nSkipping folder check: GOOGLE_DRIVE_FOLDER_ID is not set.");
            return Ok(());
        }
    };

    println!("\nFolder access ({}):", folder_id);
    match doctor::check_folder(&client, folder_id).await {
        FolderAccess::Accessible(folder) => {
            println!("  [ ok ] reachable: {}", folder.name);
            if folder.trashed {
                println!("  [warn] the folder is in the trash");
            }
            if folder.can_add_children() {
                println!("  [ ok ] uploads allowed");
            } else {
                println!("  [warn] uploads not allowed for this account");
                println!("         -> Grant the authorized account editor access to the folder");
            }
        }
        FolderAccess::Unreachable {
            error,
            alternatives,
        } => {
            println!("  [fail] {}", error);
            if matches!(error, clipdrive_common::Error::InsufficientScope(_)) {
                println!("         -> {}", SCOPE_REMEDIATION);
            } else {
                println!("         -> Check that the folder ID is correct");
            }

            if !alternatives.is_empty() {
                println!("\nFolders this account can see:");
                for folder in &alternatives {
                    print_folder_line(folder);
                }
                println!("\nPick the right ID and update GOOGLE_DRIVE_FOLDER_ID in .env");
            }
        }
    }

    Ok(())
}

/// Show the account behind the stored token.
async fn cmd_check_user(settings: &Settings) -> Result<()> {
    let client = build_client(settings)?;
    let user = client.about_user().await?;

    println!("Authorized account:");
    println!("  Email: {}", user.email_address.as_deref().unwrap_or("-"));
    println!("  Name:  {}", user.display_name.as_deref().unwrap_or("-"));

    if let Some(folder_id) = &settings.folder_id {
        println!("\nGrant this email editor access to folder {} if uploads fail.", folder_id);
    }

    Ok(())
}

/// List recent folders so the user can find the right ID.
async fn cmd_list_folders(settings: &Settings, limit: u32) -> Result<()> {
    let client = build_client(settings)?;
    let folders = client.list_folders(limit).await?;

    if folders.is_empty() {
        println!("No folders visible to this account.");
        println!("A token with the app-files scope only sees folders it created itself.");
        return Ok(());
    }

    println!("Recent folders:");
    for folder in &folders {
        print_folder_line(folder);
    }

    Ok(())
}

/// List contents of the configured folder.
async fn cmd_list_folder(settings: &Settings) -> Result<()> {
    let folder_id = settings.require_folder_id()?;
    let client = build_client(settings)?;

    let contents = client.list_children(folder_id).await?;

    if contents.is_empty() {
        println!("Folder is empty.");
    } else {
        println!("Contents of {}:", folder_id);
        for entry in contents {
            if entry.is_folder() {
                println!("  [DIR]  {}/", entry.name);
            } else {
                let size = entry
                    .size_bytes()
                    .map(|s| format!("{} bytes", s))
                    .unwrap_or_default();
                println!("  [FILE] {} ({})", entry.name, size);
            }
        }
    }

    Ok(())
}

/// Upload one file into the configured folder.
async fn cmd_upload(settings: &Settings, file: &Path, name: Option<&str>) -> Result<()> {
    let folder_id = settings.require_folder_id()?;
    let client = build_client(settings)?;

    info!("Uploading {} to folder {}", file.display(), folder_id);

    let file_id = upload_clipping(&client, folder_id, file, name)
        .await
        .context("Upload failed")?;

    println!("Uploaded: {} (ID: {})", file.display(), file_id);

    Ok(())
}
