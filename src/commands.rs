use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use implicit_auth::oauth::token::IssuedToken;
use implicit_auth::oauth::{AuthFlowController, ProviderConfig, ProviderRegistry};
use implicit_auth::storage::FileStorage;
use log::info;
use secrecy::ExposeSecret;
use service::config::{Command, Config};

use crate::terminal::TerminalRedirect;

type Controller = AuthFlowController<Arc<FileStorage>, TerminalRedirect>;

/// Execute the configured subcommand, writing its result to `out`.
pub fn run<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    let controller = build_controller(config)?;

    match &config.command {
        Command::Ensure { provider, scopes } => {
            let scopes = (!scopes.is_empty()).then(|| scopes.clone());
            let initiated = controller.ensure_tokens([(provider.as_str(), scopes)])?;
            if initiated.is_empty() {
                writeln!(out, "A valid token for {} is already stored", provider)?;
            }
            for url in controller.redirect().take_authorization_urls() {
                writeln!(out, "Open the following URL in a browser to authorize:\n\n  {}\n", url)?;
                writeln!(out, "Then run `complete <redirect-url>` with the URL the browser lands on.")?;
            }
        }
        Command::Complete {
            redirect,
            fallback_provider,
        } => {
            match controller.complete_from_redirect(Some(redirect), fallback_provider.as_deref())? {
                Some(token) => writeln!(out, "Stored token: {}", describe(&token))?,
                None => writeln!(out, "No token response found in {}", redirect)?,
            }
        }
        Command::Token { provider, scopes } => {
            match controller.get_access_token(provider, scopes)? {
                Some(token) => writeln!(out, "{}", token.expose_secret())?,
                None => bail!("No valid token stored for {}", provider),
            }
        }
        Command::Pending => {
            for state in controller.pending_states()? {
                writeln!(out, "{}", state)?;
            }
        }
        Command::Wipe { provider: Some(provider) } => {
            controller.registry().get(provider)?;
            controller.wipe(provider)?;
            writeln!(out, "Wiped tokens for {}", provider)?;
        }
        Command::Wipe { provider: None } => {
            controller.wipe_all()?;
            writeln!(out, "Wiped tokens for all providers")?;
        }
        Command::Dump => {
            for entry in controller.dump()? {
                let marker = if entry.config.is_default { " (default)" } else { "" };
                writeln!(
                    out,
                    "{}{}: {}",
                    entry.provider_id, marker, entry.config.authorization
                )?;
                for token in &entry.tokens {
                    writeln!(out, "  {}", describe(token))?;
                }
            }
        }
    }
    Ok(())
}

fn build_controller(config: &Config) -> Result<Controller> {
    let providers = load_providers(config.providers_file())?;
    info!(
        "Using storage file {} with {} provider(s)",
        config.storage_path().display(),
        providers.len()
    );

    let storage = Arc::new(FileStorage::new(config.storage_path()));
    let mut controller = AuthFlowController::new(storage, TerminalRedirect::new(config.location()));
    controller.configure(providers)?;
    Ok(controller)
}

/// Token metadata for display. The secret itself is never included.
fn describe(token: &IssuedToken) -> String {
    let scopes = token
        .scopes
        .as_ref()
        .map(|scopes| scopes.join(" "))
        .unwrap_or_else(|| "*".to_string());
    let expires = token
        .expires_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "scopes={}, expires={}, type={}",
        scopes,
        expires,
        token.token_type.as_deref().unwrap_or("unknown")
    )
}

fn load_providers(path: &Path) -> Result<BTreeMap<String, ProviderConfig>> {
    let document = fs::read_to_string(path)
        .with_context(|| format!("Failed to read providers file {}", path.display()))?;
    ProviderRegistry::parse_document(&document)
        .with_context(|| format!("Invalid providers file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    const PROVIDERS: &str = r#"{
        "example": {
            "authorization": "https://auth.example/authorize",
            "client_id": "cli",
            "redirect_uri": "https://app.example/callback",
            "isDefault": true
        }
    }"#;

    fn setup() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("providers.json"), PROVIDERS).unwrap();
        dir
    }

    fn config(dir: &TempDir, args: &[&str]) -> Config {
        let providers = dir.path().join("providers.json");
        let storage = dir.path().join("store.json");
        let mut argv = vec![
            "implicit-flow".to_string(),
            "--providers-file".to_string(),
            providers.display().to_string(),
            "--storage-path".to_string(),
            storage.display().to_string(),
            "--location".to_string(),
            "https://app.example/home".to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Config::try_parse_from(argv).unwrap()
    }

    fn run_to_string(dir: &TempDir, args: &[&str]) -> Result<String> {
        let mut out = Vec::new();
        run(&config(dir, args), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_ensure_complete_token_across_runs() {
        let dir = setup();

        let ensure = run_to_string(&dir, &["ensure", "example", "--scope", "read"]).unwrap();
        let pending = run_to_string(&dir, &["pending"]).unwrap();
        let state = pending.trim().to_string();
        assert_eq!(state.len(), 64);

        let url = ensure
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("https://auth.example/authorize?"))
            .unwrap();
        assert!(url.contains("response_type=token"));
        assert!(url.contains(&format!("state={}", state)));
        assert!(url.contains("scope=read"));

        let redirect = format!(
            "https://app.example/callback#access_token=tok&state={}&expires_in=600",
            state
        );
        let completed = run_to_string(&dir, &["complete", &redirect]).unwrap();
        assert!(completed.starts_with("Stored token:"));

        let token = run_to_string(&dir, &["token", "example", "--scope", "read"]).unwrap();
        assert_eq!(token.trim(), "tok");

        let ensured = run_to_string(&dir, &["ensure", "example", "--scope", "read"]).unwrap();
        assert!(ensured.contains("already stored"));
        assert!(run_to_string(&dir, &["pending"]).unwrap().is_empty());
    }

    #[test]
    fn test_complete_with_unknown_state_fails() {
        let dir = setup();
        let result = run_to_string(
            &dir,
            &["complete", "https://app.example/callback#access_token=x&state=forged"],
        );
        assert!(result.is_err());
        assert!(run_to_string(&dir, &["token", "example"]).is_err());
    }

    #[test]
    fn test_wipe_and_dump() {
        let dir = setup();
        run_to_string(
            &dir,
            &[
                "complete",
                "https://app.example/callback#access_token=t&scope=a+b",
                "--fallback-provider",
                "example",
            ],
        )
        .unwrap();

        let dump = run_to_string(&dir, &["dump"]).unwrap();
        assert!(dump.starts_with("example (default): https://auth.example/authorize"));
        assert!(dump.contains("scopes=a b"));
        assert!(!dump.contains("=t,"));

        run_to_string(&dir, &["wipe", "example"]).unwrap();
        assert!(run_to_string(&dir, &["token", "example"]).is_err());
        assert!(run_to_string(&dir, &["wipe", "ghost"]).is_err());
    }

    #[test]
    fn test_missing_providers_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_to_string(&dir, &["dump"]).unwrap_err();
        assert!(err.to_string().contains("Failed to read providers file"));
    }
}
