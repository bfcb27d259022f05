use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bekosirs_core::api::types::RegistrationRequest;
use bekosirs_core::biometric::{BiometricGate, EnableOutcome, UnlockOutcome};
use bekosirs_core::{ApiClient, AuthError, Config, CredentialStore, SessionController};
use tracing::debug;

use crate::prompt::ConsolePrompt;

pub struct App {
    config: Config,
    config_path: PathBuf,
    credentials: CredentialStore,
    controller: SessionController,
    gate: BiometricGate<ConsolePrompt>,
}

impl App {
    pub fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Config::config_path()?,
        };
        let config = Config::load_from(&config_path)?;
        debug!(path = %config_path.display(), api = %config.api_base_url, "Loaded config");

        let credentials = CredentialStore::open(&config)?;
        let api = ApiClient::new(&config, credentials.clone())
            .with_context(|| format!("Invalid API base URL {:?}", config.api_base_url))?;
        let controller = SessionController::new(api.clone(), config.platform.clone());
        let gate = BiometricGate::new(ConsolePrompt, api, config.platform.clone());

        Ok(Self {
            config,
            config_path,
            credentials,
            controller,
            gate,
        })
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => read_line("Username")?,
        };
        let password = rpassword::prompt_password(format!("Password for {}: ", username))
            .context("Failed to read password")?;

        let outcome = self.controller.login(&username, &password).await?;
        println!(
            "Signed in as {} ({})",
            outcome.username,
            outcome.role.as_deref().unwrap_or("customer")
        );

        if self.config.last_username.as_deref() != Some(outcome.username.as_str()) {
            self.config.last_username = Some(outcome.username);
            self.config
                .save_to(&self.config_path)
                .context("Failed to remember username")?;
        }

        if self.gate.check_availability().await.is_available() && !self.gate.is_enabled() {
            println!("Tip: run `bekosirs biometric enable` to unlock without a password next time.");
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.controller.logout()?;
        println!("Signed out.");
        Ok(())
    }

    pub async fn register(&self) -> Result<()> {
        let request = RegistrationRequest {
            username: read_line("Username")?,
            email: read_line("Email")?,
            first_name: read_line("First name")?,
            last_name: read_line("Last name")?,
            phone_number: Some(read_line("Phone (optional)")?),
            password: rpassword::prompt_password("Password: ").context("Failed to read password")?,
            password_confirm: rpassword::prompt_password("Confirm password: ")
                .context("Failed to read password")?,
        };

        let user = self.controller.register(&request).await?;
        println!(
            "{}",
            user.message
                .unwrap_or_else(|| "Account created. Sign in with `bekosirs login`.".into())
        );
        Ok(())
    }

    pub async fn refresh(&self) -> Result<()> {
        self.controller.refresh().await?;
        println!("Access token refreshed.");
        Ok(())
    }

    pub async fn status(&self) -> Result<()> {
        let availability = self.gate.check_availability().await.is_available();
        println!("API:               {}", self.config.api_base_url);
        println!("Credential store:  {}", self.credentials.backend_name());
        println!(
            "Session:           {}",
            if self.controller.is_authenticated() { "signed in" } else { "signed out" }
        );
        println!(
            "Biometric unlock:  {}",
            match (availability, self.gate.is_enabled()) {
                (_, true) => "enabled",
                (true, false) => "available, not enabled",
                (false, false) => "unavailable",
            }
        );
        Ok(())
    }

    pub async fn profile(&self) -> Result<()> {
        let profile = self.controller.fetch_profile().await?;
        println!("{} (#{})", profile.display_name(), profile.id);
        if let Some(email) = profile.email.as_deref() {
            println!("Email: {}", email);
        }
        if let Some(role) = profile.role.as_deref() {
            println!("Role:  {}", role);
        }
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let message = self.controller.request_password_reset(email).await?;
        println!("{}", message);
        Ok(())
    }

    pub async fn confirm_password_reset(&self, token: &str) -> Result<()> {
        let password =
            rpassword::prompt_password("New password: ").context("Failed to read password")?;
        let confirm =
            rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
        let message = self
            .controller
            .confirm_password_reset(token, &password, &confirm)
            .await?;
        println!("{}", message);
        Ok(())
    }

    pub async fn biometric_check(&self) -> Result<()> {
        let caps = self.gate.check_availability().await;
        if caps.is_available() {
            println!("{} available.", caps.label());
        } else if caps.has_hardware {
            println!("No biometric credential enrolled.");
        } else {
            println!("No biometric hardware.");
        }
        println!(
            "Registration: {}",
            if self.gate.is_enabled() { "enabled" } else { "not enabled" }
        );
        Ok(())
    }

    pub async fn biometric_enable(&self) -> Result<()> {
        let Some(refresh) = self.credentials.refresh_token() else {
            bail!(AuthError::NotAuthenticated);
        };
        let profile = self.controller.fetch_profile().await?;

        match self.gate.enable(profile.id, &refresh).await? {
            EnableOutcome::Enabled { device_id } => {
                debug!(device_id = %device_id, "Biometric unlock enabled");
                println!("Biometric unlock enabled for {}.", profile.username);
            }
            EnableOutcome::Cancelled => println!("Cancelled."),
        }
        Ok(())
    }

    pub async fn biometric_disable(&self) -> Result<()> {
        self.gate.disable().await?;
        println!("Biometric unlock disabled.");
        Ok(())
    }

    pub async fn biometric_unlock(&self) -> Result<()> {
        match self.controller.unlock_with_biometrics(&self.gate).await {
            Ok(UnlockOutcome::Unlocked { .. }) => println!("Signed in."),
            Ok(UnlockOutcome::Cancelled) => println!("Cancelled."),
            Err(AuthError::SessionExpired) => {
                bail!("Biometric unlock has expired and was turned off. Sign in with `bekosirs login`.")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub async fn biometric_server_status(&self) -> Result<()> {
        let status = self.gate.server_status().await?;
        println!(
            "Server: biometric {} ({})",
            if status.biometric_enabled { "enabled" } else { "disabled" },
            if status.has_device { "device registered" } else { "no device" }
        );
        Ok(())
    }
}

fn read_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {}", label.to_lowercase()))?;
    Ok(line.trim().to_string())
}
