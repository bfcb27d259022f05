//! Terminal stand-in for the device biometric prompt.

use std::io::{self, BufRead, IsTerminal, Write};

use bekosirs_core::biometric::{BiometricCapabilities, BiometricPrompt, PromptOutcome};
use tracing::warn;

/// Asks for a y/n confirmation on the terminal. Reports no hardware when
/// stdin is not a terminal.
pub struct ConsolePrompt;

impl BiometricPrompt for ConsolePrompt {
    async fn capabilities(&self) -> BiometricCapabilities {
        if !io::stdin().is_terminal() {
            return BiometricCapabilities::unavailable();
        }
        BiometricCapabilities {
            has_hardware: true,
            is_enrolled: true,
            kinds: Vec::new(),
        }
    }

    async fn challenge(&self, reason: &str) -> PromptOutcome {
        let reason = reason.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            print!("{} [y/N] ", reason);
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) if matches!(line.trim(), "y" | "Y" | "yes") => PromptOutcome::Granted,
            Ok(Ok(_)) => PromptOutcome::Declined,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not read confirmation");
                PromptOutcome::Unavailable
            }
            Err(e) => {
                warn!(error = %e, "Confirmation task failed");
                PromptOutcome::Unavailable
            }
        }
    }
}
