use std::process::Stdio;

use tokio::process::Command;
use tracing::warn;

use crate::config::SpeechConfig;
use crate::runner::RunnerError;

/// Offline text-to-speech. Best-effort: dispatched after the AI turn is
/// durably recorded, failures are logged and never reach the client.
pub struct SpeechSynth {
    command: String,
}

impl SpeechSynth {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            command: config.tts_command.clone(),
        }
    }

    pub fn say(&self, text: String) {
        let command = self.command.clone();
        tokio::spawn(async move {
            let result = Command::new(&command)
                .arg(&text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match result {
                Ok(status) if !status.success() => {
                    warn!("[TTS ERROR] {command} exited with {status}");
                }
                Err(e) => warn!("[TTS ERROR] {command}: {e}"),
                _ => {}
            }
        });
    }
}

/// Offline speech-to-text. Runs the configured recorder/transcriber script
/// to completion and returns the transcription.
pub struct SpeechToText {
    command: String,
    script: String,
}

impl SpeechToText {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            command: config.stt_command.clone(),
            script: config.stt_script.clone(),
        }
    }

    /// The script prints progress lines before the transcription, so the
    /// last non-empty stdout line is the result.
    pub async fn listen(&self) -> Result<String, RunnerError> {
        let output = Command::new(&self.command)
            .arg(&self.script)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RunnerError::Launch(format!("{}: {}", self.command, e)))?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!("[STT ERROR] {line}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeechConfig;

    fn config(stt_command: &str, stt_script: &str) -> SpeechConfig {
        SpeechConfig {
            tts_command: "true".to_string(),
            stt_command: stt_command.to_string(),
            stt_script: stt_script.to_string(),
        }
    }

    #[tokio::test]
    async fn listen_returns_last_non_empty_line() {
        // echo prints the script argument back, standing in for the recorder.
        let stt = SpeechToText::new(&config("echo", "hello world"));
        assert_eq!(stt.listen().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn listen_surfaces_launch_failure() {
        let stt = SpeechToText::new(&config("/nonexistent/whisper", "x"));
        assert!(matches!(
            stt.listen().await,
            Err(RunnerError::Launch(_))
        ));
    }
}
