use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Model-runner binary, invoked as `<binary> run <name> <prompt> --stream --quiet`.
    pub binary: String,
    pub name: String,
    /// Upper bound on concurrently running model subprocesses.
    pub max_concurrent: usize,
    /// Watchdog: a stream older than this is cancelled and its subprocess killed.
    pub stream_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptConfig {
    /// Directory holding chat.log; created on startup if absent.
    pub dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    pub path: String,
    pub passphrase: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    pub tts_command: String,
    pub stt_command: String,
    pub stt_script: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub model: ModelConfig,
    pub transcript: TranscriptConfig,
    pub wallet: WalletConfig,
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load config.yaml (optional) with LOOPGATE__SECTION__KEY env overrides.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("auth.user", "loop")?
            .set_default("auth.password", "6677788")?
            .set_default("model.binary", "ollama")?
            .set_default("model.name", "2244-1")?
            .set_default("model.max_concurrent", 4)?
            .set_default("model.stream_timeout_secs", 300)?
            .set_default("transcript.dir", ".ai_builder")?
            .set_default("wallet.path", ".ai_builder/wallet.bin")?
            .set_default("wallet.passphrase", "")?
            .set_default("speech.tts_command", "espeak")?
            .set_default("speech.stt_command", "python")?
            .set_default("speech.stt_script", "stt_offline.py")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LOOPGATE").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand ${VAR} references so secrets can live in the environment
        app_config.wallet.passphrase = expand_env(&app_config.wallet.passphrase);
        app_config.auth.password = expand_env(&app_config.auth.password);

        Ok(app_config)
    }
}

fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_else(|_| "".to_string())
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let config = AppConfig::load("does-not-exist").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.user, "loop");
        assert_eq!(config.model.binary, "ollama");
        assert_eq!(config.model.max_concurrent, 4);
        assert_eq!(config.transcript.dir, ".ai_builder");
    }

    #[test]
    fn expand_env_passes_plain_values_through() {
        assert_eq!(expand_env("hunter2"), "hunter2");
        assert_eq!(expand_env("${LOOPGATE_SURELY_UNSET_VAR}"), "");
    }
}
