use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
    pub upload: UploadConfig,
    pub gemini: GeminiConfig,
    pub grading: GradingConfig,
    pub ocr: OcrConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub max_concurrent_jobs: usize,
    pub job_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,  // whole request, in bytes
    pub temp_dir: String,
    pub results_dir: String,
}

/// The two values the generative-AI endpoint needs, plus request tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradingConfig {
    pub max_score: f64,  // per criterion
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    pub enabled: bool,
    pub command: String,
    pub language: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the grader cannot work with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let max_score = self.grading.max_score;
        if !max_score.is_finite() || max_score <= 0.0 {
            return Err(config::ConfigError::Message(format!(
                "grading.max_score must be a positive number, got {}",
                max_score
            )));
        }
        if self.worker.max_concurrent_jobs == 0 {
            return Err(config::ConfigError::Message(
                "worker.max_concurrent_jobs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let source = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        source.try_deserialize().unwrap()
    }

    #[test]
    fn default_file_is_valid() {
        let config = sample();
        assert_eq!(config.grading.max_score, 100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_max_score() {
        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let mut config = sample();
            config.grading.max_score = bad;
            assert!(config.validate().is_err(), "{}", bad);
        }
    }

    #[test]
    fn rejects_zero_job_slots() {
        let mut config = sample();
        config.worker.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }
}
