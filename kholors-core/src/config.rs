use std::path::PathBuf;

use serde::Deserialize;

use kholors_types::{FftSettings, ACTIVITY_HISTORY_RING_BUFFER_SIZE};

use crate::journal::default_journal_path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Upper bound for the history ring, keeps a typo from allocating gigabytes.
const MAX_HISTORY_SIZE: usize = 65_536;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    activity: ActivityConfig,
    #[serde(default)]
    fft: FftConfig,
}

#[derive(Deserialize, Default)]
struct ActivityConfig {
    history_size: Option<usize>,
    journal: Option<bool>,
    journal_path: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct FftConfig {
    window_size: Option<usize>,
    overlap_divisions: Option<usize>,
    batch_size: Option<usize>,
    preallocated_jobs: Option<usize>,
    worker_threads: Option<usize>,
    retry_backoff_ms: Option<u64>,
}

pub struct Config {
    activity: ActivityConfig,
    fft: FftConfig,
}

impl Config {
    /// Embedded defaults merged with `~/.config/kholors/config.toml` if present.
    pub fn load() -> Self {
        let mut config = Self::embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => config.merge(user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        config
    }

    /// Only the defaults shipped with the crate.
    pub fn embedded() -> Self {
        let base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });
        Config {
            activity: base.activity,
            fft: base.fft,
        }
    }

    /// Embedded defaults overridden by the given TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let user: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_activity(&mut self.activity, user.activity);
        merge_fft(&mut self.fft, user.fft);
    }

    /// Number of slots in the activity history ring (clamped to 1..=65536).
    pub fn history_size(&self) -> usize {
        self.activity
            .history_size
            .unwrap_or(ACTIVITY_HISTORY_RING_BUFFER_SIZE)
            .clamp(1, MAX_HISTORY_SIZE)
    }

    /// Whether `ActivityManager::from_config` attaches the task journal.
    pub fn journal_enabled(&self) -> bool {
        self.activity.journal.unwrap_or(false)
    }

    /// `[activity] journal_path`, else `~/.local/share/kholors/tasks.jsonl`.
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.activity
            .journal_path
            .clone()
            .or_else(default_journal_path)
    }

    pub fn fft_settings(&self) -> FftSettings {
        let fallback = FftSettings::default();
        let window_size = self
            .fft
            .window_size
            .filter(|w| w.is_power_of_two() && *w >= 16)
            .unwrap_or(fallback.window_size);
        // Windows must tile the buffer exactly, so the overlap divides the window.
        let overlap_divisions = self
            .fft
            .overlap_divisions
            .filter(|o| *o >= 1 && window_size % o == 0)
            .unwrap_or(if window_size % fallback.overlap_divisions == 0 {
                fallback.overlap_divisions
            } else {
                1
            });
        let preallocated_jobs = self
            .fft
            .preallocated_jobs
            .unwrap_or(fallback.preallocated_jobs)
            .max(1);
        let batch_size = self
            .fft
            .batch_size
            .unwrap_or(fallback.batch_size)
            .clamp(1, preallocated_jobs);

        FftSettings {
            window_size,
            overlap_divisions,
            batch_size,
            preallocated_jobs,
            worker_threads: self.fft.worker_threads.filter(|n| *n > 0),
            retry_backoff_ms: self
                .fft
                .retry_backoff_ms
                .unwrap_or(fallback.retry_backoff_ms)
                .clamp(1, 1_000),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kholors").join("config.toml"))
}

fn merge_activity(base: &mut ActivityConfig, user: ActivityConfig) {
    if user.history_size.is_some() {
        base.history_size = user.history_size;
    }
    if user.journal.is_some() {
        base.journal = user.journal;
    }
    if user.journal_path.is_some() {
        base.journal_path = user.journal_path;
    }
}

fn merge_fft(base: &mut FftConfig, user: FftConfig) {
    if user.window_size.is_some() {
        base.window_size = user.window_size;
    }
    if user.overlap_divisions.is_some() {
        base.overlap_divisions = user.overlap_divisions;
    }
    if user.batch_size.is_some() {
        base.batch_size = user.batch_size;
    }
    if user.preallocated_jobs.is_some() {
        base.preallocated_jobs = user.preallocated_jobs;
    }
    if user.worker_threads.is_some() {
        base.worker_threads = user.worker_threads;
    }
    if user.retry_backoff_ms.is_some() {
        base.retry_backoff_ms = user.retry_backoff_ms;
    }
}
