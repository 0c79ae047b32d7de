use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Endpoint configuration for the external fracture-analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 30,
        }
    }
}

/// Endpoint configuration for the case-consultation chat model. Any
/// OpenAI-compatible chat-completions endpoint works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ConsultSettings {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1/chat/completions".into(),
            model: "openai/gpt-oss-20b".into(),
            api_key: None,
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    inference: InferenceSettings,
    consult: ConsultSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn inference(&self) -> InferenceSettings {
        self.data.read().unwrap().inference.clone()
    }

    pub fn consult(&self) -> ConsultSettings {
        self.data.read().unwrap().consult.clone()
    }

    pub fn update_inference(&self, settings: InferenceSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.inference = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn update_consult(&self, settings: ConsultSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.consult = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("open");
        assert_eq!(store.inference(), InferenceSettings::default());
        assert_eq!(store.consult(), ConsultSettings::default());
    }

    #[test]
    fn updates_persist_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("open");
        store
            .update_inference(InferenceSettings {
                base_url: "http://imaging-box:9000".into(),
                timeout_secs: 10,
            })
            .expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        assert_eq!(reopened.inference().base_url, "http://imaging-box:9000");
        assert_eq!(reopened.inference().timeout_secs, 10);
        // Untouched section keeps its defaults.
        assert_eq!(reopened.consult(), ConsultSettings::default());
    }

    #[test]
    fn unreadable_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write garbage");

        let store = SettingsStore::new(path).expect("open");
        assert_eq!(store.inference(), InferenceSettings::default());
    }
}
