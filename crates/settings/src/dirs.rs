//! Config directory resolution.
//!
//! `<SERVICE>_CONFIG_DIR` wins when set, so operators can pin the generator's
//! settings next to its output. Otherwise the directory is the lowercase
//! service name under the platform config base.

use std::path::PathBuf;

/// Config directory for `service`.
pub fn config_dir_for(service: &str) -> PathBuf {
    resolve_config_dir(service, |key| std::env::var(key).ok())
}

/// `<config dir>/settings.json`
pub fn default_settings_path(service: &str) -> PathBuf {
    config_dir_for(service).join("settings.json")
}

/// Environment variable that overrides the config directory of `service`.
pub fn override_var(service: &str) -> String {
    let name: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{name}_CONFIG_DIR")
}

fn resolve_config_dir<F>(service: &str, var: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(dir) = non_empty(&override_var(service)) {
        return dir;
    }

    let name = service.to_lowercase();
    let home = || {
        non_empty("HOME")
            .or_else(|| non_empty("USERPROFILE"))
            .unwrap_or_else(std::env::temp_dir)
    };

    if cfg!(target_os = "linux") {
        non_empty("XDG_CONFIG_HOME")
            .unwrap_or_else(|| home().join(".config"))
            .join(name)
    } else if cfg!(target_os = "macos") {
        home().join("Library").join("Application Support").join(name)
    } else if cfg!(target_os = "windows") {
        non_empty("APPDATA")
            .unwrap_or_else(|| home().join("AppData").join("Roaming"))
            .join(name)
    } else {
        home().join(format!(".{name}"))
    }
}
