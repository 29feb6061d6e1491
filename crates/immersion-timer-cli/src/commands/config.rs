use clap::Subcommand;
use immersion_timer_core::Config;
use serde_json::Value;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value, e.g. `timer.default_mode`
    Get { key: String },
    /// Change one value and save the file
    Set { key: String, value: String },
    /// Print every key as `key = value`
    List {
        /// Print the whole config as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Overwrite the config file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("{key} = {}", config.get(&key).unwrap_or_default());
        }
        ConfigAction::List { json } => {
            let config = serde_json::to_value(Config::load()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                for (key, value) in flatten(&config) {
                    println!("{key} = {value}");
                }
            }
        }
        ConfigAction::Reset => {
            let path = Config::path()?;
            Config::default().save_to(&path)?;
            println!("config reset to defaults ({})", path.display());
        }
    }
    Ok(())
}

/// Every leaf under the dot-path key that `get`/`set` accept.
fn flatten(value: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    walk(&key, v, out);
                }
            }
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }
    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_yields_settable_keys() {
        let config = serde_json::to_value(Config::default()).unwrap();
        let entries = flatten(&config);
        let mode = entries
            .iter()
            .find(|(k, _)| k == "timer.default_mode")
            .map(|(_, v)| v.as_str());
        assert_eq!(mode, Some("stopwatch"));
        assert!(entries.iter().any(|(k, v)| k == "notifications.enabled" && v == "true"));

        let mut cfg = Config::default();
        for (key, value) in entries {
            if value != "null" {
                cfg.set(&key, &value).unwrap();
            }
        }
    }
}
