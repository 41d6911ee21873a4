//! Default session configs for the bundled terminal plugins.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Number, Value};
use tracing::error;

use crate::fs_util::{mkdirp, write_json_compact, write_json_pretty};
use crate::outcome::Outcome;

pub const VT_PLUGIN_FILE: &str = "org.zowe.terminal.vt.json";
pub const TN3270_PLUGIN_FILE: &str = "org.zowe.terminal.tn3270.json";

const VT_PLUGIN_ID: &str = "org.zowe.terminal.vt";
const TN3270_PLUGIN_ID: &str = "org.zowe.terminal.tn3270";
const SESSIONS_DIR: &str = "sessions";
const VT_DEFAULTS_FILE: &str = "_defaultVT.json";
const TN3270_DEFAULTS_FILE: &str = "_defaultTN3270.json";

const SSH_PORT: u16 = 22;
const TELNET_PORT: u16 = 23;
const DYNAMIC_DEVICE_TYPE: &str = "5";

/// Terminal settings taken from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminalEnv {
    pub ssh_host: Option<String>,
    pub ssh_port: Option<String>,
    pub tn3270_host: Option<String>,
    pub tn3270_port: Option<String>,
    pub tn3270_security: Option<String>,
    pub tn3270_mod: Option<String>,
    pub tn3270_row: Option<String>,
    pub tn3270_col: Option<String>,
    pub tn3270_codepage: Option<String>,
}

impl TerminalEnv {
    /// Read `ZWED_SSH_*` and `ZWED_TN3270_*`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            ssh_host: get("ZWED_SSH_HOST"),
            ssh_port: get("ZWED_SSH_PORT"),
            tn3270_host: get("ZWED_TN3270_HOST"),
            tn3270_port: get("ZWED_TN3270_PORT"),
            tn3270_security: get("ZWED_TN3270_SECURITY"),
            tn3270_mod: get("ZWED_TN3270_MOD"),
            tn3270_row: get("ZWED_TN3270_ROW"),
            tn3270_col: get("ZWED_TN3270_COL"),
            tn3270_codepage: get("ZWED_TN3270_CODEPAGE"),
        }
    }

    pub fn from_process_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Default VT session
pub fn vt_defaults(env: &TerminalEnv) -> Value {
    json!({
        "host": env.ssh_host.clone().unwrap_or_default(),
        "port": port_value(&env.ssh_port, SSH_PORT),
        "security": {"type": "ssh"},
    })
}

/// Default TN3270 session
pub fn tn3270_defaults(env: &TerminalEnv) -> Value {
    let mut session = Map::new();
    session.insert(
        "host".to_string(),
        Value::String(env.tn3270_host.clone().unwrap_or_default()),
    );
    session.insert("port".to_string(), port_value(&env.tn3270_port, TELNET_PORT));
    session.insert(
        "security".to_string(),
        json!({"type": env.tn3270_security.as_deref().unwrap_or("telnet")}),
    );

    if let Some(model) = &env.tn3270_mod {
        let device_type = match parse_number(model) {
            Some(n) => format_number(n - 1.0),
            None => DYNAMIC_DEVICE_TYPE.to_string(),
        };
        session.insert("deviceType".to_string(), Value::String(device_type));
    }
    if let Some(rows) = env.tn3270_row.as_deref().and_then(parse_number) {
        session.insert("alternateHeight".to_string(), number_value(rows.clamp(24.0, 80.0)));
    }
    if let Some(cols) = env.tn3270_col.as_deref().and_then(parse_number) {
        session.insert("alternateWidth".to_string(), number_value(cols.clamp(80.0, 160.0)));
    }
    if let Some(codepage) = &env.tn3270_codepage {
        session.insert("charsetName".to_string(), Value::String(codepage.clone()));
    }

    Value::Object(session)
}

/// Write default sessions for each terminal plugin present in
/// `instance_items` (file names of the registered plugin pointers).
pub fn write_terminal_defaults(
    config_destination: &Path,
    instance_items: &[String],
    env: &TerminalEnv,
    folder_mode: u32,
    file_mode: u32,
) -> Vec<(PathBuf, Outcome)> {
    let has = |name: &str| instance_items.iter().any(|item| item == name);
    let mut results = Vec::new();

    if has(VT_PLUGIN_FILE) {
        let dir = config_destination.join(VT_PLUGIN_ID).join(SESSIONS_DIR);
        let path = dir.join(VT_DEFAULTS_FILE);
        let outcome = match mkdirp(&dir, folder_mode)
            .and_then(|()| write_json_pretty(&path, &vt_defaults(env), file_mode))
        {
            Ok(()) => Outcome::Success,
            Err(e) => {
                error!("ZWED5016E - Could not customize vt-ng2, error writing json={}", e);
                Outcome::Failed(e.to_string())
            }
        };
        results.push((path, outcome));
    }

    if has(TN3270_PLUGIN_FILE) {
        let dir = config_destination.join(TN3270_PLUGIN_ID).join(SESSIONS_DIR);
        let path = dir.join(TN3270_DEFAULTS_FILE);
        let outcome = match mkdirp(&dir, folder_mode)
            .and_then(|()| write_json_compact(&path, &tn3270_defaults(env), file_mode))
        {
            Ok(()) => Outcome::Success,
            Err(e) => {
                error!("ZWED5017E - Could not customize tn3270-ng2, error writing json={}", e);
                Outcome::Failed(e.to_string())
            }
        };
        results.push((path, outcome));
    }

    results
}

/// Env-provided ports are passed through as strings
fn port_value(port: &Option<String>, default: u16) -> Value {
    match port {
        Some(p) => Value::String(p.clone()),
        None => Value::from(default),
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral values render without a fractional part
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Plain digits in the usual range, `1e+21` style exponents outside it
fn format_number(n: f64) -> String {
    let magnitude = n.abs();
    if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}
