//! Merge of plugin-declared recognizers and actions into shared config.
//!
//! Recognizers from every plugin accumulate in the shared recognizer files.
//! An incoming recognizer replaces any stored one with the same
//! [`RecognizerKey`]; everything else already stored is kept. Actions are
//! owned by a single plugin and are overwritten wholesale.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::key::{RecognizerKey, FIELD_KEY, FIELD_PLUGIN_IDENTIFIER, FIELD_PLUGIN_VERSION};
use crate::fs_util::{file_exists, read_json, write_with_mode};
use crate::outcome::Outcome;
use crate::plugin::PluginDescriptor;

/// Recognizer or action entries keyed by their map key
pub type EntryMap = Map<String, Value>;

/// On-disk shape of a recognizer file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecognizerFile {
    pub recognizers: EntryMap,
}

/// On-disk shape of an action file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ActionFile {
    pub actions: EntryMap,
}

/// Tag every recognizer with its origin plugin and composite key.
///
/// Entries that are not JSON objects cannot carry metadata and are dropped.
pub fn stamp_recognizers(recognizers: EntryMap, plugin: &PluginDescriptor) -> EntryMap {
    stamp_entries(recognizers, plugin, true)
}

/// Tag every action with its origin plugin
pub fn stamp_actions(actions: EntryMap, plugin: &PluginDescriptor) -> EntryMap {
    stamp_entries(actions, plugin, false)
}

fn stamp_entries(entries: EntryMap, plugin: &PluginDescriptor, with_key: bool) -> EntryMap {
    entries
        .into_iter()
        .filter_map(|(local_key, value)| match value {
            Value::Object(mut entry) => {
                entry.insert(
                    FIELD_PLUGIN_VERSION.to_string(),
                    Value::String(plugin.plugin_version.clone()),
                );
                entry.insert(
                    FIELD_PLUGIN_IDENTIFIER.to_string(),
                    Value::String(plugin.identifier.clone()),
                );
                if with_key {
                    let key =
                        RecognizerKey::for_declaration(&plugin.identifier, &local_key, &entry);
                    entry.insert(FIELD_KEY.to_string(), Value::String(key.to_string()));
                }
                Some((local_key, Value::Object(entry)))
            }
            other => {
                warn!(
                    plugin = %plugin.identifier,
                    key = %local_key,
                    "Ignoring non-object entry {}",
                    other
                );
                None
            }
        })
        .collect()
}

/// Merge stamped `incoming` recognizers over `existing` ones.
///
/// A stored entry whose composite key matches any incoming entry is dropped
/// in favour of the incoming one. A surviving stored entry that sits under
/// the same map key as an incoming one is moved to its composite key string,
/// so recognizers of other plugins sharing a file are kept.
pub fn merge_recognizers(existing: EntryMap, incoming: EntryMap) -> EntryMap {
    let incoming_keys: HashSet<RecognizerKey> = incoming
        .values()
        .filter_map(Value::as_object)
        .filter_map(RecognizerKey::from_entry)
        .collect();

    let mut merged = EntryMap::new();
    for (map_key, entry) in existing {
        let key = entry.as_object().and_then(RecognizerKey::from_entry);
        if key.as_ref().is_some_and(|key| incoming_keys.contains(key)) {
            debug!(entry = %map_key, "Replacing stored recognizer with plugin version");
            continue;
        }

        match key {
            Some(key) if incoming.contains_key(&map_key) => {
                let moved_to = key.to_string();
                debug!(entry = %map_key, %moved_to, "Keeping stored recognizer of another origin");
                merged.insert(moved_to, entry);
            }
            _ => {
                merged.insert(map_key, entry);
            }
        }
    }

    merged.extend(incoming);
    merged
}

/// Stored recognizers at `destination`, or none if the file is absent or
/// cannot be parsed
pub fn load_existing_recognizers(destination: &Path) -> EntryMap {
    if !file_exists(destination) {
        return EntryMap::new();
    }

    match read_json::<RecognizerFile>(destination) {
        Ok(file) => file.recognizers,
        Err(e) => {
            warn!(
                "ZWED0177W Invalid JSON for {}, existing recognizers ignored: {}",
                destination.display(),
                e
            );
            EntryMap::new()
        }
    }
}

/// Merge the recognizers declared in the plugin file `source` into the
/// shared file `destination`.
pub fn merge_recognizer_file(
    source: &Path,
    destination: &Path,
    plugin: &PluginDescriptor,
    file_mode: u32,
) -> Outcome {
    let declared = match read_json::<RecognizerFile>(source) {
        Ok(file) => file.recognizers,
        Err(e) => {
            error!(
                "ZWED0177W Unable to load recognizers from {} for '{}': {}",
                source.display(),
                plugin.identifier,
                e
            );
            return Outcome::Failed(e.to_string());
        }
    };

    debug!(
        "ZWED0301I Found {} in config for '{}'",
        source.display(),
        plugin.identifier
    );

    let incoming = stamp_recognizers(declared, plugin);
    if incoming.is_empty() {
        debug!(source = %source.display(), "No recognizers declared, nothing to merge");
        return Outcome::Skipped;
    }

    debug!("Going to merge into {}", destination.display());
    let existing = load_existing_recognizers(destination);
    let merged = merge_recognizers(existing, incoming);
    let count = merged.len();

    let file = RecognizerFile {
        recognizers: merged,
    };
    match write_if_changed(destination, &file, file_mode) {
        Ok(false) => {
            debug!(destination = %destination.display(), "Recognizers unchanged");
            Outcome::Skipped
        }
        Ok(true) => {
            info!(
                "ZWED0294I Successfully loaded {} recognizers for '{}' into config at {}",
                count,
                plugin.identifier,
                destination.display()
            );
            Outcome::Success
        }
        Err(reason) => {
            error!(
                "ZWED0177W Unable to load recognizers for '{}' into config at {}: {}",
                plugin.identifier,
                destination.display(),
                reason
            );
            Outcome::Failed(reason)
        }
    }
}

/// Copy the plugin's action file `source` to the shared `destination`,
/// replacing whatever was there.
pub fn copy_actions(
    source: &Path,
    destination: &Path,
    plugin: &PluginDescriptor,
    file_mode: u32,
) -> Outcome {
    if !file_exists(source) {
        return Outcome::NotFound;
    }

    let declared = match read_json::<ActionFile>(source) {
        Ok(file) => file.actions,
        Err(e) => {
            error!("ZWED0177W Malformed JSON in {}: {}", source.display(), e);
            return Outcome::Failed(e.to_string());
        }
    };

    let actions = stamp_actions(declared, plugin);
    let count = actions.len();
    debug!(
        "ZWED0301I Found {} actions in config for '{}'",
        count, plugin.identifier
    );

    match write_if_changed(destination, &ActionFile { actions }, file_mode) {
        Ok(false) => {
            debug!(destination = %destination.display(), "Actions unchanged");
            Outcome::Skipped
        }
        Ok(true) => {
            info!(
                "ZWED0295I Successfully loaded {} actions for '{}' into config at {}",
                count,
                plugin.identifier,
                destination.display()
            );
            Outcome::Success
        }
        Err(reason) => {
            error!(
                "ZWED0177W Unable to load actions for '{}' into config at {}: {}",
                plugin.identifier,
                destination.display(),
                reason
            );
            Outcome::Failed(reason)
        }
    }
}

/// Write `value` as compact JSON unless the file already holds exactly that.
/// Returns whether a write happened.
fn write_if_changed<T: Serialize>(
    destination: &Path,
    value: &T,
    file_mode: u32,
) -> Result<bool, String> {
    let content = serde_json::to_string(value).map_err(|e| e.to_string())?;

    if let Ok(current) = fs::read_to_string(destination) {
        if current == content {
            return Ok(false);
        }
    }

    write_with_mode(destination, content.as_bytes(), file_mode).map_err(|e| e.to_string())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn plugin() -> PluginDescriptor {
        PluginDescriptor::new("org.example.editor", "1.0.0", "/plugins/editor")
    }

    fn map(value: Value) -> EntryMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn stamp_adds_origin_and_key() {
        let stamped = stamp_recognizers(map(json!({"0": {"id": "open", "clause": {}}})), &plugin());

        let entry = &stamped["0"];
        assert_eq!(entry["pluginVersion"], "1.0.0");
        assert_eq!(entry["pluginIdentifier"], "org.example.editor");
        assert_eq!(entry["key"], "org.example.editor:0:open");
        assert!(entry["clause"].is_object());
    }

    #[test]
    fn stamp_actions_has_no_key() {
        let stamped = stamp_actions(map(json!({"a": {"id": "open"}, "b": 3})), &plugin());

        assert_eq!(stamped.len(), 1);
        assert_eq!(stamped["a"]["pluginIdentifier"], "org.example.editor");
        assert!(stamped["a"].get("key").is_none());
    }

    #[test]
    fn merge_plugin_wins_on_key_collision() {
        let existing = map(json!({
            "a": {"key": "org.example.editor:0:open", "stale": true}
        }));
        let incoming = stamp_recognizers(map(json!({"0": {"id": "open"}})), &plugin());

        let merged = merge_recognizers(existing, incoming.clone());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["0"], incoming["0"]);
    }

    #[test]
    fn merge_preserves_unrelated_entries() {
        let existing = map(json!({
            "other": {"id": "x", "pluginIdentifier": "org.other", "key": "org.other:0:x"},
            "nokey": {"id": "y"}
        }));
        let incoming = stamp_recognizers(map(json!({"1": {"id": "open"}})), &plugin());

        let merged = merge_recognizers(existing.clone(), incoming);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged["other"], existing["other"]);
        assert_eq!(merged["nokey"], existing["nokey"]);
    }

    #[test]
    fn merge_keeps_other_plugin_under_shared_map_key() {
        let existing = map(json!({
            "0": {"id": "view", "pluginIdentifier": "org.other", "key": "org.other:0:view"}
        }));
        let incoming = stamp_recognizers(map(json!({"0": {"id": "open"}})), &plugin());

        let merged = merge_recognizers(existing.clone(), incoming.clone());

        assert_eq!(merged.len(), 2);
        assert_eq!(merged["0"], incoming["0"]);
        assert_eq!(merged["org.other:0:view"], existing["0"]);
    }

    #[test]
    fn merge_drops_unidentified_entry_under_shared_map_key() {
        let existing = map(json!({"0": {"clause": {}}}));
        let incoming = stamp_recognizers(map(json!({"0": {"id": "open"}})), &plugin());

        let merged = merge_recognizers(existing, incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["0"]["id"], "open");
    }

    #[test]
    fn two_plugins_share_one_recognizer_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("shared.json");
        let first_src = tmp.path().join("first.json");
        let second_src = tmp.path().join("second.json");
        fs::write(&first_src, r#"{"recognizers":{"0":{"id":"view"}}}"#).unwrap();
        fs::write(&second_src, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();
        let other = PluginDescriptor::new("org.other", "2.0.0", "/plugins/other");

        assert_eq!(
            merge_recognizer_file(&first_src, &dest, &other, 0o770),
            Outcome::Success
        );
        assert_eq!(
            merge_recognizer_file(&second_src, &dest, &plugin(), 0o770),
            Outcome::Success
        );

        let stored = load_existing_recognizers(&dest);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["org.other:0:view"]["pluginIdentifier"], "org.other");
        assert_eq!(stored["0"]["key"], "org.example.editor:0:open");

        // Re-running either plugin leaves the shared file as it is
        assert_eq!(
            merge_recognizer_file(&second_src, &dest, &plugin(), 0o770),
            Outcome::Skipped
        );
        assert_eq!(
            merge_recognizer_file(&first_src, &dest, &other, 0o770),
            Outcome::Success
        );
        assert_eq!(load_existing_recognizers(&dest).len(), 2);
    }

    #[test]
    fn merge_file_creates_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();

        let outcome = merge_recognizer_file(&source, &dest, &plugin(), 0o770);
        assert_eq!(outcome, Outcome::Success);

        let written: Value = serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(
            written["recognizers"]["0"]["key"],
            "org.example.editor:0:open"
        );
    }

    #[test]
    fn merge_file_treats_malformed_destination_as_empty() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();
        fs::write(&dest, "{ this is not json").unwrap();

        let outcome = merge_recognizer_file(&source, &dest, &plugin(), 0o770);
        assert_eq!(outcome, Outcome::Success);

        let written: RecognizerFile =
            serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(written.recognizers.len(), 1);
    }

    #[test]
    fn merge_file_keeps_other_plugins_recognizers() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();
        fs::write(
            &dest,
            r#"{"recognizers":{"x":{"id":"view","pluginIdentifier":"org.other","key":"org.other:x:view"}}}"#,
        )
        .unwrap();

        merge_recognizer_file(&source, &dest, &plugin(), 0o770);

        let written: RecognizerFile =
            serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(written.recognizers.len(), 2);
        assert!(written.recognizers.contains_key("x"));
    }

    #[test]
    fn merge_file_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();

        assert_eq!(
            merge_recognizer_file(&source, &dest, &plugin(), 0o770),
            Outcome::Success
        );
        assert_eq!(
            merge_recognizer_file(&source, &dest, &plugin(), 0o770),
            Outcome::Skipped
        );
    }

    #[test]
    fn merge_file_with_no_recognizers_leaves_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"recognizers":{}}"#).unwrap();
        fs::write(&dest, "untouched").unwrap();

        let outcome = merge_recognizer_file(&source, &dest, &plugin(), 0o770);
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "untouched");
    }

    #[test]
    fn merge_file_malformed_source_fails() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        let dest = tmp.path().join("dest.json");
        fs::write(&source, r#"{"notRecognizers":{}}"#).unwrap();

        let outcome = merge_recognizer_file(&source, &dest, &plugin(), 0o770);
        assert!(outcome.is_failed());
        assert!(!dest.exists());
    }

    #[test]
    fn merge_file_write_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.json");
        fs::write(&source, r#"{"recognizers":{"0":{"id":"open"}}}"#).unwrap();
        let dest = tmp.path().join("missing-dir").join("dest.json");

        let outcome = merge_recognizer_file(&source, &dest, &plugin(), 0o770);
        assert!(outcome.is_failed());
    }

    #[test]
    fn copy_actions_overwrites_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("org.example.editor");
        let dest = tmp.path().join("out");
        fs::write(&source, r#"{"actions":{"edit":{"type":"launch"}}}"#).unwrap();
        fs::write(&dest, r#"{"actions":{"old":{}}}"#).unwrap();

        let outcome = copy_actions(&source, &dest, &plugin(), 0o770);
        assert_eq!(outcome, Outcome::Success);

        let written: ActionFile =
            serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(written.actions.len(), 1);
        assert_eq!(written.actions["edit"]["pluginVersion"], "1.0.0");
    }

    #[test]
    fn copy_actions_missing_source() {
        let tmp = TempDir::new().unwrap();
        let outcome = copy_actions(
            &tmp.path().join("nope"),
            &tmp.path().join("out"),
            &plugin(),
            0o770,
        );
        assert_eq!(outcome, Outcome::NotFound);
    }

    #[test]
    fn copy_actions_malformed_source_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        let dest = tmp.path().join("out");
        fs::write(&source, "{\"actions\": [").unwrap();

        let outcome = copy_actions(&source, &dest, &plugin(), 0o770);
        assert!(outcome.is_failed());
        assert!(!dest.exists());
    }
}
