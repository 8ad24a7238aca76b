//! Local drawing commands.
//!
//! Attribute bags travel as JSON, the shape the editor sends and expects.

use super::{open_instance, CommandResult};
use drawmirror_core::{Drawing, DrawingId, Instance, Value};
use std::fs;
use std::path::Path;

fn parse_id(id: &str) -> CommandResult<DrawingId> {
    DrawingId::parse(id).ok_or_else(|| format!("invalid drawing id: {id}").into())
}

/// The JSON document for one drawing.
pub fn to_json(drawing: &Drawing) -> serde_json::Value {
    serde_json::json!({
        "id": drawing.id.to_string(),
        "modified_at": drawing.modified_at,
        "data": serde_json::Value::from(&drawing.data),
    })
}

/// Creates an empty drawing and prints its ID.
pub fn create(path: &Path, name: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let drawing = instance.store().create(name)?;
    println!("{}", drawing.id);
    Ok(())
}

/// Lists drawings.
pub fn list(path: &Path, format: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let drawings = instance.store().list();

    match format {
        "json" => {
            let docs: Vec<serde_json::Value> = drawings.iter().map(to_json).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        _ => {
            if drawings.is_empty() {
                println!("No drawings");
            }
            for d in &drawings {
                println!("  {}  {:<24} {}", d.id, d.name(), d.directory());
            }
        }
    }
    Ok(())
}

/// Prints one drawing as JSON.
pub fn show(path: &Path, id: &str) -> CommandResult {
    let instance = open_instance(path)?;
    let drawing = instance.store().get(&parse_id(id)?)?;
    println!("{}", serde_json::to_string_pretty(&to_json(&drawing))?);
    Ok(())
}

/// Applies an editor save read from a JSON file.
///
/// Only `elements`, `appState`, `files` and `name` are taken from the file.
pub fn save(path: &Path, id: &str, patch_file: &Path) -> CommandResult {
    let instance = open_instance(path)?;
    let saved = save_json(&instance, &parse_id(id)?, &fs::read(patch_file)?)?;
    println!("Saved {} ({} elements)", saved.id, saved.element_count());
    Ok(())
}

/// Applies a JSON save patch to a drawing.
pub fn save_json(instance: &Instance, id: &DrawingId, json: &[u8]) -> CommandResult<Drawing> {
    let patch: serde_json::Value = serde_json::from_slice(json)?;
    Ok(instance.store().save(id, &Value::from(patch))?)
}

/// Deletes a drawing.
pub fn delete(path: &Path, id: &str) -> CommandResult {
    let instance = open_instance(path)?;
    instance.store().delete(&parse_id(id)?)?;
    println!("Deleted {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn json_save_round_trips_through_the_store() {
        let instance = Instance::in_memory();
        let drawing = instance.store().create("plan").unwrap();

        let patch = br#"{
            "name": "ground floor",
            "elements": [{"id": "a", "type": "rectangle", "x": 1.5, "width": 100}],
            "appState": {"zoom": {"value": 2}},
            "ignored": true
        }"#;
        let saved = save_json(&instance, &drawing.id, patch).unwrap();
        assert_eq!(saved.name(), "ground floor");
        assert_eq!(saved.element_count(), 1);
        assert!(saved.data.get("ignored").is_none());

        let doc = to_json(&instance.store().get(&drawing.id).unwrap());
        assert_eq!(doc["data"]["elements"][0]["x"], serde_json::json!(1.5));
        assert_eq!(doc["data"]["elements"][0]["width"], serde_json::json!(100));
        assert_eq!(doc["data"]["appState"]["zoom"]["value"], serde_json::json!(2));
    }

    #[test]
    fn bad_json_changes_nothing() {
        let instance = Instance::in_memory();
        let drawing = instance.store().create("plan").unwrap();
        assert!(save_json(&instance, &drawing.id, b"{not json").is_err());
        assert!(save_json(&instance, &drawing.id, b"[1, 2]").is_err());
        assert_eq!(instance.store().get(&drawing.id).unwrap(), drawing);
    }

    #[test]
    fn commands_on_a_data_dir() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "first").unwrap();
        list(dir.path(), "json").unwrap();

        let id = open_instance(dir.path()).unwrap().store().list()[0].id.to_string();
        let patch = dir.path().join("patch.json");
        fs::write(&patch, br#"{"name": "renamed"}"#).unwrap();
        save(dir.path(), &id, &patch).unwrap();
        show(dir.path(), &id).unwrap();

        assert_eq!(
            open_instance(dir.path()).unwrap().store().list()[0].name(),
            "renamed"
        );
        delete(dir.path(), &id).unwrap();
        assert!(show(dir.path(), &id).is_err());
        assert!(show(dir.path(), "not-an-id").is_err());
    }
}
