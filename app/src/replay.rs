// Recorded snapshot files
//
// Accepted layouts: a JSON array of documents, a single document, one
// document per line, or a log export (replayed oldest first).

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use vigil_telemetry::AuditExport;

pub fn load(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse(content: &str) -> Result<Vec<Value>> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return match value {
            Value::Array(items) => Ok(items),
            Value::Object(ref map) if map.contains_key("logs") => from_export(value),
            other => Ok(vec![other]),
        };
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

fn from_export(value: Value) -> Result<Vec<Value>> {
    let export: AuditExport = serde_json::from_value(value)?;
    export
        .logs
        .into_iter()
        .rev()
        .map(|entry| Ok(serde_json::to_value(entry.data)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use vigil_hal::MemoryStore;
    use vigil_telemetry::{AuditLogger, RawSnapshot};

    #[test]
    fn reads_arrays_and_lines() {
        let docs = parse(r#"[{"animal": "Lion"}, {"animal": "Zebra"}]"#).unwrap();
        assert_eq!(docs.len(), 2);

        let docs = parse("{\"animal\": \"Lion\"}\n\n{\"role\": \"ranger\"}\n").unwrap();
        assert_eq!(docs, vec![json!({"animal": "Lion"}), json!({"role": "ranger"})]);

        assert!(parse("{\"animal\": \n").is_err());
    }

    #[test]
    fn export_replays_oldest_first() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), "logs");
        for animal in ["Lion", "Zebra"] {
            let raw = RawSnapshot::from_value(&json!({"animal": animal})).unwrap();
            logger.record(&raw, Utc::now());
        }
        let exported = logger.export_json(Utc::now()).unwrap();

        let docs = parse(&exported).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["animal"], "Lion");
        assert_eq!(docs[1]["animal"], "Zebra");
        assert_eq!(docs[1]["role"], "None");
    }
}
