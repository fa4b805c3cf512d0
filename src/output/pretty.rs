use colored::Colorize;
use serde_json::Value;

use crate::api::EntityKind;
use crate::features::cache::CachedResponse;
use crate::features::dispatch::MutationOutcome;
use crate::features::queue::QueuedOperation;

/// Fields tried, in order, as the display name of an entity.
const NAME_FIELDS: [&str; 3] = ["nombre", "username", "name"];

fn entity_id(item: &Value) -> String {
    match item.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "?".to_string(),
    }
}

fn entity_name(item: &Value) -> String {
    NAME_FIELDS
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .unwrap_or("(unnamed)")
        .to_string()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Format a list of entities as a pretty table
pub fn format_entities_pretty(kind: EntityKind, items: &[Value], from_cache: bool) -> String {
    let title = format!("{} ({} items)", kind.resource(), items.len());
    let title = if from_cache {
        format!("{title} {}", "[cached]".dimmed())
    } else {
        title
    };

    if items.is_empty() {
        return format!("{title}\n  No items");
    }

    let mut output = format!("{title}\n");
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for item in items {
        let mut line = format!("{} {}", format!("#{}", entity_id(item)).cyan(), entity_name(item).bold());

        if let Some(price) = item.get("precio") {
            line.push_str(&format!("  {}", scalar(price).yellow()));
        }
        if let Some(email) = item.get("email").and_then(Value::as_str) {
            line.push_str(&format!("  {}", email.dimmed()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format a single entity as pretty output
pub fn format_entity_pretty(item: &Value) -> String {
    let mut output = format!("{} {}\n", format!("#{}", entity_id(item)).cyan(), entity_name(item).bold());

    if let Value::Object(map) = item {
        for (key, value) in map {
            if key == "id" {
                continue;
            }
            output.push_str(&format!("  {}: {}\n", key.dimmed(), scalar(value)));
        }
    }

    output
}

/// Format the result of a create, update or delete
pub fn format_outcome_pretty(kind: EntityKind, outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Completed { result } => {
            let mut output = format!("{} {} saved", "✓".green(), kind);
            if result.is_object() {
                output.push('\n');
                output.push_str(format_entity_pretty(result).trim_end());
            }
            output
        }
        MutationOutcome::Queued {
            operation_id,
            client_ref,
        } => {
            let mut output = format!(
                "{} Offline: {} queued as operation #{} and will be sent when the API is reachable",
                "○".yellow(),
                kind,
                operation_id
            );
            if let Some(client_ref) = client_ref {
                output.push_str(&format!(
                    "\n  {}: pending:{}",
                    "Reference".dimmed(),
                    client_ref
                ));
            }
            output
        }
    }
}

/// Format queued operations as a pretty table
pub fn format_operations_pretty(operations: &[QueuedOperation]) -> String {
    if operations.is_empty() {
        return "Queued operations (0)\n  No operations waiting".to_string();
    }

    let mut output = format!("Queued operations ({})\n", operations.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for op in operations {
        let id = op.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let mut line = format!(
            "{:>4}  {:<6} {:<8} {}",
            id,
            op.method.as_str().cyan(),
            op.entity_kind,
            op.endpoint
        );

        if let Some(client_ref) = &op.client_ref {
            line.push_str(&format!("  {}", format!("ref {client_ref}").dimmed()));
        }
        if let Some(target_ref) = &op.target_ref {
            line.push_str(&format!("  {}", format!("after pending:{target_ref}").yellow()));
        }
        if let Some(filename) = op.image_filename() {
            line.push_str(&format!("  {}", format!("+{filename}").dimmed()));
        }
        line.push_str(&format!(
            "  {}",
            op.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        ));

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format cache entries grouped by partition
pub fn format_cache_entries_pretty(partitions: &[(String, Vec<CachedResponse>)]) -> String {
    if partitions.is_empty() {
        return "Response cache\n  Empty".to_string();
    }

    let mut output = "Response cache\n".to_string();
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for (name, entries) in partitions {
        output.push_str(&format!("{} ({})\n", name.bold(), entries.len()));
        for entry in entries {
            output.push_str(&format!(
                "  {}  {}\n",
                entry.url,
                entry.stored_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entities_pretty() {
        colored::control::set_override(false);
        let items = vec![
            json!({"id": 1, "nombre": "Lamp", "precio": "10.00"}),
            json!({"id": 2, "username": "ana", "email": "ana@example.com"}),
        ];
        let text = format_entities_pretty(EntityKind::Product, &items, false);
        assert!(text.starts_with("productos (2 items)"));
        assert!(text.contains("#1 Lamp  10.00"));
        assert!(text.contains("#2 ana  ana@example.com"));
    }

    #[test]
    fn test_empty_list() {
        colored::control::set_override(false);
        let text = format_entities_pretty(EntityKind::Role, &[], false);
        assert!(text.contains("No items"));
    }

    #[test]
    fn test_queued_outcome_mentions_reference() {
        colored::control::set_override(false);
        let text = format_outcome_pretty(
            EntityKind::Product,
            &MutationOutcome::Queued {
                operation_id: 4,
                client_ref: Some("abc".into()),
            },
        );
        assert!(text.contains("operation #4"));
        assert!(text.contains("pending:abc"));
    }
}
