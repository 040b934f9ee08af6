//! Read-through filter hiding compacted spans.

use std::collections::HashSet;

use super::event::Event;

/// Walk the raw log and drop every original event whose invocation lies
/// inside a compaction span. Compaction events themselves stay visible;
/// downstream consumers treat them as synthesised turns.
pub fn filter_compacted(raw: &[Event]) -> Vec<Event> {
    // Distinct invocation ids in first-occurrence order give "between
    // start and end inclusive" a concrete meaning for opaque ids.
    let mut invocation_order: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for event in raw {
        if seen.insert(event.invocation_id.as_str()) {
            invocation_order.push(event.invocation_id.as_str());
        }
    }

    let position = |id: &str| invocation_order.iter().position(|known| *known == id);

    let mut hidden: HashSet<String> = HashSet::new();
    for event in raw {
        let Some(record) = event.compaction_record() else {
            continue;
        };
        let (Some(start), Some(end)) = (
            position(&record.start_invocation_id),
            position(&record.end_invocation_id),
        ) else {
            continue;
        };
        for id in &invocation_order[start..=end.max(start)] {
            hidden.insert((*id).to_string());
        }
    }

    raw.iter()
        .filter(|event| event.is_compaction() || !hidden.contains(&event.invocation_id))
        .cloned()
        .collect()
}
