//! Last-write-wins deduplication.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bulkingest_shared::Keyed;

/// Keep one entity per key: the last occurrence wins and takes the slot
/// where its key first appeared. Entities without a key pass through.
pub fn deduplicate<E: Keyed>(entities: Vec<E>) -> Vec<E> {
    let mut kept: Vec<E> = Vec::with_capacity(entities.len());
    let mut slots: HashMap<E::Key, usize> = HashMap::with_capacity(entities.len());

    for entity in entities {
        let Some(key) = entity.key() else {
            kept.push(entity);
            continue;
        };
        match slots.entry(key) {
            Entry::Occupied(slot) => kept[*slot.get()] = entity,
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(entity);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkingest_shared::{Document, Edge, RecordId};
    use serde_json::json;

    #[test]
    fn last_weight_wins() {
        let edges = vec![Edge::new(1, 2).with_weight(1.0), Edge::new(1, 2).with_weight(5.0)];
        let deduped = deduplicate(edges);
        assert_eq!(deduped, vec![Edge::new(1, 2).with_weight(5.0)]);
    }

    #[test]
    fn first_appearance_order_is_kept() {
        let edges = vec![
            Edge::new(1, 2),
            Edge::new(3, 4),
            Edge::new(1, 2).with_weight(7.0),
            Edge::new(2, 1),
        ];
        let deduped = deduplicate(edges);
        let keys: Vec<_> = deduped.iter().map(|e| (e.from_id, e.to_id)).collect();
        assert_eq!(keys, vec![(1, 2), (3, 4), (2, 1)]);
        assert_eq!(deduped[0].weight, 7.0);
    }

    #[test]
    fn direction_matters() {
        assert_eq!(deduplicate(vec![Edge::new(1, 2), Edge::new(2, 1)]).len(), 2);
    }

    #[test]
    fn documents_dedup_by_id_and_keyless_pass_through() {
        let mut a1 = Document::new();
        a1.insert("_id", json!("a"));
        a1.insert("v", json!(1));
        let mut a2 = a1.clone();
        a2.insert("v", json!(2));
        let mut orphan = Document::new();
        orphan.insert("v", json!(3));

        let deduped = deduplicate(vec![a1, orphan.clone(), a2, orphan]);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].id(), Some(RecordId::from("a")));
        assert_eq!(deduped[0].get("v"), Some(&json!(2)));
        assert!(deduped[1..].iter().all(|d| d.id().is_none()));
    }

    #[test]
    fn numeric_and_text_ids_are_one_key() {
        let mut numeric = Document::new();
        numeric.insert("_id", json!(1));
        numeric.insert("v", json!("a"));
        let mut text = Document::new();
        text.insert("_id", json!("1"));
        text.insert("v", json!("b"));

        let deduped = deduplicate(vec![numeric, text]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].get("v"), Some(&json!("b")));
    }

    #[test]
    fn empty_input() {
        assert!(deduplicate(Vec::<Edge>::new()).is_empty());
    }
}
