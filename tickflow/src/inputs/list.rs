//! In-memory list input.

use parking_lot::Mutex;
use serde_json::Value;

use super::InputItem;
use crate::domain::ListInputDefinition;

struct ListState {
    items: Vec<Value>,
    cursor: usize,
}

/// A cursor-based in-memory source.
///
/// Each item is yielded exactly once, in order. Appending keeps the cursor in
/// place so newly appended items are picked up by later polls.
pub struct ListInput {
    state: Mutex<ListState>,
}

impl ListInput {
    pub fn new(definition: &ListInputDefinition) -> Self {
        Self {
            state: Mutex::new(ListState {
                items: definition.items.clone(),
                cursor: 0,
            }),
        }
    }

    pub fn poll_batch(&self, n: usize) -> Vec<InputItem> {
        let mut state = self.state.lock();
        let start = state.cursor;
        let end = (start + n).min(state.items.len());
        state.cursor = end;
        state.items[start..end]
            .iter()
            .cloned()
            .map(InputItem::json)
            .collect()
    }

    pub fn poll_all(&self) -> Vec<InputItem> {
        let mut state = self.state.lock();
        let start = state.cursor;
        state.cursor = state.items.len();
        state.items[start..]
            .iter()
            .cloned()
            .map(InputItem::json)
            .collect()
    }

    pub fn has_data(&self) -> bool {
        let state = self.state.lock();
        state.cursor < state.items.len()
    }

    /// Append an item to the tail without disturbing the cursor.
    pub fn append(&self, item: Value) {
        self.state.lock().items.push(item);
    }

    /// Number of items not yet consumed.
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        state.items.len() - state.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(items: Vec<Value>) -> ListInput {
        ListInput::new(&ListInputDefinition {
            id: "l".to_string(),
            items,
        })
    }

    fn payloads(items: &[InputItem]) -> Vec<Value> {
        items
            .iter()
            .map(|item| match &item.payload {
                super::super::ItemPayload::Json(v) => v.clone(),
                other => panic!("unexpected payload: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_poll_batch_advances_cursor() {
        let input = input(vec![json!("a"), json!("b"), json!("c")]);

        assert_eq!(payloads(&input.poll_batch(2)), vec![json!("a"), json!("b")]);
        assert_eq!(payloads(&input.poll_batch(2)), vec![json!("c")]);
        assert!(input.poll_batch(2).is_empty());
        assert!(!input.has_data());
    }

    #[test]
    fn test_round_trip_yields_each_item_exactly_once() {
        let expected: Vec<Value> = (0..10).map(|i| json!(i)).collect();
        let input = input(expected.clone());

        let mut collected = Vec::new();
        loop {
            let batch = input.poll_batch(3);
            if batch.is_empty() {
                break;
            }
            collected.extend(payloads(&batch));
        }
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_empty_list_has_no_data() {
        let input = input(vec![]);
        assert!(!input.has_data());
        assert!(input.poll_batch(5).is_empty());
        assert!(input.poll_all().is_empty());
    }

    #[test]
    fn test_append_is_visible_after_exhaustion() {
        let input = input(vec![json!(1)]);
        assert_eq!(input.poll_all().len(), 1);
        assert!(!input.has_data());

        input.append(json!(2));
        assert!(input.has_data());
        assert_eq!(payloads(&input.poll_batch(10)), vec![json!(2)]);
    }

    #[test]
    fn test_poll_all_drains_from_cursor() {
        let input = input(vec![json!("a"), json!("b"), json!("c")]);
        let _ = input.poll_batch(1);
        assert_eq!(payloads(&input.poll_all()), vec![json!("b"), json!("c")]);
        assert_eq!(input.remaining(), 0);
    }
}
