//! Operation collapser
//!
//! Users can queue several edits against the same archive path before the
//! project is saved. Only the last edit per exact path matters:
//!
//! 1. For a file, the last operation wins.
//! 2. For a directory, the last operation also wins, but an `add` must first
//!    clear whatever the archive already holds at that directory so old and
//!    new children are not merged. A `remove` is inserted just before it.
//!
//! Paths keep the position of their first occurrence.

use crate::models::Operation;
use std::collections::HashMap;

/// Reduce a raw list of operations to the minimal ordered sequence that can
/// be applied once against the current archive state.
pub fn collapse_operations(operations: &[Operation]) -> Vec<Operation> {
    let mut order: Vec<&Operation> = Vec::with_capacity(operations.len());
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(operations.len());

    for operation in operations {
        match positions.get(operation.path.as_str()) {
            Some(&index) => order[index] = operation,
            None => {
                positions.insert(operation.path.as_str(), order.len());
                order.push(operation);
            }
        }
    }

    let mut collapsed = Vec::with_capacity(order.len());
    for operation in order {
        if operation.is_add() && operation.is_directory_target() {
            collapsed.push(Operation::remove(operation.path.clone()));
        }
        collapsed.push(operation.clone());
    }
    collapsed
}
