//! Cell state and committed change events.

use crate::grid::CellKey;
use crate::model::color::Color;
use crate::model::input::GroupId;
use serde::{Deserialize, Serialize};

/// Visible state of one claimed cell.
///
/// Always equals the payload of the last committed write the cell received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    pub key: CellKey,
    pub group_id: GroupId,
    pub color: Color,
    /// Epoch milliseconds of the placement that wrote this payload.
    pub updated_at: i64,
    /// Commit sequence of the placement that wrote this payload.
    pub seq: u64,
}

/// One committed cell write, as delivered to live observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChanged {
    pub key: CellKey,
    pub group_id: GroupId,
    pub color: Color,
    pub updated_at: i64,
    pub seq: u64,
    /// Owner before this write, when the cell was already claimed.
    pub previous_group: Option<GroupId>,
}

impl CellChanged {
    /// Builds the event for a cell without a known previous owner.
    pub fn from_state(state: &CellState) -> Self {
        Self {
            key: state.key,
            group_id: state.group_id.clone(),
            color: state.color.clone(),
            updated_at: state.updated_at,
            seq: state.seq,
            previous_group: None,
        }
    }

    /// Whether this write took the cell from another group.
    pub fn is_capture(&self) -> bool {
        self.previous_group
            .as_ref()
            .is_some_and(|previous| previous != &self.group_id)
    }
}
