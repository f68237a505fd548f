// ── Selection and edit state ──
//
// Idle → Selected → Editing. Transitions are plain methods so the engine
// can apply them under a `watch::Sender::send_modify` and views can render
// from a snapshot.

use crate::model::{DeviceAddress, DisplayFormat};

/// An open edit surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    /// Row the edit is anchored to; follows navigation.
    pub address: DeviceAddress,
    /// Format the literal is encoded with on commit.
    pub format: DisplayFormat,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Selected(DeviceAddress),
    Editing(EditSession),
}

impl SelectionState {
    /// The highlighted row, if any.
    pub fn selected(&self) -> Option<&DeviceAddress> {
        match self {
            Self::Idle => None,
            Self::Selected(addr) => Some(addr),
            Self::Editing(edit) => Some(&edit.address),
        }
    }

    pub fn edit(&self) -> Option<&EditSession> {
        match self {
            Self::Editing(edit) => Some(edit),
            _ => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Editing(_))
    }

    /// Move the selection to `addr`. An open edit follows it, keeping its
    /// format and literal.
    pub fn select(&mut self, addr: DeviceAddress) {
        match self {
            Self::Editing(edit) => edit.address = addr,
            _ => *self = Self::Selected(addr),
        }
    }

    /// Open the edit surface on the selected row, seeding the write format.
    /// Returns `false` if nothing is selected or an edit is already open.
    pub fn activate(&mut self, format: DisplayFormat) -> bool {
        let Self::Selected(addr) = self else {
            return false;
        };
        *self = Self::Editing(EditSession {
            address: addr.clone(),
            format,
            literal: String::new(),
        });
        true
    }

    /// Close the edit surface and discard the literal.
    pub fn cancel(&mut self) -> bool {
        let Self::Editing(edit) = self else {
            return false;
        };
        *self = Self::Selected(edit.address.clone());
        true
    }

    pub fn set_literal(&mut self, literal: &str) -> bool {
        let Self::Editing(edit) = self else {
            return false;
        };
        literal.clone_into(&mut edit.literal);
        true
    }

    pub fn set_write_format(&mut self, format: DisplayFormat) -> bool {
        let Self::Editing(edit) = self else {
            return false;
        };
        edit.format = format;
        true
    }
}
