// ── Persisted preferences ──
//
// The engine only needs read/write accessors; where the values live is
// up to the implementation (`plcmon-config` keeps them in the TOML file).

use std::sync::Mutex;

use crate::error::CoreError;
use crate::model::{DisplayFormat, EditPosition};

/// Read/write access to the three persisted preference keys.
pub trait Preferences: Send + Sync {
    /// Saved display format, if any.
    fn display_format(&self) -> Option<DisplayFormat>;
    fn set_display_format(&self, format: DisplayFormat) -> Result<(), CoreError>;

    fn auto_start(&self) -> bool;
    fn set_auto_start(&self, enabled: bool) -> Result<(), CoreError>;

    fn edit_position(&self) -> Option<EditPosition>;
    fn set_edit_position(&self, position: EditPosition) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Values {
    display_format: Option<DisplayFormat>,
    auto_start: bool,
    edit_position: Option<EditPosition>,
}

/// Process-local preferences. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<Values>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given values already set.
    pub fn with(
        display_format: Option<DisplayFormat>,
        auto_start: bool,
        edit_position: Option<EditPosition>,
    ) -> Self {
        Self {
            values: Mutex::new(Values {
                display_format,
                auto_start,
                edit_position,
            }),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Values)) {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut values);
    }

    fn read<T>(&self, f: impl FnOnce(&Values) -> T) -> T {
        let values = self
            .values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&values)
    }
}

impl Preferences for MemoryPreferences {
    fn display_format(&self) -> Option<DisplayFormat> {
        self.read(|v| v.display_format)
    }

    fn set_display_format(&self, format: DisplayFormat) -> Result<(), CoreError> {
        self.update(|v| v.display_format = Some(format));
        Ok(())
    }

    fn auto_start(&self) -> bool {
        self.read(|v| v.auto_start)
    }

    fn set_auto_start(&self, enabled: bool) -> Result<(), CoreError> {
        self.update(|v| v.auto_start = enabled);
        Ok(())
    }

    fn edit_position(&self) -> Option<EditPosition> {
        self.read(|v| v.edit_position)
    }

    fn set_edit_position(&self, position: EditPosition) -> Result<(), CoreError> {
        self.update(|v| v.edit_position = Some(position));
        Ok(())
    }
}
