use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Console model.
///
/// Selects the CPU clock rate and the model-specific period tables (frame
/// counter schedule, noise and DMC rates).
pub enum ConsoleModel {
    #[default]
    Ntsc,
    Pal,
}

impl ConsoleModel {
    /// CPU clock rate in Hz. The APU's unit of time is one CPU cycle.
    #[inline]
    pub const fn clock_rate(self) -> u32 {
        match self {
            ConsoleModel::Ntsc => 1_789_773,
            ConsoleModel::Pal => 1_662_607,
        }
    }

    /// Nominal video field rate, used to size the per-flush sample budget.
    #[inline]
    pub const fn frame_rate(self) -> u32 {
        match self {
            ConsoleModel::Ntsc => 60,
            ConsoleModel::Pal => 50,
        }
    }
}
