//! Field parameter identity and the semantic flags that steer method selection.

use serde::{Deserialize, Serialize};

/// Vorticity parameter number.
pub const VORTICITY: u32 = 138;
/// Divergence parameter number.
pub const DIVERGENCE: u32 = 155;
/// U wind component parameter number.
pub const U_COMPONENT: u32 = 131;
/// V wind component parameter number.
pub const V_COMPONENT: u32 = 132;

// Precipitation-like accumulations whose totals must survive regridding.
const CONSERVATION_PARAMETERS: &[u32] = &[142, 143, 144, 228, 239, 240];
// Categorical fields: soil type, vegetation types and cover classes.
const NEAREST_PARAMETERS: &[u32] = &[27, 28, 29, 30, 43];
// Wind components and the vorticity/divergence pair.
const WIND_PARAMETERS: &[u32] = &[131, 132, 165, 166, VORTICITY, DIVERGENCE];
// Fields whose physics differ over land and sea.
const LSM_PARAMETERS: &[u32] = &[31, 32, 33, 34, 35, 39, 40, 41, 42, 139, 141, 167, 168, 170, 183, 235, 236];

/// Parameter identification with its interpolation semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub number: u32,
    pub table: u32,
    pub level_type: String,
    pub wind: bool,
    pub conservation: bool,
    pub nearest: bool,
    pub lsm: bool,
}

impl Parameter {
    /// Create a parameter, deriving its flags from the built-in tables.
    pub fn new(number: u32, table: u32, level_type: impl Into<String>) -> Self {
        Self {
            number,
            table,
            level_type: level_type.into(),
            wind: WIND_PARAMETERS.contains(&number),
            conservation: CONSERVATION_PARAMETERS.contains(&number),
            nearest: NEAREST_PARAMETERS.contains(&number),
            lsm: LSM_PARAMETERS.contains(&number),
        }
    }

    /// A scalar parameter with no special semantics.
    pub fn scalar(number: u32) -> Self {
        Self {
            number,
            table: 128,
            level_type: "sfc".to_string(),
            wind: false,
            conservation: false,
            nearest: false,
            lsm: false,
        }
    }

    pub fn with_wind(mut self, wind: bool) -> Self {
        self.wind = wind;
        self
    }

    pub fn with_conservation(mut self, conservation: bool) -> Self {
        self.conservation = conservation;
        self
    }

    pub fn with_nearest(mut self, nearest: bool) -> Self {
        self.nearest = nearest;
        self
    }

    pub fn with_lsm(mut self, lsm: bool) -> Self {
        self.lsm = lsm;
        self
    }

    /// Same parameter renumbered, keeping table and level type.
    pub fn renumbered(&self, number: u32) -> Self {
        Self::new(number, self.table, self.level_type.clone())
    }

    pub fn is_vorticity(&self) -> bool {
        self.number == VORTICITY
    }

    pub fn is_divergence(&self) -> bool {
        self.number == DIVERGENCE
    }
}
