use serde::{Deserialize, Serialize};

/// Lower bound for `rho * c_p` used when dividing by the volumetric capacity.
pub const CAPACITY_EPS: f64 = 1e-12;

/// Thermal properties of one material region (coolant or battery cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalMaterial {
    pub name: String,
    /// Density in kg/m^3.
    pub density: f64,
    /// Specific heat capacity in J/(kg*K).
    pub specific_heat: f64,
    /// Thermal conductivity in W/(m*K).
    ///
    /// For battery cells this is the axial (in-plane) conductivity.
    pub conductivity: f64,
    /// Volumetric heat generation in W/m^3.
    pub heat_generation: f64,
}

/// Material region a cell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Fluid,
    Solid,
}

impl ThermalMaterial {
    pub fn new(
        name: &str,
        density: f64,
        specific_heat: f64,
        conductivity: f64,
        heat_generation: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            density,
            specific_heat,
            conductivity,
            heat_generation,
        }
    }

    /// Liquid water coolant near room temperature. No heat generation.
    pub fn water() -> Self {
        Self::new("water", 997.0, 4180.0, 0.6, 0.0)
    }

    /// Lithium-ion cell with axial conductivity and the given generation [W/m^3].
    pub fn lithium_ion_cell(heat_generation: f64) -> Self {
        Self::new("li-ion cell", 2500.0, 1000.0, 3.0, heat_generation)
    }

    /// Volumetric heat capacity `rho * c_p` in J/(m^3*K), guarded against zero.
    pub fn volumetric_capacity(&self) -> f64 {
        (self.density * self.specific_heat).max(CAPACITY_EPS)
    }

    /// Thermal diffusivity `k / (rho * c_p)` in m^2/s.
    pub fn diffusivity(&self) -> f64 {
        self.conductivity / self.volumetric_capacity()
    }

    /// Temperature rate due to heat generation alone, `q / (rho * c_p)` in K/s.
    pub fn generation_rate(&self) -> f64 {
        self.heat_generation / self.volumetric_capacity()
    }
}

impl Region {
    pub fn from_fluid_flag(is_fluid: bool) -> Self {
        if is_fluid { Region::Fluid } else { Region::Solid }
    }
}
