//! Dough temperature control
//!
//! Closed-form mixing-water temperature, ice substitution for cooling, the
//! pre-chill temperature for other wet ingredients when ice alone cannot do
//! it, and the hold-back water advice for high-hydration doughs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ThermalContext;

/// Effective heat absorbed by melting ice, expressed in °C of water
pub const ICE_HEAT_OFFSET: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Hydration above which part of the water is withheld during mixing
pub const HOLD_BACK_HYDRATION_THRESHOLD: Decimal = Decimal::from_parts(65, 0, 0, false, 2);

/// Required mixing-water temperature:
/// `(target - friction) × 3 - flour - ambient`
pub fn required_water_temperature(
    target_dough_temperature: Decimal,
    mixer_friction_factor: Decimal,
    flour_temperature: Decimal,
    ambient_temperature: Decimal,
) -> Decimal {
    (target_dough_temperature - mixer_friction_factor) * Decimal::from(3)
        - flour_temperature
        - ambient_temperature
}

/// Grams of ice replacing water to bring `total_water_grams` from the
/// current to the required temperature. Zero when no cooling is needed.
pub fn ice_substitution(
    required_water_temperature: Decimal,
    total_water_grams: Decimal,
    current_water_temperature: Decimal,
) -> Decimal {
    if required_water_temperature >= current_water_temperature {
        return Decimal::ZERO;
    }
    let denominator = current_water_temperature + ICE_HEAT_OFFSET;
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    total_water_grams * (current_water_temperature - required_water_temperature) / denominator
}

/// Temperature the other wet ingredients must be chilled to when every gram
/// of `available_water_grams` is replaced by ice.
///
/// `None` when the evaluated row holds all the water, since there is nothing
/// else left to chill.
pub fn required_wet_temperature(
    total_water_grams: Decimal,
    target_water_temperature: Decimal,
    available_water_grams: Decimal,
) -> Option<Decimal> {
    let denominator = available_water_grams - total_water_grams;
    if denominator.is_zero() {
        return None;
    }
    Some(
        (-total_water_grams * target_water_temperature - ICE_HEAT_OFFSET * available_water_grams)
            / denominator,
    )
}

/// Water to withhold and add late in mixing when hydration exceeds 65%
pub fn hold_back_water(total_water_grams: Decimal, total_flour_grams: Decimal) -> Option<Decimal> {
    if total_flour_grams <= Decimal::ZERO {
        return None;
    }
    let threshold = HOLD_BACK_HYDRATION_THRESHOLD;
    if total_water_grams / total_flour_grams > threshold {
        Some(total_water_grams - threshold * total_flour_grams)
    } else {
        None
    }
}

/// Inputs for a full thermal evaluation of one water row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThermalInputs {
    pub target_dough_temperature: Decimal,
    pub context: ThermalContext,
    /// Water poured at mixing, across every wet row of the dough
    pub batch_water_grams: Decimal,
    /// Water carried by the row under evaluation
    pub row_water_grams: Decimal,
    /// Whole-dough water, pre-doughs included, for true hydration
    pub hydration_water_grams: Decimal,
    /// Whole-dough flour, pre-doughs included
    pub hydration_flour_grams: Decimal,
}

impl ThermalInputs {
    /// Single-row evaluation: the row holds all the batch water and no
    /// hydration figures are known.
    pub fn new(target_dough_temperature: Decimal, context: ThermalContext, total_water_grams: Decimal) -> Self {
        Self {
            target_dough_temperature,
            context,
            batch_water_grams: total_water_grams,
            row_water_grams: total_water_grams,
            hydration_water_grams: Decimal::ZERO,
            hydration_flour_grams: Decimal::ZERO,
        }
    }

    pub fn with_row_water(mut self, row_water_grams: Decimal) -> Self {
        self.row_water_grams = row_water_grams;
        self
    }

    pub fn with_hydration(mut self, water_grams: Decimal, flour_grams: Decimal) -> Self {
        self.hydration_water_grams = water_grams;
        self.hydration_flour_grams = flour_grams;
        self
    }
}

/// Advice attached to a water row. Values are unrounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermalReport {
    pub required_water_temperature: Decimal,
    pub ice_grams: Decimal,
    /// False when the ice needed exceeds the water in the row
    pub ice_feasible: bool,
    /// Pre-chill temperature for other wet ingredients when ice is not feasible
    pub required_wet_temperature: Option<Decimal>,
    pub hydration: Option<Decimal>,
    pub hold_back_water_grams: Option<Decimal>,
}

/// Evaluate water temperature, ice, pre-chill and hold-back advice
pub fn compute_thermals(inputs: &ThermalInputs) -> ThermalReport {
    let context = &inputs.context;
    let required = required_water_temperature(
        inputs.target_dough_temperature,
        context.mixer_friction_factor,
        context.flour_temperature,
        context.ambient_temperature,
    );
    let ice = ice_substitution(required, inputs.batch_water_grams, context.water_temperature);

    let ice_feasible = ice <= inputs.row_water_grams;
    let required_wet = if ice_feasible {
        None
    } else {
        required_wet_temperature(inputs.batch_water_grams, required, inputs.row_water_grams)
    };

    let hydration = if inputs.hydration_flour_grams > Decimal::ZERO {
        Some(inputs.hydration_water_grams / inputs.hydration_flour_grams)
    } else {
        None
    };

    ThermalReport {
        required_water_temperature: required,
        ice_grams: ice,
        ice_feasible,
        required_wet_temperature: required_wet,
        hydration,
        hold_back_water_grams: hold_back_water(inputs.hydration_water_grams, inputs.hydration_flour_grams),
    }
}
