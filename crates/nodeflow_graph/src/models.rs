// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in numeric data models.
//!
//! Sources, displays and arithmetic operators operating on
//! [`PortValue::Float`] payloads. They double as reference
//! implementations of [`DataModel`].

use crate::model::{DataModel, DataModelRegistry, ModelSignals};
use crate::port::{PortDirection, PortIndex, PortType, PortValue};
use serde_json::{Map, Value};
use std::any::Any;

/// Category of value-producing models
pub const CATEGORY_SOURCES: &str = "Sources";
/// Category of value-consuming models
pub const CATEGORY_DISPLAYS: &str = "Displays";
/// Category of arithmetic models
pub const CATEGORY_OPERATORS: &str = "Operators";

/// Create a registry holding every built-in model
pub fn create_math_registry() -> DataModelRegistry {
    let mut registry = DataModelRegistry::new();

    registry.register::<NumberSourceModel>(CATEGORY_SOURCES);
    registry.register::<NumberDisplayModel>(CATEGORY_DISPLAYS);

    for op in BinaryOp::ALL {
        registry.register_with(op.name(), CATEGORY_OPERATORS, move || {
            Box::new(OperatorModel::new(op))
        });
    }
    registry.register::<VariadicSumModel>(CATEGORY_OPERATORS);

    registry
}

fn float_input(data: Option<PortValue>) -> Option<f64> {
    data.as_ref().and_then(PortValue::as_float)
}

// ============================================================================
// Number source
// ============================================================================

/// Emits a user-supplied number on its single output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSourceModel {
    number: f64,
}

impl NumberSourceModel {
    /// Source emitting `number`
    pub fn with_value(number: f64) -> Self {
        Self { number }
    }

    /// Current number
    pub fn number(&self) -> f64 {
        self.number
    }

    /// Change the number and signal the output update
    pub fn set_number(&mut self, number: f64, signals: &mut ModelSignals) {
        self.number = number;
        signals.data_updated(0);
    }
}

impl DataModel for NumberSourceModel {
    fn name(&self) -> &str {
        "NumberSource"
    }

    fn caption(&self) -> &str {
        "Number Source"
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => 0,
            PortDirection::Output => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> PortType {
        PortType::Float
    }

    fn set_in_data(&mut self, _data: Option<PortValue>, _index: PortIndex, _signals: &mut ModelSignals) {}

    fn out_data(&self, _index: PortIndex) -> Option<PortValue> {
        Some(PortValue::Float(self.number))
    }

    fn save(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("number".to_string(), Value::from(self.number));
        state
    }

    fn restore(&mut self, state: &Map<String, Value>) {
        if let Some(number) = state.get("number").and_then(Value::as_f64) {
            self.number = number;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Number display
// ============================================================================

/// Shows the last number received on its single input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberDisplayModel {
    value: Option<f64>,
}

impl NumberDisplayModel {
    /// Last received number, `None` when the input is empty
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl DataModel for NumberDisplayModel {
    fn name(&self) -> &str {
        "NumberDisplay"
    }

    fn caption(&self) -> &str {
        "Result"
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => 1,
            PortDirection::Output => 0,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> PortType {
        PortType::Float
    }

    fn set_in_data(&mut self, data: Option<PortValue>, _index: PortIndex, _signals: &mut ModelSignals) {
        self.value = float_input(data);
    }

    fn out_data(&self, _index: PortIndex) -> Option<PortValue> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Binary operators
// ============================================================================

/// Arithmetic performed by an [`OperatorModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryOp {
    /// `lhs + rhs`
    #[default]
    Add,
    /// `lhs - rhs`
    Subtract,
    /// `lhs * rhs`
    Multiply,
    /// `lhs / rhs`, empty when `rhs` is zero
    Divide,
}

impl BinaryOp {
    /// Every operator
    pub const ALL: [BinaryOp; 4] = [Self::Add, Self::Subtract, Self::Multiply, Self::Divide];

    /// Registry name of the operator's model
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Addition",
            Self::Subtract => "Subtraction",
            Self::Multiply => "Multiplication",
            Self::Divide => "Division",
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Self::Add => Some(lhs + rhs),
            Self::Subtract => Some(lhs - rhs),
            Self::Multiply => Some(lhs * rhs),
            Self::Divide if rhs == 0.0 => None,
            Self::Divide => Some(lhs / rhs),
        }
    }
}

/// Two float inputs, one float output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorModel {
    op: BinaryOp,
    lhs: Option<f64>,
    rhs: Option<f64>,
    result: Option<f64>,
}

impl OperatorModel {
    /// Operator model for `op`
    pub fn new(op: BinaryOp) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }

    /// The operator
    pub fn op(&self) -> BinaryOp {
        self.op
    }

    fn compute(&mut self) {
        self.result = match (self.lhs, self.rhs) {
            (Some(lhs), Some(rhs)) => self.op.apply(lhs, rhs),
            _ => None,
        };
    }
}

impl DataModel for OperatorModel {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => 2,
            PortDirection::Output => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> PortType {
        PortType::Float
    }

    fn set_in_data(&mut self, data: Option<PortValue>, index: PortIndex, signals: &mut ModelSignals) {
        let value = float_input(data);
        match index {
            0 => self.lhs = value,
            _ => self.rhs = value,
        }
        self.compute();
        signals.data_updated(0);
    }

    fn out_data(&self, _index: PortIndex) -> Option<PortValue> {
        self.result.map(PortValue::Float)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Variadic sum
// ============================================================================

const DEFAULT_SUM_INPUTS: usize = 2;

/// Largest input count a sum accepts from saved state
pub const MAX_SUM_INPUTS: usize = 256;

/// Sums a configurable number of float inputs
#[derive(Debug, Clone, PartialEq)]
pub struct VariadicSumModel {
    inputs: Vec<Option<f64>>,
}

impl Default for VariadicSumModel {
    fn default() -> Self {
        Self {
            inputs: vec![None; DEFAULT_SUM_INPUTS],
        }
    }
}

impl VariadicSumModel {
    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Change the number of inputs.
    ///
    /// Dropped inputs stop contributing to the sum.
    pub fn set_input_count(&mut self, count: usize, signals: &mut ModelSignals) {
        if count == self.inputs.len() {
            return;
        }
        self.inputs.resize(count, None);
        signals.ports_changed();
        signals.data_updated(0);
    }

    fn sum(&self) -> Option<f64> {
        self.inputs
            .iter()
            .flatten()
            .copied()
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
    }
}

impl DataModel for VariadicSumModel {
    fn name(&self) -> &str {
        "Sum"
    }

    fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => self.inputs.len(),
            PortDirection::Output => 1,
        }
    }

    fn data_type(&self, _direction: PortDirection, _index: PortIndex) -> PortType {
        PortType::Float
    }

    fn set_in_data(&mut self, data: Option<PortValue>, index: PortIndex, signals: &mut ModelSignals) {
        self.inputs[index] = float_input(data);
        signals.data_updated(0);
    }

    fn out_data(&self, _index: PortIndex) -> Option<PortValue> {
        self.sum().map(PortValue::Float)
    }

    fn save(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("inputs".to_string(), Value::from(self.inputs.len()));
        state
    }

    fn restore(&mut self, state: &Map<String, Value>) {
        if let Some(saved) = state.get("inputs").and_then(Value::as_u64) {
            let count = usize::try_from(saved).unwrap_or(usize::MAX).min(MAX_SUM_INPUTS);
            if count as u64 != saved {
                tracing::warn!("Sum input count {saved} clamped to {MAX_SUM_INPUTS}");
            }
            self.inputs = vec![None; count];
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_registry_contents() {
        let registry = create_math_registry();
        for name in ["NumberSource", "NumberDisplay", "Addition", "Subtraction", "Multiplication", "Division", "Sum"] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert_eq!(registry.create("Division").unwrap().name(), "Division");
        assert_eq!(
            registry.categories(),
            vec![CATEGORY_SOURCES, CATEGORY_DISPLAYS, CATEGORY_OPERATORS]
        );
    }

    #[test]
    fn test_operator_waits_for_both_inputs() {
        let mut model = OperatorModel::new(BinaryOp::Subtract);
        let mut signals = ModelSignals::new();

        model.set_in_data(Some(PortValue::Float(5.0)), 0, &mut signals);
        assert_eq!(model.out_data(0), None);
        assert_eq!(signals.updated(), &[0]);

        model.set_in_data(Some(PortValue::Float(2.0)), 1, &mut signals);
        assert_eq!(model.out_data(0), Some(PortValue::Float(3.0)));

        model.set_in_data(None, 0, &mut signals);
        assert_eq!(model.out_data(0), None);
    }

    #[test]
    fn test_division_by_zero_is_empty() {
        let mut model = OperatorModel::new(BinaryOp::Divide);
        let mut signals = ModelSignals::new();
        model.set_in_data(Some(PortValue::Float(1.0)), 0, &mut signals);
        model.set_in_data(Some(PortValue::Float(0.0)), 1, &mut signals);
        assert_eq!(model.out_data(0), None);
    }

    #[test]
    fn test_variadic_sum_resize() {
        let mut model = VariadicSumModel::default();
        let mut signals = ModelSignals::new();
        model.set_in_data(Some(PortValue::Float(1.5)), 1, &mut signals);
        assert_eq!(model.out_data(0), Some(PortValue::Float(1.5)));

        model.set_input_count(1, &mut signals);
        assert!(signals.has_port_change());
        assert_eq!(model.port_count(PortDirection::Input), 1);
        assert_eq!(model.out_data(0), None);

        let mut restored = VariadicSumModel::default();
        restored.restore(&model.save());
        assert_eq!(restored.input_count(), 1);
    }

    #[test]
    fn test_number_source_save_restore() {
        let source = NumberSourceModel::with_value(-1.25);
        let mut restored = NumberSourceModel::default();
        restored.restore(&source.save());
        assert_eq!(restored, source);
    }

    #[test]
    fn test_sum_restore_clamps_input_count() {
        let mut state = Map::new();
        state.insert("inputs".to_string(), Value::from(u64::MAX));

        let mut model = VariadicSumModel::default();
        model.restore(&state);
        assert_eq!(model.input_count(), MAX_SUM_INPUTS);

        state.insert("inputs".to_string(), Value::from(5));
        model.restore(&state);
        assert_eq!(model.input_count(), 5);
    }
}
