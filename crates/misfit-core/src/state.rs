// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MisfitError;

/// Which ensemble state a response is read from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKind {
    #[default]
    Forecast,
    Analyzed,
    Both,
}

/// Address of one stored response: report step, realization, state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub report_step: usize,
    pub iens: usize,
    pub state: StateKind,
}

impl NodeId {
    pub fn new(report_step: usize, iens: usize, state: StateKind) -> Self {
        Self {
            report_step,
            iens,
            state,
        }
    }
}

/// A value produced by a scalar accessor before it is used as a ranking score.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeValue {
    F64(f64),
    F32(f32),
    I32(i32),
    Bool(bool),
    Text(String),
}

impl NodeValue {
    /// Converts numeric variants to `f64`; anything else is rejected.
    pub fn as_f64(&self) -> Result<f64, MisfitError> {
        match self {
            Self::F64(value) => Ok(*value),
            Self::F32(value) => Ok(f64::from(*value)),
            Self::I32(value) => Ok(f64::from(*value)),
            Self::Bool(_) => Err(MisfitError::unsupported_value_type(
                "boolean node values cannot be ranked",
            )),
            Self::Text(text) => Err(MisfitError::unsupported_value_type(format!(
                "text node value '{text}' cannot be ranked"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeValue, StateKind};
    use crate::MisfitError;

    #[test]
    fn state_kind_default_is_forecast() {
        assert_eq!(StateKind::default(), StateKind::Forecast);
    }

    #[test]
    fn state_kind_orders_for_use_as_map_key() {
        let mut series = std::collections::BTreeMap::new();
        series.insert((1, StateKind::Analyzed), "analyzed");
        series.insert((1, StateKind::Forecast), "forecast");
        series.insert((0, StateKind::Both), "both");
        let order: Vec<_> = series.values().copied().collect();
        assert_eq!(order, vec!["both", "forecast", "analyzed"]);
        assert!(StateKind::Forecast < StateKind::Analyzed);
    }

    #[test]
    fn numeric_node_values_widen_to_f64() {
        assert_eq!(NodeValue::F64(1.25).as_f64(), Ok(1.25));
        assert_eq!(NodeValue::F32(0.5).as_f64(), Ok(0.5));
        assert_eq!(NodeValue::I32(-3).as_f64(), Ok(-3.0));
    }

    #[test]
    fn non_numeric_node_values_are_unsupported() {
        let err = NodeValue::Text("OPEN".to_string())
            .as_f64()
            .expect_err("text cannot be ranked");
        assert!(matches!(err, MisfitError::UnsupportedValueType(_)));
        assert!(NodeValue::Bool(true).as_f64().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn state_kind_serde_roundtrip() {
        for state in [StateKind::Forecast, StateKind::Analyzed, StateKind::Both] {
            let encoded = serde_json::to_string(&state).expect("state should serialize");
            let decoded: StateKind =
                serde_json::from_str(&encoded).expect("state should deserialize");
            assert_eq!(decoded, state);
        }
        assert_eq!(
            serde_json::to_string(&StateKind::Forecast).expect("state should serialize"),
            "\"forecast\""
        );
    }
}
