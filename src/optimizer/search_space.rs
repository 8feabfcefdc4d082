//! Discrete hyperparameter grids

use crate::error::{KolosalError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
    /// Unset optional, e.g. an unlimited `max_depth`
    None,
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParameterValue::None)
    }

    /// Non-negative integer, or `InvalidParameter` for `name`.
    pub fn to_usize(&self, name: &str) -> Result<usize> {
        match self.as_int() {
            Some(v) if v >= 0 => Ok(v as usize),
            _ => Err(self.invalid(name, "expected a non-negative integer")),
        }
    }

    /// Like [`to_usize`](Self::to_usize) but `None` maps to `Ok(None)`.
    pub fn to_optional_usize(&self, name: &str) -> Result<Option<usize>> {
        if self.is_none() {
            return Ok(None);
        }
        self.to_usize(name).map(Some)
    }

    pub fn to_f64(&self, name: &str) -> Result<f64> {
        match self.as_float() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(self.invalid(name, "expected a finite number")),
        }
    }

    pub fn to_bool(&self, name: &str) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| self.invalid(name, "expected a boolean"))
    }

    pub fn to_str(&self, name: &str) -> Result<&str> {
        self.as_string()
            .ok_or_else(|| self.invalid(name, "expected a string"))
    }

    /// Build an `InvalidParameter` error for this value.
    pub fn invalid(&self, name: &str, reason: impl Into<String>) -> KolosalError {
        KolosalError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "'{}'", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::None => write!(f, "None"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl<T: Into<ParameterValue>> From<Option<T>> for ParameterValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParameterValue::None, Into::into)
    }
}

/// One concrete assignment of hyperparameters, in grid key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(pub Vec<(String, ParameterValue)>);

impl ParamSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Ordered mapping of hyperparameter name to its candidate values.
///
/// Enumeration order is the cartesian product in declared key order with the
/// last key varying fastest. An empty grid has exactly one (empty) combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParameterValue>)>,
}

impl ParamGrid {
    /// Create a new empty grid
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a hyperparameter and its candidate values.
    ///
    /// Re-adding an existing name replaces its values in place.
    pub fn add<V: Into<ParameterValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let name = name.into();
        let values: Vec<ParameterValue> = values.into_iter().map(Into::into).collect();
        match self.params.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = values,
            None => self.params.push((name, values)),
        }
        self
    }

    pub fn ints(self, name: impl Into<String>, values: &[i64]) -> Self {
        self.add(name, values.iter().copied())
    }

    pub fn floats(self, name: impl Into<String>, values: &[f64]) -> Self {
        self.add(name, values.iter().copied())
    }

    pub fn strings(self, name: impl Into<String>, values: &[&str]) -> Self {
        self.add(name, values.iter().copied())
    }

    /// Integers where `None` stands for "unset".
    pub fn optional_ints(self, name: impl Into<String>, values: &[Option<i64>]) -> Self {
        self.add(name, values.iter().copied())
    }

    /// Number of hyperparameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self, name: &str) -> Option<&[ParameterValue]> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Total number of combinations
    pub fn n_combinations(&self) -> usize {
        self.params.iter().map(|(_, v)| v.len()).product()
    }

    /// Decode combination `index` (mixed radix, last key fastest).
    pub fn combination(&self, index: usize) -> Option<ParamSet> {
        if index >= self.n_combinations() {
            return None;
        }
        let mut rem = index;
        let mut out = Vec::with_capacity(self.params.len());
        for (name, values) in self.params.iter().rev() {
            let n = values.len();
            out.push((name.clone(), values[rem % n].clone()));
            rem /= n;
        }
        out.reverse();
        Some(ParamSet(out))
    }

    /// All combinations in enumeration order
    pub fn combinations(&self) -> Vec<ParamSet> {
        (0..self.n_combinations())
            .filter_map(|i| self.combination(i))
            .collect()
    }

    /// Up to `n` distinct combinations drawn uniformly without replacement,
    /// returned in enumeration order.
    pub fn sample(&self, n: usize, rng: &mut impl Rng) -> Vec<ParamSet> {
        let total = self.n_combinations();
        if n >= total {
            return self.combinations();
        }
        let mut picked = rand::seq::index::sample(rng, total, n).into_vec();
        picked.sort_unstable();
        picked
            .into_iter()
            .filter_map(|i| self.combination(i))
            .collect()
    }
}
