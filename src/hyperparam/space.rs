//! Search space definition for hyperparameters

use crate::error::{PipelineError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
    Bool(bool),
}

impl ParamValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Concrete hyperparameter assignment, ordered by name
pub type Params = BTreeMap<String, ParamValue>;

/// Distribution a single hyperparameter is drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Not searched; always this value
    Fixed(ParamValue),
    /// One of the listed values, uniformly
    Choice(Vec<ParamValue>),
    /// Continuous uniform on `[low, high]`
    Uniform { low: f64, high: f64 },
    /// `exp(uniform(ln low, ln high))`
    LogUniform { low: f64, high: f64 },
    /// Uniform rounded to a multiple of `q`
    QUniform { low: f64, high: f64, q: f64 },
    /// Integer uniform on `[low, high]`
    IntUniform { low: i64, high: i64 },
}

impl Distribution {
    /// Whether a search algorithm has anything to choose
    pub fn is_searchable(&self) -> bool {
        match self {
            Distribution::Fixed(_) => false,
            Distribution::Choice(choices) => choices.len() > 1,
            Distribution::IntUniform { low, high } => low < high,
            _ => true,
        }
    }

    /// Draw a value
    pub fn sample(&self, rng: &mut impl Rng) -> ParamValue {
        match self {
            Distribution::Fixed(v) => v.clone(),
            Distribution::Choice(choices) => choices[rng.gen_range(0..choices.len())].clone(),
            Distribution::Uniform { low, high } => {
                ParamValue::Float(rng.gen::<f64>() * (high - low) + low)
            }
            Distribution::LogUniform { low, high } => {
                let log_low = low.ln();
                let log_high = high.ln();
                ParamValue::Float((rng.gen::<f64>() * (log_high - log_low) + log_low).exp())
            }
            Distribution::QUniform { low, high, q } => {
                let raw = rng.gen::<f64>() * (high - low) + low;
                ParamValue::Float(((raw / q).round() * q).clamp(*low, *high))
            }
            Distribution::IntUniform { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
        }
    }

    /// Position of `value` inside the distribution, scaled to `[0, 1]`
    ///
    /// Choices map to their index. Used by samplers to compare trials.
    pub fn unit_position(&self, value: &ParamValue) -> Option<f64> {
        match self {
            Distribution::Fixed(_) => Some(0.0),
            Distribution::Choice(choices) => {
                let idx = choices.iter().position(|c| c == value)?;
                if choices.len() < 2 {
                    Some(0.0)
                } else {
                    Some(idx as f64 / (choices.len() - 1) as f64)
                }
            }
            Distribution::Uniform { low, high } | Distribution::QUniform { low, high, .. } => {
                let v = value.as_float()?;
                Some(((v - low) / (high - low)).clamp(0.0, 1.0))
            }
            Distribution::LogUniform { low, high } => {
                let v = value.as_float()?;
                if v <= 0.0 {
                    return None;
                }
                Some(((v.ln() - low.ln()) / (high.ln() - low.ln())).clamp(0.0, 1.0))
            }
            Distribution::IntUniform { low, high } => {
                let v = value.as_int()?;
                if high == low {
                    Some(0.0)
                } else {
                    Some(((v - low) as f64 / (high - low) as f64).clamp(0.0, 1.0))
                }
            }
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: &str| PipelineError::InvalidParameter {
            name: name.to_string(),
            value: format!("{:?}", self),
            reason: reason.to_string(),
        };
        match self {
            Distribution::Fixed(_) => Ok(()),
            Distribution::Choice(choices) if choices.is_empty() => Err(invalid("empty choice")),
            Distribution::Choice(_) => Ok(()),
            Distribution::Uniform { low, high } if !(low < high) => Err(invalid("low must be < high")),
            Distribution::LogUniform { low, high } if !(*low > 0.0 && low < high) => {
                Err(invalid("requires 0 < low < high"))
            }
            Distribution::QUniform { low, high, q } if !(low < high && *q > 0.0) => {
                Err(invalid("requires low < high and q > 0"))
            }
            Distribution::IntUniform { low, high } if low > high => Err(invalid("low must be <= high")),
            _ => Ok(()),
        }
    }
}

/// Named hyperparameter distributions for one model class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    params: BTreeMap<String, Distribution>,
}

impl ParamSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.params.insert(name.into(), distribution);
        self
    }

    /// Add a fixed value
    pub fn fixed(self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.add(name, Distribution::Fixed(value.into()))
    }

    /// Add a categorical parameter
    pub fn choice<V: Into<ParamValue>>(self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.add(
            name,
            Distribution::Choice(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Add a uniform float parameter
    pub fn uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, Distribution::Uniform { low, high })
    }

    /// Add a log-scale float parameter
    pub fn log_uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, Distribution::LogUniform { low, high })
    }

    /// Add a quantized float parameter
    pub fn quniform(self, name: impl Into<String>, low: f64, high: f64, q: f64) -> Self {
        self.add(name, Distribution::QUniform { low, high, q })
    }

    /// Add an integer parameter
    pub fn int_uniform(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, Distribution::IntUniform { low, high })
    }

    pub fn get(&self, name: &str) -> Option<&Distribution> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Distribution)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// True when at least one parameter is not fixed
    pub fn is_searchable(&self) -> bool {
        self.params.values().any(Distribution::is_searchable)
    }

    /// Values of the parameters that cannot vary
    pub fn fixed_params(&self) -> Params {
        self.params
            .iter()
            .filter_map(|(name, d)| {
                let value = match d {
                    Distribution::Fixed(v) => v.clone(),
                    Distribution::Choice(choices) if choices.len() == 1 => choices[0].clone(),
                    Distribution::IntUniform { low, high } if low == high => ParamValue::Int(*low),
                    _ => return None,
                };
                Some((name.clone(), value))
            })
            .collect()
    }

    /// Sample a full configuration
    pub fn sample(&self, rng: &mut impl Rng) -> Params {
        self.params
            .iter()
            .map(|(name, d)| (name.clone(), d.sample(rng)))
            .collect()
    }

    /// Check every distribution is well formed
    pub fn validate(&self) -> Result<()> {
        for (name, distribution) in &self.params {
            distribution.validate(name)?;
        }
        Ok(())
    }
}
