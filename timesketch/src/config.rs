// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Building sketches from runtime configuration.
//!
//! A [`SketchConfig`] names a sketch type and its parameters. It can be assembled in code or
//! read from `key = value` properties, where each parameter key is prefixed by the canonical
//! name of the sketch type:
//!
//! | key | type | required |
//! | --- | --- | --- |
//! | `CMG.epsilon` | `f64` in `(0, 1)` | for `CMG` |
//! | `CMG.use_indexed_tick` | `bool` | no, defaults to `true` |
//! | `TMG.epsilon` | `f64` in `(0, 1)` | for `TMG` |
//!
//! # Examples
//!
//! ```
//! # use timesketch::config::SketchConfig;
//! let config = SketchConfig::from_properties(
//!     "chain_misra_gries",
//!     [("CMG.epsilon", "0.01"), ("CMG.use_indexed_tick", "false")],
//! )
//! .unwrap();
//! let sketch = config.build().unwrap();
//! assert_eq!(sketch.short_description(), "CMG-e0.010000");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::PersistentHeavyHitterSketch;
use crate::chain::ChainMisraGries;
use crate::chain::TickAlgorithm;
use crate::error::Error;
use crate::exact::ExactHeavyHitters;
use crate::tree::TreeMisraGries;

/// The kinds of sketches that can be built from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchType {
    /// [`ChainMisraGries`]
    ChainMisraGries,
    /// [`TreeMisraGries`]
    TreeMisraGries,
    /// [`ExactHeavyHitters`]
    ExactHeavyHitters,
}

impl SketchType {
    /// All sketch types.
    pub const ALL: [SketchType; 3] = [
        SketchType::ChainMisraGries,
        SketchType::TreeMisraGries,
        SketchType::ExactHeavyHitters,
    ];

    /// Returns the canonical name, also used as the prefix of configuration keys.
    pub fn name(self) -> &'static str {
        match self {
            SketchType::ChainMisraGries => "CMG",
            SketchType::TreeMisraGries => "TMG",
            SketchType::ExactHeavyHitters => "EXACT_HH",
        }
    }

    /// Returns the alternative, descriptive name.
    pub fn alternative_name(self) -> &'static str {
        match self {
            SketchType::ChainMisraGries => "chain_misra_gries",
            SketchType::TreeMisraGries => "tree_misra_gries",
            SketchType::ExactHeavyHitters => "exact_heavy_hitters",
        }
    }
}

impl fmt::Display for SketchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SketchType {
    type Err = Error;

    /// Parses either the canonical or the alternative name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SketchType::ALL
            .into_iter()
            .find(|t| t.name() == s || t.alternative_name() == s)
            .ok_or_else(|| Error::unknown_sketch_type(s))
    }
}

/// Sketch type and parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SketchConfig {
    sketch_type: SketchType,
    epsilon: f64,
    tick_algorithm: TickAlgorithm,
}

impl SketchConfig {
    /// Configures a [`ChainMisraGries`] with the default tick algorithm.
    pub fn chain(epsilon: f64) -> Self {
        Self {
            sketch_type: SketchType::ChainMisraGries,
            epsilon,
            tick_algorithm: TickAlgorithm::default(),
        }
    }

    /// Configures a [`TreeMisraGries`].
    pub fn tree(epsilon: f64) -> Self {
        Self {
            sketch_type: SketchType::TreeMisraGries,
            epsilon,
            tick_algorithm: TickAlgorithm::default(),
        }
    }

    /// Configures an [`ExactHeavyHitters`].
    pub fn exact() -> Self {
        Self {
            sketch_type: SketchType::ExactHeavyHitters,
            epsilon: 0.0,
            tick_algorithm: TickAlgorithm::default(),
        }
    }

    /// Sets the tick algorithm. Only used by [`SketchType::ChainMisraGries`].
    pub fn with_tick_algorithm(mut self, tick_algorithm: TickAlgorithm) -> Self {
        self.tick_algorithm = tick_algorithm;
        self
    }

    /// Returns the sketch type.
    pub fn sketch_type(&self) -> SketchType {
        self.sketch_type
    }

    /// Returns the error bound. Zero for [`SketchType::ExactHeavyHitters`].
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the tick algorithm.
    pub fn tick_algorithm(&self) -> TickAlgorithm {
        self.tick_algorithm
    }

    /// Reads the configuration of the sketch type named `sketch_type` from `key = value`
    /// properties. Keys belonging to other sketch types are ignored.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::UnknownSketchType`](crate::error::ErrorKind::UnknownSketchType) if
    ///   `sketch_type` names no sketch type.
    /// * [`ErrorKind::ConfigMissing`](crate::error::ErrorKind::ConfigMissing) if a required
    ///   key is absent.
    /// * [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if a value
    ///   cannot be parsed.
    /// * [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument) if epsilon
    ///   is not in `(0, 1)`.
    pub fn from_properties<'a, I>(sketch_type: &str, properties: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let sketch_type: SketchType = sketch_type.parse()?;
        let properties: HashMap<&str, &str> = properties.into_iter().collect();
        let config = match sketch_type {
            SketchType::ChainMisraGries => {
                let mut config = Self::chain(required_epsilon(&properties, sketch_type)?);
                let key = "CMG.use_indexed_tick";
                if let Some(&value) = properties.get(key) {
                    let indexed: bool = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::config_invalid(key, value, "a boolean"))?;
                    config.tick_algorithm = if indexed {
                        TickAlgorithm::Indexed
                    } else {
                        TickAlgorithm::Scan
                    };
                }
                config
            }
            SketchType::TreeMisraGries => Self::tree(required_epsilon(&properties, sketch_type)?),
            SketchType::ExactHeavyHitters => Self::exact(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds the configured sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument) if
    /// epsilon is not in `(0, 1)`.
    pub fn build(&self) -> Result<Box<dyn PersistentHeavyHitterSketch>, Error> {
        self.validate()?;
        let sketch: Box<dyn PersistentHeavyHitterSketch> = match self.sketch_type {
            SketchType::ChainMisraGries => Box::new(
                ChainMisraGries::builder()
                    .epsilon(self.epsilon)
                    .tick_algorithm(self.tick_algorithm)
                    .build(),
            ),
            SketchType::TreeMisraGries => Box::new(TreeMisraGries::new(self.epsilon)),
            SketchType::ExactHeavyHitters => Box::new(ExactHeavyHitters::new()),
        };
        Ok(sketch)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.sketch_type == SketchType::ExactHeavyHitters {
            return Ok(());
        }
        if self.epsilon > 0.0 && self.epsilon < 1.0 {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "epsilon must be in (0, 1), got {}",
                self.epsilon
            ))
            .with_context("sketch_type", self.sketch_type))
        }
    }
}

fn required_epsilon(
    properties: &HashMap<&str, &str>,
    sketch_type: SketchType,
) -> Result<f64, Error> {
    let key = format!("{}.epsilon", sketch_type.name());
    let value = properties
        .get(key.as_str())
        .ok_or_else(|| Error::config_missing(key.as_str()))?;
    value
        .trim()
        .parse()
        .map_err(|_| Error::config_invalid(key.as_str(), value, "a floating point number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_sketch_type_names() {
        for sketch_type in SketchType::ALL {
            assert_eq!(sketch_type.name().parse::<SketchType>().unwrap(), sketch_type);
            assert_eq!(
                sketch_type.alternative_name().parse::<SketchType>().unwrap(),
                sketch_type
            );
        }
        let err = "cmg".parse::<SketchType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSketchType);
    }

    #[test]
    fn test_scan_tick_from_properties() {
        let config = SketchConfig::from_properties(
            "CMG",
            [("CMG.epsilon", " 0.05 "), ("CMG.use_indexed_tick", "false")],
        )
        .unwrap();
        assert_eq!(config.tick_algorithm(), TickAlgorithm::Scan);
        assert_eq!(config.epsilon(), 0.05);
    }

    #[test]
    fn test_exact_ignores_other_keys() {
        let config = SketchConfig::from_properties("EXACT_HH", [("CMG.epsilon", "0.01")]).unwrap();
        assert_eq!(config, SketchConfig::exact());
        assert_eq!(config.build().unwrap().short_description(), "EXACT_HH");
    }

    #[test]
    fn test_invalid_epsilon_is_rejected_by_build() {
        let err = SketchConfig::tree(1.5).build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
