//! Filter and effect configuration.

use std::collections::BTreeMap;

use aural_core::{DistanceModel, LfoWaveform};
use aural_effects::{Dsp, DspFlags, DspKind, EffectType, FilterOrder, FilterType, MAX_SLOTS, SLOT_PARAMS};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A parameter value: a plain number or a string with a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// Plain number.
    Number(f32),
    /// Number with a unit, see [`parse_param_value`].
    Text(String),
}

impl ParamValue {
    /// The value in base units (linear gain, seconds, Hz).
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => parse_param_value(s),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Configuration of one filter or effect on a node.
///
/// The type is a [`DspKind`] name. A `!` prefix (e.g. `"!reverb"`) keeps
/// the parameters but leaves the stage disabled. Parameters can be given by
/// name in `params`, or positionally as whole slots in `slots`; named
/// values win.
///
/// ```rust
/// use aural_config::EffectConfig;
///
/// let chorus = EffectConfig::new("chorus")
///     .with_param("depth", 0.4)
///     .with_param("rate", "0.8Hz")
///     .with_waveform("sine");
/// let dsp = chorus.to_dsp().unwrap();
/// assert!(dsp.is_enabled());
/// assert_eq!(dsp.get(0, 1), Some(0.8));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectConfig {
    /// Filter or effect name.
    #[serde(rename = "type")]
    pub kind: String,

    /// Whether the stage is armed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Named parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,

    /// Positional parameter slots, four values each.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<[f32; SLOT_PARAMS]>,

    /// LFO waveform: triangle, sine, square, sawtooth or envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform: Option<String>,

    /// Roll-off: 6db, 12db, 24db, 36db or 48db.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// Distance curve: none, inverse, linear or exponential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Inverts the LFO or the distance curve.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inverse: bool,

    /// Lets tracks modulate independently instead of stereo-linked.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unlinked: bool,

    /// Clamps the distance before applying the curve.
    #[serde(default, skip_serializing_if = "is_false")]
    pub clamped: bool,
}

fn default_enabled() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl EffectConfig {
    /// An enabled stage with default parameters.
    ///
    /// A `!` prefix creates it disabled.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let (kind, enabled) = match kind.strip_prefix('!') {
            Some(stripped) => (stripped.to_string(), false),
            None => (kind, true),
        };
        Self {
            kind,
            enabled,
            params: BTreeMap::new(),
            slots: Vec::new(),
            waveform: None,
            order: None,
            model: None,
            inverse: false,
            unlinked: false,
            clamped: false,
        }
    }

    /// Adds a named parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the LFO waveform name.
    pub fn with_waveform(mut self, waveform: impl Into<String>) -> Self {
        self.waveform = Some(waveform.into());
        self
    }

    /// Sets the roll-off name.
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Sets the distance curve name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Name without a `!` prefix.
    pub fn canonical_kind(&self) -> &str {
        self.kind.strip_prefix('!').unwrap_or(&self.kind)
    }

    /// Resolved kind.
    pub fn dsp_kind(&self) -> Result<DspKind> {
        DspKind::from_name(self.canonical_kind())
            .ok_or_else(|| ConfigError::UnknownEffect(self.canonical_kind().to_string()))
    }

    /// Builds the descriptor, validating every value.
    ///
    /// Out-of-range numbers are clamped by the descriptor; unknown names,
    /// unparsable values and non-finite numbers are errors.
    pub fn to_dsp(&self) -> Result<Dsp> {
        let kind = self.dsp_kind()?;
        let effect = kind.name();
        let mut dsp = Dsp::new(kind);

        if self.slots.len() > MAX_SLOTS {
            return Err(ConfigError::invalid_param(
                effect,
                "slots",
                format!("at most {MAX_SLOTS} slots, got {}", self.slots.len()),
            ));
        }
        for (index, values) in self.slots.iter().enumerate() {
            if !dsp.set_slot(index, *values) {
                return Err(ConfigError::invalid_param(
                    effect,
                    format!("slots[{index}]"),
                    "values must be finite",
                ));
            }
        }

        for (name, value) in &self.params {
            let Some(number) = value.as_f32() else {
                return Err(ConfigError::invalid_param(
                    effect,
                    name,
                    "expected a number, optionally with %, dB, ms, s, Hz or kHz",
                ));
            };
            if kind.param_by_name(name).is_none() {
                return Err(ConfigError::invalid_param(effect, name, "unknown parameter"));
            }
            if !dsp.set_named(name, number) {
                return Err(ConfigError::invalid_param(effect, name, "value must be finite"));
            }
        }

        if let Some(name) = &self.waveform {
            let waveform = parse_waveform(name)
                .ok_or_else(|| ConfigError::invalid_param(effect, "waveform", format!("unknown waveform '{name}'")))?;
            dsp.set_waveform(waveform);
        }
        if let Some(name) = &self.order {
            let order = parse_order(name)
                .ok_or_else(|| ConfigError::invalid_param(effect, "order", format!("unknown roll-off '{name}'")))?;
            dsp.set_order(order);
        }
        if let Some(name) = &self.model {
            let model = parse_model(name)
                .ok_or_else(|| ConfigError::invalid_param(effect, "model", format!("unknown distance model '{name}'")))?;
            dsp.set_distance_model(model);
        }

        let mut flags = DspFlags::NONE;
        if self.inverse {
            flags = flags.union(DspFlags::INVERSE);
        }
        if self.unlinked {
            flags = flags.union(DspFlags::UNLINKED);
        }
        if self.clamped {
            flags = flags.union(DspFlags::CLAMPED);
        }
        dsp.set_flags(flags);
        dsp.set_enabled(self.enabled && !self.kind.starts_with('!'));
        Ok(dsp)
    }

    /// Describes an existing descriptor with named parameters.
    pub fn from_dsp(dsp: &Dsp) -> Self {
        let kind = dsp.kind();
        let mut config = Self::new(kind.name());
        config.enabled = dsp.is_enabled();

        for slot in 0..MAX_SLOTS {
            for index in 0..SLOT_PARAMS {
                if let (Some(range), Some(value)) = (kind.param(slot, index), dsp.get(slot, index)) {
                    config.params.insert(range.name.to_string(), ParamValue::Number(value));
                }
            }
        }

        match kind {
            DspKind::Filter(FilterType::Frequency) => {
                config.order = Some(order_name(dsp.order()).to_string());
                config.waveform = Some(waveform_name(dsp.waveform()).to_string());
            }
            DspKind::Filter(FilterType::Equalizer) => {
                config.order = Some(order_name(dsp.order()).to_string());
            }
            DspKind::Filter(FilterType::DynamicGain) => {
                config.waveform = Some(waveform_name(dsp.waveform()).to_string());
            }
            DspKind::Filter(FilterType::Distance) => {
                config.model = Some(model_name(dsp.distance_model()).to_string());
            }
            DspKind::Effect(e) if e.delay_mode().is_some() => {
                config.order = Some(order_name(dsp.order()).to_string());
                config.waveform = Some(waveform_name(dsp.waveform()).to_string());
            }
            DspKind::Effect(EffectType::Reverb) => {
                config.order = Some(order_name(dsp.order()).to_string());
            }
            _ => {}
        }

        let flags = dsp.flags();
        config.inverse = flags.contains(DspFlags::INVERSE);
        config.unlinked = flags.contains(DspFlags::UNLINKED);
        config.clamped = flags.contains(DspFlags::CLAMPED);
        config
    }
}

/// Parses a parameter value string into an f32 in base units.
///
/// Supports:
/// - Plain numbers: "0.5", "-0.3"
/// - Percentages: "50%" (divided by 100)
/// - Decibels: "-6dB" (converted to linear gain)
/// - Milliseconds: "20ms" (converted to seconds)
/// - Seconds: "1.5s"
/// - Hertz: "440Hz", "1.2kHz"
pub fn parse_param_value(value: &str) -> Option<f32> {
    let value = value.trim();

    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|v| v / 100.0);
    }

    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return db.trim().parse::<f32>().ok().map(|v| 10f32.powf(v / 20.0));
    }

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<f32>().ok().map(|v| v / 1000.0);
    }

    if let Some(s) = value.strip_suffix('s') {
        return s.trim().parse::<f32>().ok();
    }

    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return khz.trim().parse::<f32>().ok().map(|v| v * 1000.0);
    }

    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return hz.trim().parse::<f32>().ok();
    }

    value.parse::<f32>().ok()
}

/// Parses an LFO waveform name.
pub fn parse_waveform(name: &str) -> Option<LfoWaveform> {
    match name.trim().to_ascii_lowercase().as_str() {
        "triangle" => Some(LfoWaveform::Triangle),
        "sine" => Some(LfoWaveform::Sine),
        "square" => Some(LfoWaveform::Square),
        "sawtooth" | "saw" => Some(LfoWaveform::Sawtooth),
        "envelope" | "envelope-follow" => Some(LfoWaveform::Envelope),
        _ => None,
    }
}

/// Parses a roll-off name such as `"24db"` or `"24dB/oct"`.
pub fn parse_order(name: &str) -> Option<FilterOrder> {
    let name = name.trim().to_ascii_lowercase();
    let db = name.strip_suffix("/oct").unwrap_or(&name);
    match db.strip_suffix("db").unwrap_or(db).trim() {
        "6" => Some(FilterOrder::Db6),
        "12" => Some(FilterOrder::Db12),
        "24" => Some(FilterOrder::Db24),
        "36" => Some(FilterOrder::Db36),
        "48" => Some(FilterOrder::Db48),
        _ => None,
    }
}

/// Parses a distance curve name.
pub fn parse_model(name: &str) -> Option<DistanceModel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "none" => Some(DistanceModel::None),
        "inverse" => Some(DistanceModel::Inverse),
        "linear" => Some(DistanceModel::Linear),
        "exponential" | "exp" => Some(DistanceModel::Exponential),
        _ => None,
    }
}

fn waveform_name(waveform: LfoWaveform) -> &'static str {
    match waveform {
        LfoWaveform::Triangle => "triangle",
        LfoWaveform::Sine => "sine",
        LfoWaveform::Square => "square",
        LfoWaveform::Sawtooth => "sawtooth",
        LfoWaveform::Envelope => "envelope",
    }
}

fn order_name(order: FilterOrder) -> &'static str {
    match order {
        FilterOrder::Db6 => "6db",
        FilterOrder::Db12 => "12db",
        FilterOrder::Db24 => "24db",
        FilterOrder::Db36 => "36db",
        FilterOrder::Db48 => "48db",
    }
}

fn model_name(model: DistanceModel) -> &'static str {
    match model {
        DistanceModel::None => "none",
        DistanceModel::Inverse => "inverse",
        DistanceModel::Linear => "linear",
        DistanceModel::Exponential => "exponential",
    }
}
