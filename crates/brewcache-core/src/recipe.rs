//! V60 recipe math.
//!
//! For a water weight `w` and brew ratio `r`:
//! - coffee = w / r, one decimal
//! - bloom  = 2 × coffee, whole grams
//! - pour 1 = 60% of w, whole grams
//! - pour 2 = w (the cumulative target on the scale)

use serde::{Deserialize, Serialize};

/// Absorbs float noise when comparing ratios that are whole tenths.
///
/// 16.4 and 17.0 sit on the tolerance boundary and do not snap. A raw
/// compare agrees (`(16.4 - 16.7).abs()` is `0.3000000000000007`), but only
/// through rounding. The epsilon keeps the boundary exclusive either way.
const RATIO_EPSILON: f64 = 1e-9;

/// Product constants of the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeSettings {
    pub default_ratio: f64,
    /// Ratios closer than this to the default are treated as the default.
    pub snap_tolerance: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub ratio_step: f64,
    pub min_water: u32,
    pub max_water: u32,
    pub water_step: u32,
    /// Row marked as the suggested single cup.
    pub highlight_water: u32,
    pub pour1_fraction: f64,
    pub bloom_multiplier: f64,
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            default_ratio: 16.7,
            snap_tolerance: 0.3,
            min_ratio: 14.0,
            max_ratio: 18.0,
            ratio_step: 0.1,
            min_water: 100,
            max_water: 500,
            water_step: 10,
            highlight_water: 250,
            pour1_fraction: 0.6,
            bloom_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recipe {
    pub water: u32,
    pub coffee: f64,
    pub bloom: u32,
    pub pour1: u32,
    pub pour2: u32,
}

impl Recipe {
    pub fn label(&self) -> String {
        format!("{}g water · {:.1}g coffee", self.water, self.coffee)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecipeRow {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub highlighted: bool,
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl RecipeSettings {
    /// Recipe for `water` grams at exactly `ratio` (no snapping).
    pub fn compute(&self, water: u32, ratio: f64) -> Recipe {
        let coffee = round_tenths(f64::from(water) / ratio);
        Recipe {
            water,
            coffee,
            bloom: (coffee * self.bloom_multiplier).round() as u32,
            pour1: (f64::from(water) * self.pour1_fraction).round() as u32,
            pour2: water,
        }
    }

    /// The ratio actually used: clamped to the slider range, then snapped
    /// to the default when within tolerance.
    pub fn effective_ratio(&self, ratio: f64) -> f64 {
        if !ratio.is_finite() {
            return self.default_ratio;
        }
        let ratio = ratio.clamp(self.min_ratio, self.max_ratio);
        if (ratio - self.default_ratio).abs() + RATIO_EPSILON < self.snap_tolerance {
            self.default_ratio
        } else {
            ratio
        }
    }

    pub fn is_default_ratio(&self, ratio: f64) -> bool {
        (self.effective_ratio(ratio) - self.default_ratio).abs() < RATIO_EPSILON
    }

    pub fn water_amounts(&self) -> impl Iterator<Item = u32> {
        (self.min_water..=self.max_water).step_by(self.water_step.max(1) as usize)
    }
}

/// Recipe with the default product constants.
pub fn compute_recipe(water: u32, ratio: f64) -> Recipe {
    RecipeSettings::default().compute(water, ratio)
}

/// One row per water amount, computed at the effective ratio.
pub fn recipe_table(ratio: f64, settings: &RecipeSettings) -> Vec<RecipeRow> {
    let ratio = settings.effective_ratio(ratio);
    settings
        .water_amounts()
        .map(|water| RecipeRow {
            recipe: settings.compute(water, ratio),
            highlighted: water == settings.highlight_water,
        })
        .collect()
}

/// The ratio slider.
///
/// Keeps the raw position separately from the effective ratio so stepping
/// can move through the snap zone.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioControl {
    raw: f64,
    settings: RecipeSettings,
}

impl RatioControl {
    pub fn new(settings: RecipeSettings) -> Self {
        Self {
            raw: settings.default_ratio,
            settings,
        }
    }

    pub fn with_value(settings: RecipeSettings, raw: f64) -> Self {
        let mut control = Self::new(settings);
        control.set(raw);
        control
    }

    /// Move the slider. Non-finite values are ignored.
    pub fn set(&mut self, raw: f64) {
        if raw.is_finite() {
            self.raw = round_tenths(raw.clamp(self.settings.min_ratio, self.settings.max_ratio));
        }
    }

    pub fn step_up(&mut self) {
        self.set(self.raw + self.settings.ratio_step);
    }

    pub fn step_down(&mut self) {
        self.set(self.raw - self.settings.ratio_step);
    }

    pub fn reset(&mut self) {
        self.raw = self.settings.default_ratio;
    }

    pub fn raw(&self) -> f64 {
        self.raw
    }

    pub fn effective(&self) -> f64 {
        self.settings.effective_ratio(self.raw)
    }

    pub fn is_default(&self) -> bool {
        self.settings.is_default_ratio(self.raw)
    }

    /// The reset control is only offered away from the default.
    pub fn show_reset(&self) -> bool {
        !self.is_default()
    }

    pub fn display(&self) -> String {
        format!("1:{:.1}", self.effective())
    }

    pub fn settings(&self) -> &RecipeSettings {
        &self.settings
    }
}

impl Default for RatioControl {
    fn default() -> Self {
        Self::new(RecipeSettings::default())
    }
}
