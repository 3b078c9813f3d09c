//! Brew step sequencing.
//!
//! Steps only move forward: `Locked -> Available -> Running -> Completed`.
//! At most one step runs at a time and a step becomes available only after
//! the previous one completed (step 0: once a recipe is selected).

use serde::Serialize;

use crate::recipe::Recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Locked,
    Available,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrewStep {
    Bloom,
    FirstPour,
    SecondPour,
    Drawdown,
}

impl BrewStep {
    pub const ALL: [BrewStep; 4] = [
        BrewStep::Bloom,
        BrewStep::FirstPour,
        BrewStep::SecondPour,
        BrewStep::Drawdown,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            BrewStep::Bloom => "Bloom",
            BrewStep::FirstPour => "First Pour",
            BrewStep::SecondPour => "Second Pour",
            BrewStep::Drawdown => "Drawdown",
        }
    }

    /// Instructions for this step with the recipe's grams filled in.
    pub fn detail(&self, recipe: &Recipe) -> String {
        match self {
            BrewStep::Bloom => format!(
                "Pour {}g of water to wet all the grounds, swirl, wait 45s",
                recipe.bloom
            ),
            BrewStep::FirstPour => format!("Pour steadily up to {}g total", recipe.pour1),
            BrewStep::SecondPour => format!("Pour gently up to {}g total", recipe.pour2),
            BrewStep::Drawdown => "Let it drain through, aim to finish around 3:30".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrewSession {
    recipe: Option<Recipe>,
    states: [StepState; 4],
    complete: bool,
}

impl Default for BrewSession {
    fn default() -> Self {
        Self {
            recipe: None,
            states: [StepState::Locked; 4],
            complete: false,
        }
    }
}

impl BrewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose a recipe; replaces any previous selection and restarts.
    pub fn select(&mut self, recipe: Recipe) {
        self.recipe = Some(recipe);
        self.reset();
    }

    /// Advance step `index`. Returns `false` when the click changed nothing.
    pub fn click(&mut self, index: usize) -> bool {
        let Some(state) = self.states.get(index).copied() else {
            return false;
        };

        match state {
            StepState::Locked | StepState::Completed => false,
            StepState::Available => {
                self.states[index] = StepState::Running;
                true
            }
            StepState::Running => {
                self.states[index] = StepState::Completed;
                match self.states.get_mut(index + 1) {
                    Some(next) => *next = StepState::Available,
                    None => self.complete = true,
                }
                true
            }
        }
    }

    /// Back to the freshly-selected layout, keeping the selection.
    pub fn reset(&mut self) {
        self.states = [StepState::Locked; 4];
        if self.recipe.is_some() {
            self.states[0] = StepState::Available;
        }
        self.complete = false;
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn state(&self, index: usize) -> Option<StepState> {
        self.states.get(index).copied()
    }

    pub fn states(&self) -> &[StepState; 4] {
        &self.states
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The step panel replaces the "pick a recipe" placeholder once a
    /// recipe is selected.
    pub fn panel_visible(&self) -> bool {
        self.recipe.is_some()
    }

    pub fn running_step(&self) -> Option<usize> {
        self.states.iter().position(|s| *s == StepState::Running)
    }

    pub fn detail(&self, index: usize) -> Option<String> {
        let recipe = self.recipe.as_ref()?;
        BrewStep::ALL.get(index).map(|step| step.detail(recipe))
    }

    pub fn label(&self) -> Option<String> {
        self.recipe.as_ref().map(Recipe::label)
    }
}
