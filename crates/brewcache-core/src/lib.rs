//! Core library for brewcache.
//!
//! - `recipe`: V60 recipe math, ratio snapping and the recipe table
//! - `steps`: the four-step brew state machine
//! - `cache`: the offline cache manager (versioned generations, install /
//!   activate lifecycle, eviction, request routing, client focus routing)
//! - `net`: the network capability the cache manager fetches through
//! - `config`: persisted application configuration
//! - `github`: star count lookup for the project repository

pub mod cache;
pub mod config;
pub mod github;
pub mod net;
pub mod recipe;
pub mod steps;

pub use cache::{
    CacheStorage, ControlMessage, FileStorage, LifecycleState, MemoryStorage, Registration,
};
pub use config::{CacheConfig, Config};
pub use net::{Fetch, FetchError, HttpFetcher, Request, Response};
pub use recipe::{compute_recipe, recipe_table, RatioControl, Recipe, RecipeRow, RecipeSettings};
pub use steps::{BrewSession, BrewStep, StepState};
