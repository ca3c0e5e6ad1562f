// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod forms;
pub mod ids;
pub mod modal;
pub mod model;
pub mod runtime;
pub mod selectors;
pub mod state;
pub mod submission;
pub mod table;

pub use forms::*;
pub use ids::*;
pub use modal::*;
pub use model::*;
pub use runtime::*;
pub use selectors::*;
pub use state::*;
pub use submission::*;
pub use table::*;
