// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model construction and input-budget truncation.
//!
//! Every model the agent talks to is built by a [`ModelFactory`] and wrapped
//! in a [`TruncationWrapper`], so callers never have to size requests.

pub mod factory;
pub mod truncation;

pub use factory::{DefaultModelFactory, ModelFactory};
pub use truncation::{FUNCTIONS_TOKEN_BUDGET, MIN_TOKENS, TruncationWrapper, input_budget};
