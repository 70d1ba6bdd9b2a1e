//! Cross-cutting helpers.

pub mod parallel;
