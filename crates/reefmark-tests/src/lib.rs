//! Integration test crate for Reefmark.
//!
//! This crate exists solely to hold cross-crate integration tests. It drives
//! a full `EditorSession` against mock collaborators.

#[cfg(test)]
mod support;

#[cfg(test)]
mod history;

#[cfg(test)]
mod prompts;

#[cfg(test)]
mod navigation;

#[cfg(test)]
mod rendering;
