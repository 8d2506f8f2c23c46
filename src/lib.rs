//! Tracks which Mission Control space is active on each display, watches for
//! out-of-process layout changes, and can move focus to another space.
//!
//! State flows one way: the [`sys::provider::SpaceDataProvider`] feeds the
//! pure snapshot builder in [`model::builder`], whose results the
//! [`actor::space_monitor::SpaceMonitor`] republishes to subscribers.
//! Commands flow the other way through the
//! [`actor::space_switcher::SpaceSwitcher`].

pub mod actor;
pub mod common;
pub mod model;
pub mod sys;
