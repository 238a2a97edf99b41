//! idb core library: descriptor types, JSON/human codec, activity tree rendering.
//!
//! - [`types`] — companion, target, installed app/test and test-run records
//! - [`format`] — pure encode/decode functions for those records
//! - [`activity`] — activity trace tree rendering
//! - [`error`] — [`FormatError`]

pub mod activity;
pub mod error;
pub mod format;
pub mod types;

pub use error::FormatError;
pub use types::{
    Address, AppProcessState, CompanionInfo, InstalledAppInfo, InstalledTestInfo,
    ScreenDimensions, TargetDescription, TestActivity, TestAttachment, TestRunFailureInfo,
    TestRunInfo,
};
