//! Build-time configuration.
//!
//! Constants are generated by `build.rs` from the `flags.json` file at the workspace root.
//! The `default` section applies to every target; a section named after the target
//! architecture overrides individual flags.

#![no_std]
#![deny(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/build_flags.rs"));
