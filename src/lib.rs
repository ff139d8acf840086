// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Multi-pass GPU post-processing effects built on wgpu.
//!
//! motionfx packages screen-space effects as self-contained modules with an
//! explicit `load` / `unload` / `reload` lifecycle and a `render` call that
//! issues a fixed sequence of fullscreen passes. The first (and reference)
//! effect is a three-pass ping-pong motion blur driven by a per-pixel
//! velocity buffer.
//!
//! # Key entry points
//!
//! - [`postprocess::MotionBlur`] - the motion blur effect
//! - [`postprocess::RenderEffect`] - lifecycle shared by every effect
//! - [`gpu::GpuBackend`] - the explicit GPU context every operation receives
//! - [`gpu::wgpu_backend::WgpuBackend`] - the wgpu implementation
//! - [`gpu::recording::RecordingBackend`] - a command-recording backend for
//!   tests and tooling
//! - [`options::Options`] - TOML-backed runtime configuration
//!
//! # Architecture
//!
//! Effects never touch global GPU state. Every operation takes a
//! `&mut impl GpuBackend`, which tracks the active program, frame target,
//! draw buffers, viewport and texture units the way an immediate-mode
//! graphics API would. The wgpu backend turns each fullscreen draw into a
//! render pass with a lazily cached pipeline; the recording backend keeps a
//! command log so the pass protocol can be verified without a GPU.

pub mod error;
pub mod gpu;
pub mod options;
pub mod postprocess;
pub mod util;

pub use error::EffectError;
