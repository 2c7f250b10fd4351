//! Pipeline stages for turning a report into a render context.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! prepare ──▶ walk (collect) ──▶ rules ──▶ materialize ──▶ walk (substitute)
//! (derived)   (image leaves)    (bound)   (decode+size)   (ContextValue)
//! ```
//!
//! 1. [`prepare`]: copy the report and add derived fields (dates,
//!    existence flags, success rate)
//! 2. [`classify`]: decide whether a string leaf names an image, by
//!    extension only
//! 3. [`rules`]: map the key an image sits under to its maximum size
//! 4. [`materialize`]: read, decode and size one image for one document;
//!    the only stage with file I/O
//! 5. [`walk`]: rebuild the tree, substituting image leaves with the
//!    outcome of step 4

pub mod classify;
pub mod materialize;
pub mod prepare;
pub mod rules;
pub mod walk;

pub use classify::{is_image_path, is_image_path_str, IMAGE_EXTENSIONS};
pub use materialize::{fit_within, physical_size_mm, ImageMaterializer, ImageOutcome};
pub use prepare::{format_date, success_rate_pct, ContextPreparer};
pub use rules::{resolve_bound, SizeBound, SizeRule, SizeRules, FALLBACK_BOUND};
pub use walk::{collect_image_leaves, walk, DirectResolver, ImageLeaf, ImageResolver, PrefetchedImages};
