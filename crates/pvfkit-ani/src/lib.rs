//! Animation (`.ani`) entries of PVF archives.
//!
//! An animation is a list of frames, each with an image reference, a
//! position, optional hit boxes and a list of tagged items, preceded by
//! items that apply to the whole animation. The binary form is converted to
//! and from a bracketed text form:
//!
//! ```text
//! #PVF_File
//!
//! [LOOP]
//!     1
//!
//! [FRAME MAX]
//!     1
//!
//! [FRAME000]
//!     [IMAGE]
//!         `character/swordman/attack.img`
//!         0
//!     [IMAGE POS]
//!         -100    -200
//!     [DELAY]
//!         80
//! ```
//!
//! Conversions return [`Warning`]s for inconsistencies that do not prevent
//! a result, such as a `[FRAME MAX]` that disagrees with the frames present.

mod error;

pub mod compiler;
pub mod decompiler;
pub mod model;
pub mod tag;

pub use compiler::{compile, Compiled};
pub use decompiler::{decompile, Decompiled};
pub use error::{Error, Result};
pub use model::{Animation, BoxItem, EffectExtra, Frame, Item, Value, Warning};

/// File extension of animation entries.
pub const EXTENSION: &str = ".ani";

/// Check if an entry key names an animation.
pub fn is_animation_key(key: &str) -> bool {
    key.ends_with(EXTENSION)
}

/// Check if bytes look like animation text rather than binary.
pub fn is_text(data: &[u8]) -> bool {
    data.trim_ascii_start()
        .starts_with(pvfkit_common::TEXT_HEADER.as_bytes())
}
