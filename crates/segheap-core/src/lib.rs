//! Core types and traits for the segheap allocator workspace.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the abstractions shared by the arena and the allocator: the
//! [`HeapPtr`] payload handle, the block layout constants, the
//! [`Arena`] growth trait, and the error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod layout;
pub mod traits;

pub use error::{AllocError, ArenaError};
pub use id::HeapPtr;
pub use traits::Arena;
