//! Growable byte arena backing the segheap allocator.
//!
//! [`VecArena`] implements [`segheap_core::Arena`] over a single `Vec<u8>`.
//! It behaves like a simulated program break: the allocator asks it to
//! grow by N bytes, it appends zeroed bytes at the top and reports where
//! they start, and it refuses once a configured ceiling would be crossed.
//!
//! ```text
//! VecArena
//! ├── data: Vec<u8>        (base = 0 .. top = data.len())
//! └── ArenaConfig
//!     ├── max_bytes          (hard ceiling, default 20 MiB)
//!     └── initial_capacity   (pre-reserved backing storage)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod vec_arena;

pub use config::ArenaConfig;
pub use segheap_core::ArenaError;
pub use vec_arena::VecArena;
