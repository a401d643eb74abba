//! hatvec - Preloading Hashed Array Trees
//!
//! Stack-like indexed containers where *every* primitive operation - append,
//! pop, index-read, index-write, length - runs in non-amortized worst-case
//! constant time, with only two levels of indirection between an index and
//! the stored element.
//!
//! Elements live in heap-allocated *sub-blocks*; a directory of sub-block
//! pointers maps indices to slots. Instead of the doubling `Vec` spike
//! (copy everything on overflow), the directory itself is kept in three
//! copies of staggered capacity and a bounded *preloading* step mirrors at
//! most two directory entries per mutation, so directory growth and shrink
//! never copy more than a constant number of pointers.
//!
//! # Key Features
//!
//! - No reallocation spikes: at most 2 allocations, 2 frees, and 2 pointer
//!   copies per operation
//! - Two variants sharing one rotor: [`HatD`] (sub-block `i` holds `2^i`
//!   slots) and [`HatC<T, S>`](HatC) (every sub-block holds `2^S` slots,
//!   `S` fixed at compile time)
//! - Geometric block growth in [`HatD`] for cache locality
//! - Block-cursor iteration: one directory lookup per sub-block, not per
//!   element
//!
//! # Example
//!
//! ```
//! use hatvec::HatD;
//!
//! let mut hat = HatD::new();
//! for i in 0..100u32 {
//!     hat.append(i)?;
//! }
//! assert_eq!(hat.len(), 100);
//! assert_eq!(*hat.get(42)?, 42);
//!
//! hat.set(0, 7)?;
//! assert_eq!(hat.pop()?, 99);
//! assert_eq!(hat.iter().sum::<u32>(), (1..99).sum::<u32>() + 7);
//! # Ok::<(), hatvec::HatError>(())
//! ```
//!
//! # Feature Flags
//!
//! - `unchecked`: elide the bounds tests in `get`/`get_mut`/`set`/`pop`.
//!   Out-of-range access becomes undefined behavior. This is a compile-time
//!   switch for builds that have validated every index elsewhere; there is
//!   no per-call bypass.

mod alloc;
mod error;
mod hat;
mod invariants;
mod iter;
mod rotor;
mod schedule;

pub use error::HatError;
pub use hat::{Hat, HatC, HatD};
pub use iter::Iter;
pub use schedule::{Doubling, Fixed, Schedule};
