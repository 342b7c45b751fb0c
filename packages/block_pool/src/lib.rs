//! Fixed-size object pools that hand out raw pointers to objects stored in pre-allocated blocks.
//!
//! This crate provides two pools for objects of a single type `T`:
//!
//! - [`FixedPool`] owns exactly one block with a capacity chosen at creation time. Allocation
//!   fails once every slot is occupied.
//! - [`DynamicPool`] starts with one block and adds another of the same size whenever all
//!   existing blocks are full. Blocks are kept until the pool is dropped.
//!
//! Allocating and releasing an object in a block takes constant time. Each block is a single
//! allocation from the host allocator that holds a compact array of slot indices followed by the
//! object storage, aligned to at least a cache line. The vacant slots of a block form a linked
//! list threaded through the index array, so the most recently released slot is the first to be
//! reused.
//!
//! # Key Features
//!
//! - **Stable addresses**: Objects never move once allocated
//! - **Pointer-based access**: Pools hand out [`NonNull<T>`][std::ptr::NonNull] and never keep
//!   references to the objects, leaving aliasing decisions to the caller
//! - **In-place initialization**: Objects can be constructed directly in their slot via
//!   `allocate_with()`
//! - **Enumeration**: `for_each()` visits every live object in slot order
//! - **Drop policies**: Configure whether dropping a pool with live objects is a bug
//! - **Thread mobility**: Pools can move between threads but cannot be shared without
//!   synchronization
//!
//! # Example
//!
//! ```rust
//! use block_pool::FixedPool;
//!
//! let mut pool = FixedPool::<String>::new(2);
//!
//! let hello = pool.allocate("Hello".to_string()).unwrap();
//! let world = pool.allocate("World".to_string()).unwrap();
//!
//! // The pool is full.
//! assert!(pool.allocate("!".to_string()).is_none());
//!
//! // SAFETY: The pointers came from this pool and nothing else refers to the objects.
//! unsafe {
//!     assert_eq!(hello.as_ref(), "Hello");
//!     assert_eq!(world.as_ref(), "World");
//!
//!     pool.release(hello.as_ptr());
//!     pool.release(world.as_ptr());
//! }
//! ```
//!
//! # Diagnostics
//!
//! Pools emit [`tracing`](https://docs.rs/tracing) events when blocks are created (`debug`), when
//! the host allocator fails to provide memory (`warn`) and when a [`DynamicPool`] is asked to
//! release a pointer it does not own (`trace`).

mod aligned;
mod block;
mod block_layout;
mod builder;
mod drop_policy;
mod dynamic_pool;
mod error;
mod fixed_pool;
mod stats;

pub(crate) use block::Block;
pub use builder::*;
pub use drop_policy::*;
pub use dynamic_pool::DynamicPool;
pub use error::Error;
pub(crate) use error::Result;
pub use fixed_pool::FixedPool;
pub use stats::PoolStats;
