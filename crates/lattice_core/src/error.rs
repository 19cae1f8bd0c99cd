//! # Storage Error Types
//!
//! All errors that can occur in the storage core. Every variant describes a
//! caller mistake or an exhausted construction-time budget; nothing here is
//! meant to be retried.

use thiserror::Error;

/// Errors raised by [`Arena`](crate::memory::Arena).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// The initial commit was larger than the reservation.
    #[error("initial commit of {commit} bytes exceeds reservation of {reserve} bytes")]
    CommitExceedsReservation {
        /// Requested reservation.
        reserve: usize,
        /// Requested initial commit.
        commit: usize,
    },

    /// The allocator could not reserve the requested range.
    #[error("failed to reserve {reserve} bytes")]
    ReservationFailed {
        /// Requested reservation.
        reserve: usize,
    },

    /// An allocation would run past the reserved range.
    #[error(
        "allocation of {requested} bytes at offset {cursor} exceeds reservation of {reserved} bytes"
    )]
    ReservationExceeded {
        /// Bytes requested by the failing call.
        requested: usize,
        /// Cursor at the time of the call.
        cursor: usize,
        /// Reserved size of the arena.
        reserved: usize,
    },
}

/// Errors raised by [`HandlePool`](crate::memory::HandlePool).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Every slot is in use.
    #[error("handle pool exhausted: capacity {capacity}")]
    Exhausted {
        /// Fixed capacity of the pool.
        capacity: usize,
    },

    /// The sentinel handle was used.
    #[error("null handle")]
    NullHandle,

    /// The handle index does not name a slot of this pool.
    #[error("handle index {index} out of range for pool of {capacity}")]
    OutOfRange {
        /// Index carried by the handle.
        index: u16,
        /// Fixed capacity of the pool.
        capacity: usize,
    },

    /// The slot was released (and possibly reused) since the handle was issued.
    #[error("stale handle: slot {index} is at generation {live}, handle carries {stale}")]
    StaleHandle {
        /// Slot index.
        index: u16,
        /// Generation carried by the handle.
        stale: u16,
        /// Live generation of the slot.
        live: u16,
    },

    /// The slot is on the free list.
    #[error("slot {0} is not occupied")]
    Vacant(u16),
}

/// Errors raised by the entity/component store and the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// All 64 component kinds are already registered.
    #[error("component limit reached: cannot register {name}")]
    TooManyComponents {
        /// Name that failed to register.
        name: String,
    },

    /// A component index was never handed out by the registry.
    #[error("component {0} is not registered")]
    UnknownComponent(u32),

    /// The same component appeared twice in one entity description.
    #[error("component {0} listed more than once")]
    DuplicateComponent(u32),

    /// Component and payload lists have different lengths.
    #[error("{components} components but {datas} payloads")]
    DataCountMismatch {
        /// Number of components passed.
        components: usize,
        /// Number of payloads passed.
        datas: usize,
    },

    /// A payload's byte length does not match the registered size.
    #[error("component {component} expects {expected} bytes, got {actual}")]
    PayloadSize {
        /// Component index.
        component: u32,
        /// Registered size.
        expected: usize,
        /// Length of the supplied payload.
        actual: usize,
    },

    /// The entity's archetype has no column for the component.
    #[error("entity has no component {0}")]
    MissingComponent(u32),

    /// A system asked for more components than an update array can carry.
    #[error("system requires {count} components, limit is {limit}")]
    TooManySystemComponents {
        /// Components requested.
        count: usize,
        /// Upper bound.
        limit: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entity handle failure.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Arena failure.
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;
