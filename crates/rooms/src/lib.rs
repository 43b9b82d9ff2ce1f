//! Personal voice rooms: the allocator that spawns and reaps them, and the
//! owner console.

pub mod allocator;
pub mod console;

pub use {
    allocator::{EnterOutcome, LeaveOutcome, ReconcileReport, RoomAllocator, RoomState},
    console::{RoomConsole, RoomStatus},
};
