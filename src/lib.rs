//! Purpose: Host-side core of a distributed database client.
//! Exports: `api` (job completion tracking, record streams, paginated cursors, cluster seam).
//! Role: Sits above a native transport that owns connections, wire encoding, and tending.
//! Invariants: Everything public is re-exported from `api`; `core` stays internal.
//! Invariants: Core modules take the transport as an explicit input, never as hidden state.
pub mod api;
mod core;
