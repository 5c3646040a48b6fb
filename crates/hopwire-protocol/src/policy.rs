//! The destination policy: run here, send on, or both.
//!
//! Both the sending side and every relaying hop ask the same two
//! questions about an envelope, and both answers depend only on the
//! roles this process plays and the envelope's destination.
//!
//! | role   | destination      | run locally | transmit |
//! |--------|------------------|-------------|----------|
//! | server | `SERVER`         | yes         | **no**   |
//! | server | `CLIENTS`        | no          | yes      |
//! | server | `ALL`            | yes         | yes      |
//! | client | `SERVER`         | no          | yes      |
//! | client | `CLIENTS`        | yes         | yes      |
//!
//! A server addressed only as `Server` is the one case with nothing left
//! to do after running locally. Everything else still has a peer that
//! needs the envelope.

use hopwire_transport::Role;

use crate::Destination;

/// Returns `true` if this process should execute the payload itself.
pub fn should_run_locally(role: Role, destination: Destination) -> bool {
    (role.server && destination.contains(Destination::SERVER))
        || (role.client && destination.contains(Destination::CLIENTS))
}

/// Returns `true` if this process should still transmit (or relay) the
/// payload after any local execution.
pub fn should_transmit(role: Role, destination: Destination) -> bool {
    !(role.server && destination == Destination::SERVER)
}
