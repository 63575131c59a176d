//! Unit-level wiring interface.

/// Opaque handle to a processing unit owned by a playback clock
/// (destination, gain, buffer source, effect).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    /// Wraps a raw unit index. Only the clock that issued the index can
    /// interpret it.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw unit index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for UnitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

/// Connects and disconnects units on behalf of a [`Graph`](super::Graph).
///
/// Implemented by the playback clock. Calls may come from any thread, so
/// implementations synchronise internally.
pub trait Patchbay: Send + Sync {
    /// Routes `from`'s output into `to`'s input.
    fn connect_units(&self, from: UnitId, to: UnitId);

    /// Removes the `from → to` route, if present.
    fn disconnect_units(&self, from: UnitId, to: UnitId);

    /// Hands units back once their graph is gone.
    ///
    /// The implementation frees them when it is safe to do so (a playing
    /// source keeps its group alive until it ends) and ignores units it never
    /// frees, such as its destination.
    fn release_units(&self, units: &[UnitId]);
}
