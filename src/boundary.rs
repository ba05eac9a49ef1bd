//! Boundary policy for finite-difference operators
//!
//! The forward difference `q(i+1) - q(i)` needs a neighbour value past the
//! last grid cell. Historically each array backend picked its own answer
//! (wraparound for dense arrays, zero padding for chunked arrays, NaN fill
//! for labelled arrays). Here the policy is an explicit parameter that every
//! backend honours; the per-backend `Default` configurations keep the
//! historical behaviour for callers that do not care.

/// How to fill the neighbour value past the edge of the domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Wrap around to the opposite edge of the domain
    Periodic,

    /// Treat cells outside the domain as zero
    ZeroPad,

    /// Treat cells outside the domain as missing (NaN)
    EdgeFill,
}

impl BoundaryPolicy {
    /// The value assumed for cells outside the domain
    ///
    /// Only meaningful for the non-periodic policies; `Periodic` never
    /// reads outside the domain.
    pub fn fill_value(self) -> f64 {
        match self {
            BoundaryPolicy::Periodic | BoundaryPolicy::ZeroPad => 0.0,
            BoundaryPolicy::EdgeFill => f64::NAN,
        }
    }

    /// Human-readable policy name
    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryPolicy::Periodic => "periodic",
            BoundaryPolicy::ZeroPad => "zero-pad",
            BoundaryPolicy::EdgeFill => "edge-fill",
        }
    }
}

impl std::fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
