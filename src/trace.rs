//! Optional tracing hooks for the solvers.
//!
//! With the `tracing` feature enabled, every solver run opens an info span
//! carrying the problem dimensions, and the diffusion outer loop reports
//! its rounds as events. Without the feature both macros compile away.

/// Opens an entered info span covering one solver run on the given graph.
#[cfg(feature = "tracing")]
macro_rules! solve_span {
    ($solver:expr, $graph:expr) => {
        tracing::info_span!(
            "solve",
            solver = $solver,
            rows = $graph.rows(),
            columns = $graph.columns()
        )
        .entered()
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! solve_span {
    ($solver:expr, $graph:expr) => {
        $crate::trace::SpanGuard
    };
}

/// Reports progress of the diffusion outer loop.
#[cfg(feature = "tracing")]
macro_rules! round_event {
    ($($key:ident = $value:expr),+ $(,)?) => {
        tracing::info!($($key = $value),+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! round_event {
    ($($key:ident = $value:expr),+ $(,)?) => {
        // Values stay evaluated so call sites compile warning-free.
        let _ = ($($value,)+);
    };
}

pub(crate) use round_event;
pub(crate) use solve_span;

/// Stand-in for an entered span when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub(crate) struct SpanGuard;
