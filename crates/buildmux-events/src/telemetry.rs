//! The telemetry opt-out/sampling gate.
//!
//! Replaces the "singleton with a global mutable instance" pattern with a
//! process-wide service acquired once at startup and passed by reference.
//! `initialize` is idempotent: once the state leaves `Uninitialized` it never
//! changes again for the life of the process.

use std::sync::Mutex;

/// Lifecycle of the telemetry subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryState {
    /// `initialize` has not yet run.
    Uninitialized,
    /// `TELEMETRY_OPTOUT` or `PLATFORM_TELEMETRY_OPTOUT` was truthy.
    OptOut,
    /// Opted in, but this process lost the sampling draw.
    Unsampled,
    /// A local tracer was created for this process.
    TracerInitialized,
    /// A tracer *and* a collector connection were established.
    CollectorInitialized,
}

/// Process-wide telemetry gate.
///
/// Acquire one instance at startup (`TelemetryService::new()`) and share it
/// by reference; do not reach for a global static from call sites.
#[derive(Debug, Default)]
pub struct TelemetryService {
    state: Mutex<TelemetryState>,
}

impl TelemetryState {
    fn is_initialized(self) -> bool {
        !matches!(self, TelemetryState::Uninitialized)
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}

fn sample_rate() -> f64 {
    std::env::var("TELEMETRY_SAMPLE_RATE")
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|r| r.clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

impl TelemetryService {
    /// Create a fresh, uninitialized telemetry service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state without attempting initialization.
    pub fn state(&self) -> TelemetryState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the telemetry gate. Idempotent: the first call to reach a
    /// non-`Uninitialized` state wins, later calls just return that state.
    ///
    /// `collector_available` models whether a collector endpoint could be
    /// reached; when the tracer is created but no collector is available,
    /// the state settles at `TracerInitialized` rather than
    /// `CollectorInitialized`.
    pub fn initialize(&self, collector_available: bool) -> TelemetryState {
        self.initialize_with_draw(rand::random::<f64>(), collector_available)
    }

    /// Same as [`Self::initialize`] but with an injectable sampling draw, for
    /// deterministic tests.
    pub fn initialize_with_draw(&self, draw: f64, collector_available: bool) -> TelemetryState {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_initialized() {
            return *guard;
        }

        let next = if env_truthy("TELEMETRY_OPTOUT") || env_truthy("PLATFORM_TELEMETRY_OPTOUT") {
            TelemetryState::OptOut
        } else if draw < sample_rate() {
            if collector_available {
                TelemetryState::CollectorInitialized
            } else {
                TelemetryState::TracerInitialized
            }
        } else {
            TelemetryState::Unsampled
        };

        *guard = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_out_wins_regardless_of_sample_rate() {
        temp_env::with_var("TELEMETRY_OPTOUT", Some("1"), || {
            let service = TelemetryService::new();
            assert_eq!(service.initialize_with_draw(0.0, true), TelemetryState::OptOut);
        });
    }

    #[test]
    fn platform_opt_out_is_also_honored() {
        temp_env::with_var("PLATFORM_TELEMETRY_OPTOUT", Some("true"), || {
            temp_env::with_var("TELEMETRY_OPTOUT", None::<&str>, || {
                let service = TelemetryService::new();
                assert_eq!(
                    service.initialize_with_draw(0.0, true),
                    TelemetryState::OptOut
                );
            });
        });
    }

    #[test]
    fn sampling_draw_below_rate_initializes() {
        temp_env::with_var("TELEMETRY_OPTOUT", None::<&str>, || {
            temp_env::with_var("PLATFORM_TELEMETRY_OPTOUT", None::<&str>, || {
                temp_env::with_var("TELEMETRY_SAMPLE_RATE", Some("0.5"), || {
                    let service = TelemetryService::new();
                    assert_eq!(
                        service.initialize_with_draw(0.1, false),
                        TelemetryState::TracerInitialized
                    );
                });
            });
        });
    }

    #[test]
    fn sampling_draw_above_rate_is_unsampled() {
        temp_env::with_var("TELEMETRY_OPTOUT", None::<&str>, || {
            temp_env::with_var("PLATFORM_TELEMETRY_OPTOUT", None::<&str>, || {
                temp_env::with_var("TELEMETRY_SAMPLE_RATE", Some("0.1"), || {
                    let service = TelemetryService::new();
                    assert_eq!(
                        service.initialize_with_draw(0.9, true),
                        TelemetryState::Unsampled
                    );
                });
            });
        });
    }

    #[test]
    fn initialize_is_idempotent() {
        temp_env::with_var("TELEMETRY_OPTOUT", Some("1"), || {
            let service = TelemetryService::new();
            assert_eq!(service.initialize_with_draw(0.0, true), TelemetryState::OptOut);
            // Second call, even with inputs that would otherwise opt in, is ignored.
            temp_env::with_var("TELEMETRY_OPTOUT", None::<&str>, || {
                assert_eq!(
                    service.initialize_with_draw(0.0, true),
                    TelemetryState::OptOut
                );
            });
        });
    }
}
