//! Host-facing capabilities: periodic polling and value publication.

/// Component health as seen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    Ok,
    /// The most recent operation did not complete cleanly, retried next cycle.
    Warning,
    /// Latched by the host, update cycles are skipped.
    Failed,
}

/// A component driven by an external scheduler.
///
/// `setup` is invoked once before the first `update`, `update` is then
/// invoked every `update_interval` milliseconds.
pub trait PollingComponent {
    fn setup(&mut self);

    fn update(&mut self);

    fn dump_config(&self);

    /// Interval between two `update` calls, in milliseconds.
    fn update_interval(&self) -> u32;
}

/// Sink for a single published numeric value.
pub trait Sensor {
    fn publish_state(&mut self, state: f32);
}

impl<F> Sensor for F
where
    F: FnMut(f32),
{
    fn publish_state(&mut self, state: f32) {
        self(state)
    }
}

/// Placeholder for an unwired value slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSensor;

impl Sensor for NullSensor {
    fn publish_state(&mut self, _state: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn closure_receives_published_state() {
        let last = Cell::new(0.0f32);
        let mut sink = |v: f32| last.set(v);
        sink.publish_state(21.5);
        assert_eq!(last.get(), 21.5);
    }

    #[test]
    fn status_defaults_to_ok() {
        assert_eq!(Status::default(), Status::Ok);
    }
}
