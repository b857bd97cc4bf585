//! Sample-accurate parameter automation
//!
//! `AudioParam` follows the Web Audio automation model: an intrinsic value plus
//! a timeline of events expressed in graph time (seconds since the graph
//! started rendering). Reading the parameter at a time evaluates the last
//! event that started at or before it.

/// Highest gain any gain stage will produce (500 %)
pub const MAX_GAIN: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
enum Automation {
    /// Jump to `value` at `time`
    Set { time: f64, value: f32 },
    /// Piecewise-linear curve through `values`, spread evenly over `duration`
    Curve {
        start: f64,
        duration: f64,
        values: Vec<f32>,
    },
}

impl Automation {
    fn start(&self) -> f64 {
        match self {
            Self::Set { time, .. } => *time,
            Self::Curve { start, .. } => *start,
        }
    }

    fn end(&self) -> f64 {
        match self {
            Self::Set { time, .. } => *time,
            Self::Curve {
                start, duration, ..
            } => start + duration,
        }
    }

    fn value_at(&self, time: f64) -> f32 {
        match self {
            Self::Set { value, .. } => *value,
            Self::Curve {
                start,
                duration,
                values,
            } => {
                let last = values.len() - 1;
                if time >= start + duration {
                    return values[last];
                }
                let k = (time - start) / duration * last as f64;
                let i = (k.floor() as usize).min(last);
                if i == last {
                    return values[last];
                }
                let t = (k - i as f64) as f32;
                values[i] + (values[i + 1] - values[i]) * t
            }
        }
    }
}

/// An automatable, range-clamped parameter
#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    value: f32,
    min: f32,
    max: f32,
    events: Vec<Automation>,
}

impl AudioParam {
    /// Create a parameter with an intrinsic value and a range
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            events: Vec::new(),
        }
    }

    /// A gain parameter in `[0, MAX_GAIN]`
    pub fn gain(value: f32) -> Self {
        Self::new(value, 0.0, MAX_GAIN)
    }

    fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Replace the intrinsic value and drop all automation
    pub fn set_value(&mut self, value: f32) {
        self.value = self.clamp(value);
        self.events.clear();
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        let value = self.clamp(value);
        self.insert(Automation::Set { time, value });
    }

    /// Ramp through `values` starting at `start` and lasting `duration` seconds
    ///
    /// A curve with fewer than two points or no length degrades to a jump to
    /// its final value.
    pub fn set_value_curve_at_time(&mut self, values: &[f32], start: f64, duration: f64) {
        let Some(&last) = values.last() else {
            return;
        };
        if values.len() < 2 || duration <= 0.0 {
            self.set_value_at_time(last, start);
            return;
        }
        let values = values.iter().map(|&v| self.clamp(v)).collect();
        self.insert(Automation::Curve {
            start,
            duration,
            values,
        });
    }

    /// Drop automation from `time` on and hold the value the parameter had there
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.end() <= time);
        self.events.push(Automation::Set { time, value: held });
    }

    /// Evaluate the parameter at `time`
    pub fn value_at(&self, time: f64) -> f32 {
        self.events
            .iter()
            .rev()
            .find(|e| e.start() <= time)
            .map_or(self.value, |e| e.value_at(time))
    }

    /// Whether automation is still changing the value after `time`
    pub fn is_automating(&self, time: f64) -> bool {
        self.events.iter().any(|e| e.end() > time)
    }

    /// Fold fully elapsed events into the intrinsic value
    pub fn prune(&mut self, time: f64) {
        let elapsed = self.events.iter().take_while(|e| e.end() <= time).count();
        // The last elapsed event still defines the value until a later one starts
        if elapsed > 0 {
            self.value = self.events[elapsed - 1].value_at(time);
            self.events.drain(..elapsed);
        }
    }

    /// Fill `out` with values for consecutive frames starting at `start`
    pub fn fill(&self, start: f64, frame_duration: f64, out: &mut [f32]) {
        if self.events.is_empty() {
            out.fill(self.value);
            return;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.value_at(start + i as f64 * frame_duration);
        }
    }

    // Events stay ordered by start time; a new event replaces anything it overlaps
    fn insert(&mut self, event: Automation) {
        let start = event.start();
        self.events.retain(|e| e.start() < start && e.end() <= start);
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_value_applies_without_events() {
        let param = AudioParam::gain(0.7);
        assert_eq!(param.value_at(0.0), 0.7);
        assert_eq!(param.value_at(100.0), 0.7);
    }

    #[test]
    fn curve_interpolates_between_points() {
        let mut param = AudioParam::gain(0.0);
        param.set_value_curve_at_time(&[0.0, 1.0], 1.0, 2.0);

        assert_eq!(param.value_at(0.5), 0.0);
        assert!((param.value_at(2.0) - 0.5).abs() < 1e-6);
        assert_eq!(param.value_at(3.0), 1.0);
        assert_eq!(param.value_at(10.0), 1.0);
    }

    #[test]
    fn cancel_and_hold_freezes_mid_curve() {
        let mut param = AudioParam::gain(1.0);
        param.set_value_curve_at_time(&[1.0, 0.0], 0.0, 1.0);
        param.cancel_and_hold(0.25);

        assert!((param.value_at(0.25) - 0.75).abs() < 1e-6);
        assert!((param.value_at(5.0) - 0.75).abs() < 1e-6);
        assert!(!param.is_automating(0.25));
    }

    #[test]
    fn values_are_clamped_to_range() {
        let mut param = AudioParam::gain(9.0);
        assert_eq!(param.value_at(0.0), MAX_GAIN);

        param.set_value_curve_at_time(&[0.0, 12.0], 0.0, 1.0);
        assert_eq!(param.value_at(1.0), MAX_GAIN);

        param.set_value_at_time(-1.0, 2.0);
        assert_eq!(param.value_at(2.0), 0.0);
    }

    #[test]
    fn zero_length_curve_jumps() {
        let mut param = AudioParam::gain(0.0);
        param.set_value_curve_at_time(&[0.0, 0.8], 1.0, 0.0);
        assert_eq!(param.value_at(0.9), 0.0);
        assert_eq!(param.value_at(1.0), 0.8);
    }

    #[test]
    fn prune_keeps_current_value() {
        let mut param = AudioParam::gain(0.0);
        param.set_value_curve_at_time(&[0.0, 1.0], 0.0, 1.0);
        param.set_value_curve_at_time(&[1.0, 0.5], 2.0, 1.0);
        param.prune(1.5);

        assert_eq!(param.value_at(1.5), 1.0);
        assert!((param.value_at(2.5) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn fill_matches_value_at() {
        let mut param = AudioParam::gain(0.0);
        param.set_value_curve_at_time(&[0.0, 1.0], 0.0, 1.0);
        let mut out = [0.0; 4];
        param.fill(0.0, 0.25, &mut out);
        assert_eq!(out, [0.0, 0.25, 0.5, 0.75]);
    }
}
