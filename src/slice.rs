//! Borrowed PCM ranges handed from the control thread to the audio thread.

/// Immutable PCM range with a root pitch, as described in spec.md §6.
///
/// The sample buffer is borrowed from the host for as long as the `Slice`
/// is reachable from either half of an instrument; this crate never copies
/// or owns the backing samples.
#[derive(Debug, Clone)]
pub struct Slice {
    pub samples: std::sync::Arc<[f32]>,
    pub sample_rate: i32,
    pub root_pitch: f64,
}

impl Slice {
    pub fn new(samples: std::sync::Arc<[f32]>, sample_rate: i32, root_pitch: f64) -> Self {
        Self {
            samples,
            sample_rate,
            root_pitch,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Selects the slice whose `root_pitch` is closest and `<=` the target
/// pitch, falling back to the highest-rooted slice if none qualify
/// (spec.md §6, "Slice wire format").
pub fn select_for_pitch(slices: &[Slice], pitch: f64) -> Option<&Slice> {
    slices
        .iter()
        .filter(|slice| slice.root_pitch <= pitch)
        .max_by(|a, b| a.root_pitch.total_cmp(&b.root_pitch))
        .or_else(|| {
            slices
                .iter()
                .max_by(|a, b| a.root_pitch.total_cmp(&b.root_pitch))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn slice(root_pitch: f64) -> Slice {
        Slice::new(Arc::from(vec![0.0f32; 4]), 48_000, root_pitch)
    }

    #[test]
    fn picks_closest_at_or_below_target() {
        let slices = vec![slice(0.0), slice(1.0), slice(2.0)];
        let picked = select_for_pitch(&slices, 1.5).unwrap();
        assert_eq!(picked.root_pitch, 1.0);
    }

    #[test]
    fn falls_back_to_highest_when_all_above_target() {
        let slices = vec![slice(2.0), slice(3.0)];
        let picked = select_for_pitch(&slices, 0.0).unwrap();
        assert_eq!(picked.root_pitch, 3.0);
    }

    #[test]
    fn empty_table_selects_nothing() {
        let slices: Vec<Slice> = Vec::new();
        assert!(select_for_pitch(&slices, 0.0).is_none());
    }
}
