//! Transition engine
//!
//! Holds the transition regions, kept sorted by start sample, and answers
//! automation queries by position. Edits and queries share one mutex; a
//! query holds it only for the lookup.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::automation::{calculate_automation, TransitionAutomation};
use super::region::{EqSwapConfig, TransitionRegion, TransitionType};
use crate::dsp::CurveType;
use crate::error::{DeckflowError, Result};

#[derive(Debug, Default)]
pub struct TransitionEngine {
    regions: Mutex<Vec<TransitionRegion>>,
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn regions(&self) -> MutexGuard<'_, Vec<TransitionRegion>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a region, keeping the set sorted by start sample
    ///
    /// # Errors
    /// `TransitionOverlap` if the region overlaps an existing one that
    /// involves either of its tracks. Overlaps between unrelated track
    /// pairs are allowed.
    pub fn add_transition(&self, region: TransitionRegion) -> Result<()> {
        let mut regions = self.regions();
        if regions
            .iter()
            .any(|existing| existing.overlaps(&region) && existing.shares_track(&region))
        {
            return Err(DeckflowError::TransitionOverlap {
                outgoing: region.outgoing_track_id().to_string(),
                incoming: region.incoming_track_id().to_string(),
            });
        }

        log::info!(
            "Added {} transition {} -> {} [{}, {})",
            region.kind(),
            region.outgoing_track_id(),
            region.incoming_track_id(),
            region.start_sample(),
            region.end_sample()
        );
        let index = regions.partition_point(|r| r.start_sample() <= region.start_sample());
        regions.insert(index, region);
        Ok(())
    }

    /// Remove every region for the given track pair; returns how many were removed
    pub fn remove_transition(&self, outgoing_track_id: &str, incoming_track_id: &str) -> usize {
        let mut regions = self.regions();
        let before = regions.len();
        regions.retain(|r| {
            !(r.outgoing_track_id() == outgoing_track_id
                && r.incoming_track_id() == incoming_track_id)
        });
        before - regions.len()
    }

    /// First region (by start) whose `[start, end)` contains `position`
    pub fn get_active_transition(&self, position: u64) -> Option<TransitionRegion> {
        self.regions().iter().find(|r| r.contains(position)).cloned()
    }

    pub fn calculate_automation(
        &self,
        region: &TransitionRegion,
        position: u64,
    ) -> TransitionAutomation {
        calculate_automation(region, position)
    }

    /// Automation for one track at `position`
    ///
    /// Uses the first region covering `position` that involves `track_id`
    /// and zeroes the other side. Neutral when no such region exists.
    pub fn get_automation_for_track(&self, track_id: &str, position: u64) -> TransitionAutomation {
        let regions = self.regions();
        let Some(region) = regions
            .iter()
            .find(|r| r.contains(position) && r.involves(track_id))
        else {
            return TransitionAutomation::neutral();
        };

        let automation = calculate_automation(region, position);
        if region.outgoing_track_id() == track_id {
            automation.outgoing_only()
        } else {
            automation.incoming_only()
        }
    }

    /// Register an S-curve EQ swap between two tracks
    ///
    /// Swaps the low band only, or low and mid when `swap_bass_only` is false.
    pub fn create_eq_swap_transition(
        &self,
        outgoing_track_id: &str,
        incoming_track_id: &str,
        start_sample: u64,
        end_sample: u64,
        swap_bass_only: bool,
    ) -> Result<TransitionRegion> {
        let eq = if swap_bass_only {
            EqSwapConfig::bass_only()
        } else {
            EqSwapConfig::low_and_mid()
        };
        let region = TransitionRegion::new(
            outgoing_track_id,
            incoming_track_id,
            start_sample,
            end_sample,
            TransitionType::EqSwap,
            CurveType::SCurve,
        )?
        .with_eq(eq);

        self.add_transition(region.clone())?;
        Ok(region)
    }

    /// Snapshot of all regions in start order
    pub fn transitions(&self) -> Vec<TransitionRegion> {
        self.regions().clone()
    }

    pub fn len(&self) -> usize {
        self.regions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions().is_empty()
    }

    pub fn clear(&self) {
        self.regions().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn crossfade(out: &str, inc: &str, start: u64, end: u64) -> TransitionRegion {
        TransitionRegion::new(out, inc, start, end, TransitionType::Crossfade, CurveType::Linear)
            .unwrap()
    }

    #[test]
    fn test_regions_stay_sorted() {
        let engine = TransitionEngine::new();
        engine.add_transition(crossfade("c", "d", 5000, 6000)).unwrap();
        engine.add_transition(crossfade("a", "b", 1000, 2000)).unwrap();
        engine.add_transition(crossfade("e", "f", 3000, 4000)).unwrap();

        let starts: Vec<u64> = engine.transitions().iter().map(|r| r.start_sample()).collect();
        assert_eq!(starts, vec![1000, 3000, 5000]);
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn test_active_lookup() {
        let engine = TransitionEngine::new();
        engine.add_transition(crossfade("a", "b", 1000, 2000)).unwrap();

        assert!(engine.get_active_transition(999).is_none());
        assert_eq!(
            engine.get_active_transition(1000).unwrap().incoming_track_id(),
            "b"
        );
        assert!(engine.get_active_transition(2000).is_none());
    }

    #[test]
    fn test_overlap_on_shared_track_rejected() {
        let engine = TransitionEngine::new();
        engine.add_transition(crossfade("a", "b", 1000, 2000)).unwrap();

        let err = engine
            .add_transition(crossfade("b", "c", 1500, 2500))
            .unwrap_err();
        assert_eq!(err.error_code(), "TRANSITION_OVERLAP");

        // Unrelated pair may overlap; touching intervals never overlap
        engine.add_transition(crossfade("x", "y", 1500, 2500)).unwrap();
        engine.add_transition(crossfade("b", "c", 2000, 3000)).unwrap();
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn test_remove_by_pair() {
        let engine = TransitionEngine::new();
        engine.add_transition(crossfade("a", "b", 0, 100)).unwrap();
        engine.add_transition(crossfade("b", "c", 200, 300)).unwrap();

        assert_eq!(engine.remove_transition("a", "b"), 1);
        assert_eq!(engine.remove_transition("a", "b"), 0);
        assert_eq!(engine.len(), 1);

        engine.clear();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_track_projection() {
        let engine = TransitionEngine::new();
        engine.add_transition(crossfade("a", "b", 1000, 2000)).unwrap();

        let outgoing = engine.get_automation_for_track("a", 1250);
        assert_abs_diff_eq!(outgoing.outgoing_gain, 0.75);
        assert_eq!(outgoing.incoming_gain, 0.0);

        let incoming = engine.get_automation_for_track("b", 1250);
        assert_abs_diff_eq!(incoming.incoming_gain, 0.25);
        assert_eq!(incoming.outgoing_gain, 0.0);

        assert_eq!(
            engine.get_automation_for_track("z", 1250),
            TransitionAutomation::neutral()
        );
        assert_eq!(
            engine.get_automation_for_track("a", 5000),
            TransitionAutomation::neutral()
        );
    }

    #[test]
    fn test_eq_swap_query_halfway() {
        let engine = TransitionEngine::new();
        engine
            .create_eq_swap_transition("outgoing", "incoming", 441_000, 529_200, true)
            .unwrap();

        let auto = engine.get_automation_for_track("outgoing", 485_100);
        assert_abs_diff_eq!(auto.outgoing_low_gain, 0.5, epsilon = 1e-6);
        assert_eq!(auto.outgoing_mid_gain, 1.0);
        assert_eq!(auto.outgoing_high_gain, 1.0);
        assert_eq!(auto.outgoing_gain, 1.0);
    }

    #[test]
    fn test_eq_swap_low_and_mid() {
        let engine = TransitionEngine::new();
        let region = engine
            .create_eq_swap_transition("a", "b", 0, 1000, false)
            .unwrap();
        assert!(region.eq().swap_low && region.eq().swap_mid && !region.eq().swap_high);
        assert_eq!(region.curve(), CurveType::SCurve);
    }

    #[test]
    fn test_invalid_bounds_never_registered() {
        let engine = TransitionEngine::new();
        assert!(engine.create_eq_swap_transition("a", "b", 500, 500, true).is_err());
        assert!(engine.is_empty());
    }
}
