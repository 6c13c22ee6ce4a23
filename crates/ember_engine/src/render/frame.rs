//! Frame-in-flight bookkeeping
//!
//! The renderer keeps a fixed ring of per-frame contexts. [`FrameRing`] owns
//! the ring size, the running frame index and the per-frame state machine:
//!
//! ```text
//! Uninitialized -> Initialized -> (Recording -> Submitted -> Presented)*
//! ```
//!
//! The ring size may only change before initialization, since every slot
//! owns GPU objects sized to it.

use super::error::{RenderError, RenderResult};
use crate::config::MAX_FRAMES_IN_FLIGHT;

/// Where the current frame is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Ring not created yet
    Uninitialized,
    /// Ring created, no frame recorded yet
    Initialized,
    /// Commands are being recorded into the current slot
    Recording,
    /// Commands submitted to the graphics queue
    Submitted,
    /// Image handed to the presentation engine
    Presented,
}

/// Ring of frame slots selected by `frame_index % frames_in_flight`
#[derive(Debug, Clone)]
pub struct FrameRing {
    frames_in_flight: usize,
    frame_index: u64,
    state: FrameState,
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FrameRing {
    /// Uninitialized ring of `frames_in_flight` slots, clamped to the supported range
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT),
            frame_index: 0,
            state: FrameState::Uninitialized,
        }
    }

    /// Change the ring size; only legal before [`FrameRing::initialize`]
    pub fn set_frames_in_flight(&mut self, frames_in_flight: usize) -> RenderResult<()> {
        if self.state != FrameState::Uninitialized {
            log::error!(
                "set_frames_in_flight({}) after initialization, keeping {}",
                frames_in_flight,
                self.frames_in_flight
            );
            return Err(RenderError::InvalidState {
                reason: "frames in flight cannot change after initialization".to_string(),
            });
        }
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&frames_in_flight) {
            return Err(RenderError::InvalidState {
                reason: format!("frames in flight {frames_in_flight} not in 1..={MAX_FRAMES_IN_FLIGHT}"),
            });
        }
        self.frames_in_flight = frames_in_flight;
        Ok(())
    }

    /// Mark the ring's GPU objects as created
    pub fn initialize(&mut self) -> RenderResult<()> {
        self.expect(&[FrameState::Uninitialized], "initialize")?;
        self.state = FrameState::Initialized;
        Ok(())
    }

    /// Start recording; returns the slot to record into
    pub fn begin(&mut self) -> RenderResult<usize> {
        self.expect(&[FrameState::Initialized, FrameState::Presented], "begin")?;
        self.state = FrameState::Recording;
        Ok(self.current_slot())
    }

    /// Recording finished and submitted
    pub fn submit(&mut self) -> RenderResult<()> {
        self.expect(&[FrameState::Recording], "submit")?;
        self.state = FrameState::Submitted;
        Ok(())
    }

    /// Image presented; advances to the next slot
    ///
    /// Also called when presentation reported an out-of-date swapchain: the
    /// submission already consumed the slot.
    pub fn present(&mut self) -> RenderResult<()> {
        self.expect(&[FrameState::Submitted], "present")?;
        self.state = FrameState::Presented;
        self.frame_index += 1;
        Ok(())
    }

    /// Abandon the current frame before submission
    ///
    /// The slot is reused by the next `begin`.
    pub fn skip(&mut self) {
        if matches!(self.state, FrameState::Recording) {
            self.state = self.idle_state();
        }
    }

    /// Back to uninitialized after the GPU objects were destroyed
    pub fn reset(&mut self) {
        self.state = FrameState::Uninitialized;
        self.frame_index = 0;
    }

    /// Ring size
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Frames presented so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Slot used by the current frame
    pub fn current_slot(&self) -> usize {
        (self.frame_index % self.frames_in_flight as u64) as usize
    }

    /// Current state
    pub fn state(&self) -> FrameState {
        self.state
    }

    fn idle_state(&self) -> FrameState {
        if self.frame_index == 0 {
            FrameState::Initialized
        } else {
            FrameState::Presented
        }
    }

    fn expect(&self, allowed: &[FrameState], op: &str) -> RenderResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            log::error!("Frame {}: {} in state {:?}", self.frame_index, op, self.state);
            Err(RenderError::InvalidState {
                reason: format!("{op} not allowed in {:?}", self.state),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frame(ring: &mut FrameRing) -> usize {
        let slot = ring.begin().unwrap();
        ring.submit().unwrap();
        ring.present().unwrap();
        slot
    }

    #[test]
    fn test_slots_cycle() {
        let mut ring = FrameRing::new(3);
        ring.initialize().unwrap();
        let slots: Vec<usize> = (0..7).map(|_| run_frame(&mut ring)).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frame_index(), 7);
    }

    #[test]
    fn test_resize_only_before_initialize() {
        let mut ring = FrameRing::default();
        ring.set_frames_in_flight(3).unwrap();
        assert_eq!(ring.frames_in_flight(), 3);

        ring.initialize().unwrap();
        assert!(ring.set_frames_in_flight(2).is_err());
        assert_eq!(ring.frames_in_flight(), 3);
    }

    #[test]
    fn test_resize_range() {
        let mut ring = FrameRing::default();
        assert!(ring.set_frames_in_flight(0).is_err());
        assert!(ring.set_frames_in_flight(MAX_FRAMES_IN_FLIGHT + 1).is_err());
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut ring = FrameRing::default();
        assert!(ring.begin().is_err());
        ring.initialize().unwrap();
        assert!(ring.submit().is_err());
        assert!(ring.present().is_err());
        ring.begin().unwrap();
        assert!(ring.begin().is_err());
        assert_eq!(ring.state(), FrameState::Recording);
    }

    #[test]
    fn test_skip_reuses_slot() {
        let mut ring = FrameRing::new(2);
        ring.initialize().unwrap();
        run_frame(&mut ring);

        assert_eq!(ring.begin().unwrap(), 1);
        ring.skip();
        assert_eq!(ring.state(), FrameState::Presented);
        assert_eq!(ring.frame_index(), 1);
        assert_eq!(ring.begin().unwrap(), 1);
    }

    #[test]
    fn test_skip_first_frame_returns_to_initialized() {
        let mut ring = FrameRing::new(2);
        ring.initialize().unwrap();
        ring.begin().unwrap();
        ring.skip();
        assert_eq!(ring.state(), FrameState::Initialized);
    }

    #[test]
    fn test_skip_after_failed_submit_then_full_frame() {
        let mut ring = FrameRing::new(2);
        ring.initialize().unwrap();
        run_frame(&mut ring);

        let slot = ring.begin().unwrap();
        // submit failed before the ring heard of it
        ring.skip();
        assert!(ring.submit().is_err());
        assert_eq!(run_frame(&mut ring), slot);
        assert_eq!(ring.frame_index(), 2);
        assert_eq!(ring.state(), FrameState::Presented);
    }
}
