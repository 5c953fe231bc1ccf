//! Crossfade between the outgoing and incoming sinks
//!
//! When a track nears its end the engine hands its sink to the controller,
//! which fades it out on its own fader and releases it afterwards. The next
//! track is faded in on a fresh sink over the same duration. The crossfade is
//! complete once the fade-out finished and the incoming track has been
//! installed, in either order.

use crate::dispatch::{ControlMessage, Dispatcher};
use crate::fader::{FadeCurve, FadeId, VolumeFader};
use crate::sink::OutputSink;
use std::time::Duration;
use tempest_core::SharedVolume;

/// Owns the outgoing sink for the duration of a crossfade
pub struct CrossfadeController {
    fader: VolumeFader,
    in_fader: VolumeFader,
    duration: Duration,
    outgoing: Option<Box<dyn OutputSink>>,
    fade: Option<FadeId>,
    active: bool,
    out_done: bool,
    incoming_done: bool,
}

impl CrossfadeController {
    /// Controller with an equal-power fader ticking every `tick`
    pub fn new(tick: Duration) -> Self {
        Self {
            fader: VolumeFader::new(tick, FadeCurve::EqualPower),
            in_fader: VolumeFader::new(tick, FadeCurve::EqualPower),
            duration: Duration::ZERO,
            outgoing: None,
            fade: None,
            active: false,
            out_done: false,
            incoming_done: false,
        }
    }

    /// Whether a crossfade is in progress
    pub fn is_crossfading(&self) -> bool {
        self.active
    }

    /// Curve used for both halves of the crossfade
    pub fn curve(&self) -> FadeCurve {
        self.fader.curve()
    }

    /// Tick used by fades started from now on
    pub fn set_tick(&mut self, tick: Duration) {
        self.fader.set_tick(tick);
        self.in_fader.set_tick(tick);
    }

    /// Start fading `outgoing` to silence over `duration`
    ///
    /// Posts `ControlMessage::CrossfadeOutCompleted` when the fade ends.
    pub fn fade_out(
        &mut self,
        duration: Duration,
        outgoing: Box<dyn OutputSink>,
        dispatcher: &Dispatcher,
    ) -> FadeId {
        self.cancel_fading();

        let volume = outgoing.volume();
        let from = volume.get();
        let dispatcher = dispatcher.clone();
        let fade = self.fader.fade_out(volume, from, duration, move |fade| {
            dispatcher.post(ControlMessage::CrossfadeOutCompleted { fade });
        });

        tracing::debug!("Crossfade out over {:?}", duration);
        self.duration = duration;
        self.outgoing = Some(outgoing);
        self.fade = Some(fade);
        self.active = true;
        fade
    }

    /// Release the outgoing sink after its fade ended
    ///
    /// Returns true if this completed the crossfade.
    pub fn on_fade_out_completed(&mut self, fade: FadeId) -> bool {
        if self.fade != Some(fade) {
            return false;
        }
        self.fade = None;
        self.outgoing = None;
        self.out_done = true;
        self.finish_if_done()
    }

    /// Fade the incoming sink from silence up to `target`
    ///
    /// Returns true if this completed the crossfade.
    pub fn fade_in(&mut self, volume: SharedVolume, target: f32) -> bool {
        if !self.active {
            return false;
        }
        self.in_fader
            .fade_in(volume, target, self.duration, |_| {});
        self.incoming_done = true;
        self.finish_if_done()
    }

    /// Steer a running fade-in towards a new `target` over its remaining time
    ///
    /// Returns false if no fade-in is running.
    pub fn retarget(&mut self, volume: SharedVolume, target: f32) -> bool {
        if !self.in_fader.is_fading() {
            return false;
        }
        let remaining = self.in_fader.remaining();
        self.in_fader.fade_to(volume, target, remaining, |_| {});
        true
    }

    /// No incoming track will be installed; the crossfade ends with the fade-out
    ///
    /// Returns true if this completed the crossfade.
    pub fn abandon_incoming(&mut self) -> bool {
        if !self.active {
            return false;
        }
        tracing::debug!("Crossfade continues without an incoming track");
        self.incoming_done = true;
        self.finish_if_done()
    }

    fn finish_if_done(&mut self) -> bool {
        if self.active && self.out_done && self.incoming_done {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Abort the crossfade, releasing the outgoing sink immediately
    ///
    /// Also stops a fade-in still running after the crossfade completed.
    pub fn cancel_fading(&mut self) {
        self.fader.cancel_fading();
        self.fader.wait_for_cancel();
        self.in_fader.cancel_fading();
        self.in_fader.wait_for_cancel();
        if self.outgoing.is_some() {
            tracing::debug!("Crossfade cancelled");
        }
        self.outgoing = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.fade = None;
        self.active = false;
        self.out_done = false;
        self.incoming_done = false;
    }
}
